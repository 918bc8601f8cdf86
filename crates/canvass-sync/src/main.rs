//! `canvass`: offline-first command line for field reps.
//!
//! Every command writes to the local cache first. When the server answers
//! `/health` the write is also pushed straight away; otherwise it waits for
//! `canvass sync`.
//!
//! # Usage
//!
//! ```
//! canvass --url http://localhost:8787 pin add 40.7128 -74.0060 "1 Main St"
//! canvass --offline territory add Downtown 40.71,-74.01 40.71,-74.00 40.72,-74.00
//! canvass --config ~/.config/canvass/config.toml sync
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use canvass_core::{
  geometry::{DEFAULT_MIN_AREA_M2, polygon_area, simplify_polygon},
  model::{
    Coordinate, Customer, FollowUp, FollowUpStatus, NewCustomer, NewFollowUp, NewPin,
    NewTerritory, Pin, PinStatus, Socials, Territory,
  },
  store::{LocalRecord, LocalStore},
};
use canvass_store_sqlite::SqliteLocalStore;
use canvass_sync::{
  ClientConfig, FieldTracker, HttpRemoteStore, KindCounts, PENDING_TERRITORY_DELETES,
  PlacedPin, SyncConfig, SyncCoordinator,
};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "canvass", version, about = "Offline-first canvassing tracker")]
struct Args {
  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE", env = "CANVASS_CONFIG")]
  config: Option<PathBuf>,

  /// Base URL of the canvass server (default: http://127.0.0.1:8787).
  #[arg(long, env = "CANVASS_URL")]
  url: Option<String>,

  /// API username.
  #[arg(long, env = "CANVASS_USER")]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "CANVASS_PASSWORD")]
  password: Option<String>,

  /// Local cache database (default: canvass-cache.db).
  #[arg(long, env = "CANVASS_CACHE")]
  cache: Option<PathBuf>,

  /// Per-request timeout in seconds.
  #[arg(long, env = "CANVASS_TIMEOUT_SECS")]
  timeout_secs: Option<u64>,

  /// Smallest territory accepted, in square metres.
  #[arg(long, env = "CANVASS_MIN_TERRITORY_AREA_M2")]
  min_area: Option<f64>,

  /// Do not contact the server; queue everything for a later sync.
  #[arg(long)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Doors visited.
  #[command(subcommand)]
  Pin(PinCommand),

  /// Drawn sales areas.
  #[command(subcommand)]
  Territory(TerritoryCommand),

  /// Scheduled return visits.
  #[command(subcommand)]
  FollowUp(FollowUpCommand),

  /// Record a customer for a pin.
  Onboard {
    pin_id:      String,
    #[arg(long)]
    first_name:  String,
    /// Defaults to the cached pin's address.
    #[arg(long)]
    address:     Option<String>,
    #[arg(long)]
    phone:       Option<String>,
    #[arg(long)]
    email:       Option<String>,
    #[arg(long)]
    owns_crypto: bool,
    #[arg(long)]
    twitter:     Option<String>,
    #[arg(long)]
    telegram:    Option<String>,
    #[arg(long)]
    reddit:      Option<String>,
    #[arg(long)]
    notes:       Option<String>,
  },

  /// Push queued changes, then refresh the cache from the server.
  Sync {
    /// Print the sync report as JSON.
    #[arg(long)]
    json: bool,
  },

  /// Show connectivity and what is waiting to sync.
  Status,
}

#[derive(Subcommand, Debug)]
enum PinCommand {
  Add {
    #[arg(allow_negative_numbers = true)]
    lat:           f64,
    #[arg(allow_negative_numbers = true)]
    lng:           f64,
    address:       String,
    #[arg(long)]
    property_name: Option<String>,
    #[arg(long)]
    place_id:      Option<String>,
    #[arg(long, value_parser = PinStatus::parse)]
    status:        Option<PinStatus>,
  },
  List,
  Status {
    id:     String,
    #[arg(value_parser = PinStatus::parse)]
    status: PinStatus,
  },
  Move {
    id:  String,
    #[arg(allow_negative_numbers = true)]
    lat: f64,
    #[arg(allow_negative_numbers = true)]
    lng: f64,
  },
}

#[derive(Subcommand, Debug)]
enum TerritoryCommand {
  Add {
    name:     String,
    /// Vertices as `lat,lng`; the ring closes implicitly.
    #[arg(
      required = true,
      num_args = 3..,
      allow_hyphen_values = true,
      value_parser = parse_coordinate
    )]
    points:   Vec<Coordinate>,
    #[arg(long, default_value = "#3388ff")]
    color:    String,
    /// Drop vertices closer than this many degrees to the previous one.
    #[arg(long)]
    simplify: Option<f64>,
  },
  List,
  Delete {
    id: String,
  },
  /// Territories containing a point.
  At {
    #[arg(allow_negative_numbers = true)]
    lat: f64,
    #[arg(allow_negative_numbers = true)]
    lng: f64,
  },
  Show {
    id: String,
  },
  Hide {
    id: String,
  },
}

#[derive(Subcommand, Debug)]
enum FollowUpCommand {
  Add {
    pin_id:        String,
    /// `YYYY-MM-DD`
    date:          String,
    /// `HH:MM`, 24-hour.
    time:          String,
    /// Defaults to the cached pin's address.
    #[arg(long)]
    address:       Option<String>,
    #[arg(long)]
    property_name: Option<String>,
    #[arg(long)]
    notes:         Option<String>,
  },
  List {
    /// Only follow-ups for this pin.
    #[arg(long)]
    pin: Option<String>,
  },
  Status {
    id:     String,
    #[arg(value_parser = FollowUpStatus::parse)]
    status: FollowUpStatus,
  },
}

fn parse_coordinate(s: &str) -> Result<Coordinate, String> {
  let (lat, lng) = s
    .split_once(',')
    .ok_or_else(|| format!("expected lat,lng but got {s:?}"))?;
  let lat = lat.trim().parse::<f64>().map_err(|e| format!("bad latitude {lat:?}: {e}"))?;
  let lng = lng.trim().parse::<f64>().map_err(|e| format!("bad longitude {lng:?}: {e}"))?;
  Ok(Coordinate::new(lat, lng))
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
  url:                   Option<String>,
  username:              Option<String>,
  password:              Option<String>,
  cache_path:            Option<PathBuf>,
  timeout_secs:          Option<u64>,
  min_territory_area_m2: Option<f64>,
}

type Tracker = FieldTracker<SqliteLocalStore, HttpRemoteStore>;

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags and env override the config file, which overrides defaults.
  let timeout = Duration::from_secs(args.timeout_secs.or(file_cfg.timeout_secs).unwrap_or(5));
  let client_config = ClientConfig {
    base_url: args
      .url
      .or(file_cfg.url)
      .unwrap_or_else(|| ClientConfig::default().base_url),
    username: args.user.or(file_cfg.username),
    password: args.password.or(file_cfg.password),
    timeout,
  };
  let cache_path = args
    .cache
    .or(file_cfg.cache_path)
    .unwrap_or_else(|| PathBuf::from("canvass-cache.db"));
  let min_area = args
    .min_area
    .or(file_cfg.min_territory_area_m2)
    .unwrap_or(DEFAULT_MIN_AREA_M2);

  let remote = Arc::new(HttpRemoteStore::new(client_config).context("building HTTP client")?);
  let local = Arc::new(
    SqliteLocalStore::open(&cache_path)
      .await
      .with_context(|| format!("opening cache at {}", cache_path.display()))?,
  );

  let online = !args.offline && remote.ping().await;
  if !online && !args.offline {
    tracing::warn!(url = remote.base_url(), "server unreachable; working offline");
  }
  let (_connectivity, online_rx) = watch::channel(online);

  let tracker = FieldTracker::new(local.clone(), remote.clone(), online_rx)
    .with_min_area(min_area)
    .with_call_timeout(timeout);

  match args.command {
    Command::Pin(cmd) => pin_command(&tracker, cmd).await,
    Command::Territory(cmd) => territory_command(&tracker, cmd).await,
    Command::FollowUp(cmd) => follow_up_command(&tracker, cmd).await,
    Command::Onboard {
      pin_id,
      first_name,
      address,
      phone,
      email,
      owns_crypto,
      twitter,
      telegram,
      reddit,
      notes,
    } => {
      let address = match address {
        Some(address) => address,
        None => cached_address(&tracker, &pin_id).await?,
      };
      let saved = tracker
        .onboard_customer(NewCustomer {
          pin_id,
          first_name,
          phone,
          email,
          owns_crypto,
          socials: Socials { twitter, telegram, reddit },
          notes,
          address,
          ..NewCustomer::default()
        })
        .await?;
      println!("onboarded {}{}", saved.value.first_name, sync_marker(saved.synced));
      Ok(())
    }
    Command::Sync { json } => {
      if !online {
        return Err(anyhow!("server unreachable; nothing synced"));
      }
      let config = SyncConfig { call_timeout: timeout, ..SyncConfig::default() };
      let coordinator = SyncCoordinator::new(local, remote, config);
      let report = coordinator.sync_offline_data().await?;
      let hydrated = tracker.hydrate().await?;
      if json {
        println!("{}", serde_json::to_string_pretty(&report).context("encoding report")?);
        return Ok(());
      }
      println!(
        "pushed {} record(s), {} territory delete(s)",
        report.pushed.total(),
        report.deleted_territories
      );
      for failure in &report.failures {
        println!("  failed {} {}: {}", failure.entity, failure.key, failure.message);
      }
      println!("refreshed {} record(s) from server", hydrated.total());
      Ok(())
    }
    Command::Status => status(&tracker, online).await,
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn pin_command(tracker: &Tracker, cmd: PinCommand) -> Result<()> {
  match cmd {
    PinCommand::Add { lat, lng, address, property_name, place_id, status } => {
      let placed = tracker
        .drop_pin(NewPin {
          property_name,
          place_id,
          status,
          ..NewPin::at(Coordinate::new(lat, lng), address)
        })
        .await?;
      print_placed("added", &placed);
    }
    PinCommand::List => {
      let mut pins: Vec<LocalRecord<Pin>> = tracker.local().get_all().await?;
      pins.sort_by(|a, b| b.value.created_at.cmp(&a.value.created_at));
      for record in pins {
        let pin = &record.value;
        println!(
          "{}  {:<14} {:>10.5},{:<11.5} {}{}",
          pin.id,
          pin.status.as_ref(),
          pin.lat,
          pin.lng,
          pin.address,
          dirty_marker(record.offline)
        );
      }
    }
    PinCommand::Status { id, status } => {
      let saved = tracker.set_pin_status(&id, status).await?;
      println!("{} is now {}{}", saved.value.id, saved.value.status, sync_marker(saved.synced));
    }
    PinCommand::Move { id, lat, lng } => {
      let placed = tracker.move_pin(&id, Coordinate::new(lat, lng)).await?;
      print_placed("moved", &placed);
    }
  }
  Ok(())
}

async fn territory_command(tracker: &Tracker, cmd: TerritoryCommand) -> Result<()> {
  match cmd {
    TerritoryCommand::Add { name, points, color, simplify } => {
      let coordinates = match simplify {
        Some(tolerance) => simplify_polygon(&points, tolerance),
        None => points,
      };
      let saved = tracker
        .save_territory(NewTerritory { name, color, coordinates, ..NewTerritory::default() })
        .await?;
      tracker.set_territory_visible(&saved.value.id, true).await?;
      println!("saved territory {}{}", saved.value.id, sync_marker(saved.synced));
    }
    TerritoryCommand::List => {
      let visible = tracker.visible_territories().await?;
      let territories: Vec<LocalRecord<Territory>> = tracker.local().get_all().await?;
      for record in territories {
        let t = &record.value;
        let shown = if visible.contains(&t.id) { "shown" } else { "hidden" };
        println!(
          "{}  {:<20} {:>3} pts {:>12.0} m²  {}{}",
          t.id,
          t.name,
          t.coordinates.len(),
          polygon_area(&t.coordinates),
          shown,
          dirty_marker(record.offline)
        );
      }
    }
    TerritoryCommand::Delete { id } => {
      if tracker.delete_territory(&id).await? {
        println!("deleted territory {id}");
      } else {
        println!("territory {id} was not cached; removal queued");
      }
    }
    TerritoryCommand::At { lat, lng } => {
      for t in tracker.territories_at(Coordinate::new(lat, lng)).await? {
        println!("{}  {}", t.id, t.name);
      }
    }
    TerritoryCommand::Show { id } => tracker.set_territory_visible(&id, true).await?,
    TerritoryCommand::Hide { id } => tracker.set_territory_visible(&id, false).await?,
  }
  Ok(())
}

async fn follow_up_command(tracker: &Tracker, cmd: FollowUpCommand) -> Result<()> {
  match cmd {
    FollowUpCommand::Add { pin_id, date, time, address, property_name, notes } => {
      let address = match address {
        Some(address) => address,
        None => cached_address(tracker, &pin_id).await?,
      };
      let saved = tracker
        .schedule_follow_up(NewFollowUp {
          pin_id,
          address,
          property_name,
          date,
          time,
          notes,
          ..NewFollowUp::default()
        })
        .await?;
      println!("scheduled follow-up {}{}", saved.value.id, sync_marker(saved.synced));
    }
    FollowUpCommand::List { pin } => {
      let mut follow_ups: Vec<LocalRecord<FollowUp>> = tracker.local().get_all().await?;
      follow_ups.retain(|r| pin.as_ref().is_none_or(|p| *p == r.value.pin_id));
      follow_ups.sort_by(|a, b| {
        (&a.value.date, &a.value.time).cmp(&(&b.value.date, &b.value.time))
      });
      for record in follow_ups {
        let f = &record.value;
        println!(
          "{}  {} {}  {:<10} {}{}",
          f.id,
          f.date,
          f.time,
          f.status.to_string(),
          f.address,
          dirty_marker(record.offline)
        );
      }
    }
    FollowUpCommand::Status { id, status } => {
      let saved = tracker.set_follow_up_status(&id, status).await?;
      println!("{} is now {}{}", saved.value.id, saved.value.status, sync_marker(saved.synced));
    }
  }
  Ok(())
}

async fn status(tracker: &Tracker, online: bool) -> Result<()> {
  let local = tracker.local();
  let dirty = KindCounts {
    pins:        local.get_dirty::<Pin>().await?.len(),
    territories: local.get_dirty::<Territory>().await?.len(),
    follow_ups:  local.get_dirty::<FollowUp>().await?.len(),
    customers:   local.get_dirty::<Customer>().await?.len(),
  };
  let deletes: Vec<String> = local
    .get_setting(PENDING_TERRITORY_DELETES)
    .await?
    .unwrap_or_default();

  println!("connectivity: {}", if online { "online" } else { "offline" });
  println!(
    "waiting to sync: {} pin(s), {} territory(ies), {} follow-up(s), {} customer(s)",
    dirty.pins, dirty.territories, dirty.follow_ups, dirty.customers
  );
  println!("queued territory deletes: {}", deletes.len());
  Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

async fn cached_address(tracker: &Tracker, pin_id: &str) -> Result<String> {
  let pin = tracker
    .local()
    .get::<Pin>(pin_id)
    .await?
    .ok_or_else(|| anyhow!("pin {pin_id} is not cached; pass --address"))?;
  Ok(pin.value.address)
}

fn print_placed(verb: &str, placed: &PlacedPin) {
  println!("{verb} pin {}{}", placed.pin.id, sync_marker(placed.synced));
  for t in &placed.territories {
    println!("  in territory {} ({})", t.name, t.id);
  }
}

fn sync_marker(synced: bool) -> &'static str {
  if synced { "" } else { " (queued for sync)" }
}

fn dirty_marker(offline: bool) -> &'static str {
  if offline { "  *" } else { "" }
}
