//! End-to-end: the real API server on an ephemeral port, reached through
//! `HttpRemoteStore`.

use std::{sync::Arc, time::Duration};

use canvass_api::AppState;
use canvass_core::{
  RemoteFailure,
  model::{Coordinate, NewCustomer, NewFollowUp, NewPin, Pin, PinPatch, PinStatus},
  store::{LocalStore, RemoteStore},
};
use canvass_store_sqlite::{SqliteLocalStore, SqliteRecordStore};
use canvass_sync::{
  ClientConfig, FieldTracker, HttpRemoteStore, SyncConfig, SyncCoordinator, SyncError,
};
use tokio::{net::TcpListener, sync::watch};

async fn serve() -> HttpRemoteStore {
  let store = SqliteRecordStore::open_in_memory().await.unwrap();
  let app = canvass_api::router(AppState::new(Arc::new(store)));
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    axum::serve(listener, app).await.unwrap();
  });

  HttpRemoteStore::new(ClientConfig {
    base_url: format!("http://{addr}"),
    timeout: Duration::from_secs(5),
    ..ClientConfig::default()
  })
  .unwrap()
}

#[tokio::test]
async fn health_probe_reports_online() {
  let remote = serve().await;
  assert!(remote.ping().await);
}

#[tokio::test]
async fn http_errors_map_onto_remote_failures() {
  let remote = serve().await;

  let pin = remote
    .create_pin(NewPin {
      id: Some("door-1".into()),
      ..NewPin::at(Coordinate::new(51.5, -0.12), "10 Downing St")
    })
    .await
    .unwrap();
  assert_eq!(pin.id, "door-1");
  assert_eq!(remote.get_pin("door-1").await.unwrap().unwrap().address, "10 Downing St");
  assert!(remote.get_pin("missing").await.unwrap().is_none());

  let again = NewPin { id: Some("door-1".into()), ..NewPin::at(Coordinate::new(1.0, 1.0), "x") };
  let dup = remote.create_pin(again).await.unwrap_err();
  assert!(matches!(dup.failure, RemoteFailure::Conflict(_)), "{dup}");

  let invalid = remote
    .create_pin(NewPin::at(Coordinate::new(200.0, 0.0), "nowhere"))
    .await
    .unwrap_err();
  assert!(matches!(invalid.failure, RemoteFailure::Rejected(_)), "{invalid}");
  assert!(!invalid.is_transient());

  let gone = remote.delete_pin("missing").await.unwrap_err();
  assert!(gone.is_not_found());

  let updated = remote
    .update_pin("door-1", PinPatch::status(PinStatus::NotHome))
    .await
    .unwrap();
  assert_eq!(updated.status, PinStatus::NotHome);
  assert_eq!(updated.created_at, pin.created_at);
}

#[tokio::test]
async fn offline_work_reaches_the_server_after_sync() {
  let remote = Arc::new(serve().await);
  let local = Arc::new(SqliteLocalStore::open_in_memory().await.unwrap());
  let (online, online_rx) = watch::channel(false);
  let tracker = FieldTracker::new(local.clone(), remote.clone(), online_rx);

  let pin = tracker
    .drop_pin(NewPin::at(Coordinate::new(48.85, 2.35), "1 Rue de Rivoli"))
    .await
    .unwrap()
    .pin;
  tracker
    .schedule_follow_up(NewFollowUp {
      pin_id: pin.id.clone(),
      address: pin.address.clone(),
      date: "2026-12-01".into(),
      time: "18:00".into(),
      ..NewFollowUp::default()
    })
    .await
    .unwrap();
  // Onboarded at a door whose pin never made it into the cache.
  tracker
    .onboard_customer(NewCustomer {
      pin_id: "lost-pin".into(),
      first_name: "Noor".into(),
      address: "3 Quai Voltaire".into(),
      ..NewCustomer::default()
    })
    .await
    .unwrap();
  assert!(remote.list_pins().await.unwrap().is_empty());

  online.send(true).unwrap();
  let coordinator = SyncCoordinator::new(local.clone(), remote.clone(), SyncConfig::default());
  let report = coordinator.sync_offline_data().await.unwrap();
  assert!(report.is_clean(), "{:?}", report.failures);
  assert_eq!(report.pushed.total(), 3);

  assert_eq!(remote.get_pin(&pin.id).await.unwrap().unwrap().lat, 48.85);
  assert_eq!(remote.list_follow_ups_by_pin(&pin.id).await.unwrap().len(), 1);
  let placeholder = remote.get_pin("lost-pin").await.unwrap().unwrap();
  assert_eq!((placeholder.lat, placeholder.lng), (0.0, 0.0));
  assert_eq!(placeholder.status, PinStatus::New);
  let customer = remote.get_customer_by_pin_id("lost-pin").await.unwrap().unwrap();
  assert_eq!(customer.first_name, "Noor");

  assert!(local.get_dirty::<Pin>().await.unwrap().is_empty());
  let again = coordinator.sync_offline_data().await.unwrap();
  assert_eq!(again.pushed.total(), 0);
}

#[tokio::test]
async fn hydrate_pulls_server_records_into_the_cache() {
  let remote = Arc::new(serve().await);
  remote
    .create_pin(NewPin::at(Coordinate::new(35.68, 139.69), "Shinjuku"))
    .await
    .unwrap();

  let local = Arc::new(SqliteLocalStore::open_in_memory().await.unwrap());
  let (_online, online_rx) = watch::channel(true);
  let tracker = FieldTracker::new(local.clone(), remote, online_rx);

  let counts = tracker.hydrate().await.unwrap();
  assert_eq!(counts.pins, 1);
  let cached = local.get_all::<Pin>().await.unwrap();
  assert_eq!(cached.len(), 1);
  assert!(!cached[0].offline);
}

#[tokio::test]
async fn validation_happens_before_the_network() {
  let remote = Arc::new(serve().await);
  let local = Arc::new(SqliteLocalStore::open_in_memory().await.unwrap());
  let (_online, online_rx) = watch::channel(true);
  let tracker = FieldTracker::new(local, remote.clone(), online_rx);

  let err = tracker
    .schedule_follow_up(NewFollowUp {
      pin_id: "p".into(),
      address: "a".into(),
      date: "2026-02-30".into(),
      time: "10:00".into(),
      ..NewFollowUp::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, SyncError::Validation(_)));
  assert!(remote.list_follow_ups().await.unwrap().is_empty());
}
