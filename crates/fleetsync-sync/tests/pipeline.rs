//! End-to-end synchronization tests: wiremock stands in for the upstream SOAP
//! service and `MemoryStore` for Postgres.

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use fleetsync_core::{DataKind, Facility};
use fleetsync_soap::{SoapClient, SoapEndpoint};
use fleetsync_sync::{
    is_stale, is_stale_at, DatasetStore, MemoryStore, PassStatus, RetrievalAudit,
    TrackingService, ZERO_RECORDS_REASON,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FACILITY_METHOD: &str = "GetGaraj_json";
const VEHICLE_METHOD: &str = "GetFiloAracKonum_json";
const WINDOW_MINUTES: u32 = 5;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn soap_response(method: &str, payload: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\">\
         <soap:Body><{method}Response xmlns=\"http://tempuri.org/\">\
         <{method}Result>{payload}</{method}Result>\
         </{method}Response></soap:Body></soap:Envelope>"
    )
}

fn garages_payload() -> &'static str {
    r#"[{"ID":1,"GARAJ_ADI":"Alpha","GARAJ_KODU":"A","KOORDINAT":"POINT (28.9 41.0)"},
        {"ID":2,"GARAJ_ADI":"Beta","GARAJ_KODU":"B","KOORDINAT":"POINT (29.5 41.5)"}]"#
}

fn tracking_service(server: &MockServer, store: &Arc<MemoryStore>) -> TrackingService {
    let client = SoapClient::new(5, "fleetsync-test", "http://tempuri.org")
        .expect("client construction should not fail");
    TrackingService::new(
        client,
        SoapEndpoint::new(format!("{}/garages", server.uri()), FACILITY_METHOD),
        SoapEndpoint::new(format!("{}/buses", server.uri()), VEHICLE_METHOD),
        Arc::clone(store) as Arc<dyn DatasetStore>,
        Arc::clone(store) as Arc<dyn RetrievalAudit>,
        WINDOW_MINUTES,
    )
}

async fn mount_garages(server: &MockServer, payload: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/garages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(soap_response(FACILITY_METHOD, payload)),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_buses(server: &MockServer, payload: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/buses"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(soap_response(VEHICLE_METHOD, payload)),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn seeded_facility() -> Facility {
    Facility {
        id: 99,
        name: "Seeded".to_string(),
        code: "SEED".to_string(),
        coordinate: Some("40.0,29.0".to_string()),
        last_updated: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Section 1: Facility passes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_facilities_are_fetched_stored_and_audited() {
    let server = MockServer::start().await;
    mount_garages(&server, garages_payload(), 1).await;
    let store = Arc::new(MemoryStore::new());
    let service = tracking_service(&server, &store);

    let facilities = service.current_facilities().await.expect("read should succeed");

    assert_eq!(facilities.len(), 2);
    assert_eq!(facilities[0].code, "A");
    assert_eq!(facilities[0].coordinate.as_deref(), Some("41,28.9"));

    let latest = store
        .latest(DataKind::Facility)
        .await
        .unwrap()
        .expect("attempt should be audited");
    assert!(latest.succeeded);
    assert!(latest.error_message.is_none());
}

#[tokio::test]
async fn fresh_data_is_served_without_upstream_call_until_window_elapses() {
    let server = MockServer::start().await;
    mount_garages(&server, garages_payload(), 1).await;
    let store = Arc::new(MemoryStore::new());
    let service = tracking_service(&server, &store);

    service.current_facilities().await.expect("first read");
    let second = service.current_facilities().await.expect("second read");
    assert_eq!(second.len(), 2);

    assert!(!is_stale(store.as_ref(), DataKind::Facility, WINDOW_MINUTES).await);
    let later = Utc::now() + chrono::Duration::minutes(i64::from(WINDOW_MINUTES) + 1);
    assert!(is_stale_at(store.as_ref(), DataKind::Facility, WINDOW_MINUTES, later).await);
}

#[tokio::test]
async fn zero_records_leave_stored_dataset_untouched() {
    let server = MockServer::start().await;
    mount_garages(&server, "[]", 1).await;
    let store = Arc::new(MemoryStore::new());
    store.replace_facilities(&[seeded_facility()]).await.unwrap();
    let service = tracking_service(&server, &store);

    let outcome = service.refresh(DataKind::Facility).await.expect("refresh");

    assert_eq!(
        outcome.status,
        PassStatus::FailedOpen {
            reason: ZERO_RECORDS_REASON.to_string()
        }
    );
    assert_eq!(outcome.dataset.len(), 1);
    let stored = store.find_all_facilities().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].code, "SEED");
    assert!(is_stale(store.as_ref(), DataKind::Facility, WINDOW_MINUTES).await);
}

#[tokio::test]
async fn transport_failure_is_audited_and_keeps_data_stale() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/garages"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    store.replace_facilities(&[seeded_facility()]).await.unwrap();
    let service = tracking_service(&server, &store);

    let facilities = service.current_facilities().await.expect("fail-open read");

    assert_eq!(facilities.len(), 1);
    assert_eq!(facilities[0].code, "SEED");
    let latest = store.latest(DataKind::Facility).await.unwrap().unwrap();
    assert!(!latest.succeeded);
    assert!(latest.error_message.is_some());
    assert!(is_stale(store.as_ref(), DataKind::Facility, WINDOW_MINUTES).await);
}

#[tokio::test]
async fn replace_failure_is_audited_and_previous_dataset_returned() {
    let server = MockServer::start().await;
    mount_garages(&server, garages_payload(), 1).await;
    let store = Arc::new(MemoryStore::new());
    store.replace_facilities(&[seeded_facility()]).await.unwrap();
    store.set_fail_writes(true);
    let service = tracking_service(&server, &store);

    let outcome = service.refresh(DataKind::Facility).await.expect("refresh");

    match &outcome.status {
        PassStatus::FailedOpen { reason } => assert!(reason.contains("failed to store")),
        other => panic!("expected FailedOpen, got {other:?}"),
    }
    assert_eq!(outcome.dataset.len(), 1);
    assert!(!store.latest(DataKind::Facility).await.unwrap().unwrap().succeeded);
}

#[tokio::test]
async fn nested_wrapper_response_is_decoded_by_fallback_search() {
    let server = MockServer::start().await;
    let body = "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"><s:Body>\
                <Outer><Inner>{\"data\":[{\"ID\":5,\"GARAJ_KODU\":\"W\"}]}</Inner></Outer>\
                </s:Body></s:Envelope>";
    Mock::given(method("POST"))
        .and(path("/garages"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    let service = tracking_service(&server, &store);

    let facilities = service.current_facilities().await.expect("read");

    assert_eq!(facilities.len(), 1);
    assert_eq!(facilities[0].id, 5);
    assert_eq!(facilities[0].code, "W");
}

// ---------------------------------------------------------------------------
// Section 2: Concurrency and forced refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_stale_callers_share_one_upstream_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/garages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(soap_response(FACILITY_METHOD, garages_payload()))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    let service = tracking_service(&server, &store);

    let (first, second) = tokio::join!(service.current_facilities(), service.current_facilities());

    assert_eq!(first.expect("first caller").len(), 2);
    assert_eq!(second.expect("second caller").len(), 2);
    assert_eq!(store.retrievals().unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_stale_vehicle_callers_share_one_upstream_call() {
    let server = MockServer::start().await;
    mount_garages(&server, garages_payload(), 1).await;
    Mock::given(method("POST"))
        .and(path("/buses"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(soap_response(
                    VEHICLE_METHOD,
                    r#"[{"KapiNo":"X1","Plaka":"34 X 1","Enlem":"41.0","Boylam":"28.9"}]"#,
                ))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    let service = tracking_service(&server, &store);

    let (first, second) = tokio::join!(service.current_vehicles(), service.current_vehicles());

    assert_eq!(first.expect("first caller").len(), 1);
    assert_eq!(second.expect("second caller").len(), 1);
    let vehicle_attempts = store
        .retrievals()
        .unwrap()
        .into_iter()
        .filter(|r| r.kind == DataKind::Vehicle)
        .count();
    assert_eq!(vehicle_attempts, 1);
}

#[tokio::test]
async fn forced_refresh_bypasses_freshness_gate() {
    let server = MockServer::start().await;
    mount_garages(&server, garages_payload(), 2).await;
    let store = Arc::new(MemoryStore::new());
    let service = tracking_service(&server, &store);

    service.current_facilities().await.expect("initial read");
    let outcome = service.refresh(DataKind::Facility).await.expect("refresh");

    assert!(outcome.status.is_refreshed());
    assert_eq!(outcome.dataset.kind(), DataKind::Facility);
    assert_eq!(store.retrievals().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Section 3: Vehicle passes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn vehicle_at_facility_coordinate_is_enriched_with_zero_distance() {
    let server = MockServer::start().await;
    mount_garages(&server, garages_payload(), 1).await;
    mount_buses(
        &server,
        r#"[{"KapiNo":"X1","Operator":"IETT","Garaj":"B","Enlem":"41.0","Boylam":"28.9",
             "Hiz":"12","Plaka":"34 X 1","Saat":"2024-03-01 08:00:00"}]"#,
        1,
    )
    .await;
    let store = Arc::new(MemoryStore::new());
    let service = tracking_service(&server, &store);

    let vehicles = service.current_vehicles().await.expect("read");

    assert_eq!(vehicles.len(), 1);
    let vehicle = &vehicles[0];
    assert_eq!(vehicle.nearest_facility_code.as_deref(), Some("A"));
    assert_eq!(vehicle.nearest_facility_name.as_deref(), Some("Alpha"));
    assert_eq!(vehicle.distance_to_nearest_facility_km, Some(0.0));
    assert_eq!(vehicle.speed, Some(12.0));

    // The facility snapshot came through the gated path and is now fresh.
    assert!(!is_stale(store.as_ref(), DataKind::Facility, WINDOW_MINUTES).await);
}

#[tokio::test]
async fn recorded_at_is_read_in_the_configured_source_offset() {
    let server = MockServer::start().await;
    mount_garages(&server, garages_payload(), 1).await;
    mount_buses(
        &server,
        r#"[{"KapiNo":"X1","Plaka":"34 X 1","Saat":"2024-03-01 08:00:00"}]"#,
        1,
    )
    .await;
    let store = Arc::new(MemoryStore::new());
    let istanbul = FixedOffset::east_opt(3 * 3600).expect("+03:00");
    let service = tracking_service(&server, &store).with_source_offset(istanbul);

    let vehicles = service.current_vehicles().await.expect("read");

    assert_eq!(vehicles[0].recorded_at.to_rfc3339(), "2024-03-01T05:00:00+00:00");
}

#[tokio::test]
async fn bad_speed_is_kept_defaulted_and_reported() {
    let server = MockServer::start().await;
    mount_garages(&server, garages_payload(), 1).await;
    mount_buses(
        &server,
        r#"[{"KapiNo":"X1","Plaka":"34 X 1","Hiz":"n/a","Enlem":"41.2","Boylam":"29.1"}]"#,
        1,
    )
    .await;
    let store = Arc::new(MemoryStore::new());
    let service = tracking_service(&server, &store);

    let outcome = service.refresh(DataKind::Vehicle).await.expect("refresh");

    match &outcome.status {
        PassStatus::Refreshed { stored, report } => {
            assert_eq!(*stored, 1);
            assert_eq!(report.defaulted_speeds, 1);
        }
        other => panic!("expected Refreshed, got {other:?}"),
    }
    let vehicles = store.find_all_vehicles().await.unwrap();
    assert_eq!(vehicles[0].speed, Some(0.0));
}

#[tokio::test]
async fn vehicle_identity_without_plate_is_stable_across_refreshes() {
    let server = MockServer::start().await;
    mount_garages(&server, garages_payload(), 1).await;
    mount_buses(
        &server,
        r#"[{"KapiNo":"X1","Operator":"IETT","Garaj":"A"},{"KapiNo":"X2","Operator":"IETT","Garaj":"A"}]"#,
        2,
    )
    .await;
    let store = Arc::new(MemoryStore::new());
    let service = tracking_service(&server, &store);

    service.refresh(DataKind::Vehicle).await.expect("first refresh");
    let mut first: Vec<i64> = store
        .find_all_vehicles()
        .await
        .unwrap()
        .iter()
        .map(|v| v.id)
        .collect();
    service.refresh(DataKind::Vehicle).await.expect("second refresh");
    let mut second: Vec<i64> = store
        .find_all_vehicles()
        .await
        .unwrap()
        .iter()
        .map(|v| v.id)
        .collect();

    first.sort_unstable();
    second.sort_unstable();
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[tokio::test]
async fn vehicles_are_stored_unenriched_when_no_facility_is_available() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/garages"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_buses(
        &server,
        r#"[{"KapiNo":"X1","Plaka":"34 X 1","Enlem":"41.0","Boylam":"28.9"}]"#,
        1,
    )
    .await;
    let store = Arc::new(MemoryStore::new());
    let service = tracking_service(&server, &store);

    let vehicles = service.current_vehicles().await.expect("read");

    assert_eq!(vehicles.len(), 1);
    assert!(vehicles[0].nearest_facility_code.is_none());
    assert!(vehicles[0].distance_to_nearest_facility_km.is_none());
    assert!(!store.latest(DataKind::Facility).await.unwrap().unwrap().succeeded);
    assert!(store.latest(DataKind::Vehicle).await.unwrap().unwrap().succeeded);
}

#[tokio::test]
async fn get_current_data_dispatches_by_kind() {
    let server = MockServer::start().await;
    mount_garages(&server, garages_payload(), 1).await;
    let store = Arc::new(MemoryStore::new());
    let service = tracking_service(&server, &store);

    let dataset = service
        .get_current_data(DataKind::Facility)
        .await
        .expect("read");

    assert_eq!(dataset.kind(), DataKind::Facility);
    assert_eq!(dataset.len(), 2);
}
