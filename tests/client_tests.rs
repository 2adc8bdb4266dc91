use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use daikin_dsiot::{
    AuthMode, DaikinClient, Error, Event, FanSpeed, HvacMode, MessageLogMode, SwingMode,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> DaikinClient {
    DaikinClient::builder("user@example.com", "hunter2")
        .base_url(server.uri())
        .discovery_urls([format!("{}/common/login", server.uri())])
        .client_uuid("TESTUUID")
        .build()
        .expect("client should build")
}

fn login_ok() -> Value {
    json!({
        "rsc": 2000,
        "access_token": "acc",
        "id_token": "idt",
        "refresh_token": "ref"
    })
}

async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/common/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"result": {"client_id": "abc12345", "client_secret": "s3cr3t1234567890"}}
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/premise/dsiot/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_ok()))
        .mount(server)
        .await;
}

fn discovery_body() -> Value {
    json!({"responses": [
        {"fr": "/dsiot/edges", "rsc": 2000, "pc": [{
            "ri": "1",
            "pch": [
                {"pn": "adp_i", "pch": [{"pn": "mac", "pv": "A4B1C2D3E4F5"}]},
                {"pn": "adp_d", "pch": [{"pn": "name", "pv": "Lounge"}]}
            ]
        }]}
    ]})
}

fn status_body(edge_id: &str, raw: &[(&str, &str)]) -> Value {
    let mut groups: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for (key, value) in raw {
        let (group, param) = key.split_once('.').expect("dotted key");
        groups
            .entry(group)
            .or_default()
            .push(json!({"pn": param, "pv": value}));
    }
    let pch: Vec<Value> = groups
        .into_iter()
        .map(|(group, params)| json!({"pn": group, "pch": params}))
        .collect();
    json!({"responses": [{
        "fr": format!("/dsiot/edges/{edge_id}/adr_0100.dgc_status"),
        "rsc": 2000,
        "pc": {"pn": "dgc_status", "pch": [{"pn": "e_1002", "pch": pch}]}
    }]})
}

const SCENARIO_RAW: &[(&str, &str)] = &[
    ("e_A002.p_01", "01"),
    ("e_3001.p_01", "0200"),
    ("e_3001.p_02", "32"),
    ("e_A00B.p_01", "19"),
    ("e_A00B.p_02", "28"),
];

async fn mount_refresh(server: &MockServer, raw: &[(&str, &str)]) {
    Mock::given(method("POST"))
        .and(path("/dsiot/multireq"))
        .and(body_string_contains("/dsiot/edges?expand"))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/dsiot/multireq"))
        .and(body_string_contains("filter=pv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("1", raw)))
        .mount(server)
        .await;
}

async fn refreshed_client(server: &MockServer) -> DaikinClient {
    mount_auth(server).await;
    mount_refresh(server, SCENARIO_RAW).await;
    let mut client = client_for(server);
    client.refresh().await.expect("refresh should succeed");
    client
}

async fn write_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "PUT")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

fn e3001_params(body: &Value) -> BTreeMap<String, String> {
    body["requests"][0]["pc"]["pch"][0]["pch"][0]["pch"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| {
            (
                n["pn"].as_str().unwrap().to_string(),
                n["pv"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

#[tokio::test]
async fn login_discovers_client_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"result": {"client_id": "abc12345", "client_secret": "s3cr3t1234567890"}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/premise/dsiot/login"))
        .and(body_partial_json(json!({
            "client_id": "abc12345",
            "client_secret": "s3cr3t1234567890",
            "user_id": "user@example.com",
            "uuid": "TESTUUID",
            "grant_type": "password"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_ok()))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.login().await.expect("login should succeed");
    assert_eq!(client.client_id(), Some("abc12345"));
    assert_eq!(client.client_secret(), Some("s3cr3t1234567890"));
    assert_eq!(client.refresh_token(), Some("ref"));

    // Already resolved: no further discovery traffic.
    let pair = client.resolve_client_credentials().await.unwrap();
    assert_eq!(pair.0, "abc12345");
}

#[tokio::test]
async fn credentials_found_in_rejection_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            "unauthorized client_id=abcd1234efgh client_secret=0123456789abcdef0123",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let (id, secret) = client.resolve_client_credentials().await.unwrap();
    assert_eq!(id, "abcd1234efgh");
    assert_eq!(secret, "0123456789abcdef0123");
}

#[tokio::test]
async fn discovery_tries_every_payload_before_failing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "bad request"})))
        .expect(4)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let err = client.login().await.unwrap_err();
    assert!(err.is_auth(), "expected auth error, got {err:?}");
}

#[tokio::test]
async fn preset_credentials_skip_discovery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/premise/dsiot/login"))
        .and(body_partial_json(json!({"client_id": "preset-id"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_ok()))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = DaikinClient::builder("user@example.com", "hunter2")
        .base_url(server.uri())
        .discovery_urls([format!("{}/common/login", server.uri())])
        .client_credentials("preset-id", "preset-secret-000000")
        .build()
        .unwrap();
    client.login().await.unwrap();
}

#[tokio::test]
async fn login_rejected_by_result_code() {
    let server = MockServer::start().await;
    mount_auth_discovery_only(&server).await;
    Mock::given(method("POST"))
        .and(path("/premise/dsiot/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rsc": 4001, "error": "bad password"})))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let err = client.login().await.unwrap_err();
    assert!(matches!(err, Error::Authentication(ref msg) if msg.contains("4001")), "got {err:?}");
}

#[tokio::test]
async fn login_without_tokens_fails() {
    let server = MockServer::start().await;
    mount_auth_discovery_only(&server).await;
    Mock::given(method("POST"))
        .and(path("/premise/dsiot/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rsc": 2000, "refresh_token": "r"})))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    assert!(client.login().await.unwrap_err().is_auth());
}

#[tokio::test]
async fn login_http_error_fails() {
    let server = MockServer::start().await;
    mount_auth_discovery_only(&server).await;
    Mock::given(method("POST"))
        .and(path("/premise/dsiot/login"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let err = client.login().await.unwrap_err();
    assert!(matches!(err, Error::Authentication(ref msg) if msg.contains("503")), "got {err:?}");
}

async fn mount_auth_discovery_only(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/common/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client_id": "abc12345", "client_secret": "s3cr3t1234567890"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn multireq_falls_back_to_other_token_type() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("POST"))
        .and(path("/dsiot/multireq"))
        .and(header("authorization", "Bearer idt"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/dsiot/multireq"))
        .and(header("authorization", "Bearer acc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body()))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    assert_eq!(client.auth_mode(), AuthMode::IdToken);
    let units = client.fetch_units().await.unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(client.auth_mode(), AuthMode::AccessToken);
}

#[tokio::test]
async fn multireq_gives_up_after_relogin() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client_id": "abc12345", "client_secret": "s3cr3t1234567890"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/premise/dsiot/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_ok()))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/dsiot/multireq"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(4)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let err = client.fetch_units().await.unwrap_err();
    match err {
        Error::Protocol(msg) => {
            assert!(msg.contains("403"), "{msg}");
            assert!(msg.contains("forbidden"), "{msg}");
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn refresh_decodes_unit_state() {
    let server = MockServer::start().await;
    let client = refreshed_client(&server).await;

    let unit = client.unit("1").expect("unit 1 should exist");
    assert_eq!(unit.name, "Lounge");
    assert_eq!(unit.mac, "A4B1C2D3E4F5");
    assert_eq!(unit.power_code.as_deref(), Some("01"));
    assert_eq!(unit.mode_code.as_deref(), Some("0200"));
    assert_eq!(unit.target_temp_c, Some(25.0));
    assert_eq!(unit.room_temp_c, Some(25.0));
    assert_eq!(unit.room_humidity_percent, Some(40));
    assert_eq!(unit.sensor_temp_1_c, None);
    assert_eq!(unit.raw_status.len(), 5);
    assert_eq!(unit.hvac_mode(), Some(HvacMode::Cool));
    assert!(unit.is_on());
}

#[tokio::test]
async fn refresh_with_no_units_clears_cache() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("POST"))
        .and(path("/dsiot/multireq"))
        .and(body_string_contains("/dsiot/edges?expand"))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/dsiot/multireq"))
        .and(body_string_contains("filter=pv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("1", SCENARIO_RAW)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/dsiot/multireq"))
        .and(body_string_contains("/dsiot/edges?expand"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": []})))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    assert_eq!(client.refresh().await.unwrap().len(), 1);
    assert!(client.refresh().await.unwrap().is_empty());
    assert!(client.units().is_empty());
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("POST"))
        .and(path("/dsiot/multireq"))
        .and(body_string_contains("/dsiot/edges?expand"))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/dsiot/multireq"))
        .and(body_string_contains("filter=pv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("1", SCENARIO_RAW)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/dsiot/multireq"))
        .and(body_string_contains("filter=pv"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.refresh().await.unwrap();
    assert!(client.refresh().await.is_err());
    assert_eq!(client.unit("1").and_then(|u| u.target_temp_c), Some(25.0));
}

#[tokio::test]
async fn refresh_fires_events_and_snapshots() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_refresh(&server, SCENARIO_RAW).await;

    let events: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(vec![]));
    let snapshots: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(vec![]));
    let events_clone = events.clone();
    let snapshots_clone = snapshots.clone();

    let mut client = DaikinClient::builder("user@example.com", "hunter2")
        .base_url(server.uri())
        .discovery_urls([format!("{}/common/login", server.uri())])
        .on_event(move |event| events_clone.lock().unwrap().push(event.clone()))
        .on_snapshot(move |unit| snapshots_clone.lock().unwrap().push(unit.edge_id.clone()))
        .build()
        .unwrap();

    client.refresh().await.unwrap();
    {
        let captured = events.lock().unwrap();
        assert!(matches!(captured[0], Event::UnitDiscovered { ref edge_id, .. } if edge_id == "1"));
        assert!(captured.contains(&Event::TargetTemperatureChanged {
            edge_id: "1".into(),
            temp_c: 25.0
        }));
    }

    client.refresh().await.unwrap();
    assert_eq!(events.lock().unwrap().iter().filter(|e| matches!(e, Event::UnitDiscovered { .. })).count(), 1);
    assert_eq!(*snapshots.lock().unwrap(), vec!["1".to_string(), "1".to_string()]);
}

#[tokio::test]
async fn write_to_unknown_edge_fails_without_network() {
    let server = MockServer::start().await;
    let mut client = client_for(&server);
    let err = client.turn_on("42").await.unwrap_err();
    assert!(matches!(err, Error::UnknownEdge(ref id) if id == "42"), "got {err:?}");
    assert!(err.is_protocol());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn write_retries_once_after_401() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client_id": "abc12345", "client_secret": "s3cr3t1234567890"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/premise/dsiot/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_ok()))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(&server, SCENARIO_RAW).await;
    Mock::given(method("PUT"))
        .and(path("/dsiot/multireq"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/dsiot/multireq"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": [{"rsc": 2000}]})))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.refresh().await.unwrap();
    client.turn_off("1").await.expect("write should succeed on retry");

    let bodies = write_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn write_rejected_by_result_code() {
    let server = MockServer::start().await;
    let mut client = refreshed_client(&server).await;
    Mock::given(method("PUT"))
        .and(path("/dsiot/multireq"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": [{"rsc": 4000}]})))
        .mount(&server)
        .await;

    let err = client.turn_on("1").await.unwrap_err();
    assert!(matches!(err, Error::WriteRejected(4000)), "got {err:?}");
    assert!(err.is_protocol());
    assert!(!err.is_auth());
}

#[tokio::test]
async fn write_accepts_noop_result_code() {
    let server = MockServer::start().await;
    let mut client = refreshed_client(&server).await;
    Mock::given(method("PUT"))
        .and(path("/dsiot/multireq"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": [{"rsc": 2004}]})))
        .mount(&server)
        .await;

    client.turn_on("1").await.unwrap();
}

#[tokio::test]
async fn write_http_failure_is_protocol_error() {
    let server = MockServer::start().await;
    let mut client = refreshed_client(&server).await;
    Mock::given(method("PUT"))
        .and(path("/dsiot/multireq"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.turn_on("1").await.unwrap_err();
    assert!(matches!(err, Error::Protocol(ref msg) if msg.contains("500")), "got {err:?}");
}

#[tokio::test]
async fn write_envelope_carries_mode_fan_and_power() {
    let server = MockServer::start().await;
    let mut client = refreshed_client(&server).await;
    Mock::given(method("PUT"))
        .and(path("/dsiot/multireq"))
        .and(header("authorization", "Bearer idt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": [{"rsc": 2000}]})))
        .mount(&server)
        .await;

    client.set_hvac_mode("1", Some(HvacMode::Dry)).await.unwrap();

    let bodies = write_bodies(&server).await;
    let body = &bodies[0];
    let item = &body["requests"][0];
    assert_eq!(item["op"], 3);
    assert_eq!(item["to"], "/dsiot/edges/1/adr_0100.dgc_status");

    let params = e3001_params(body);
    assert_eq!(params["p_01"], "0500");
    assert_eq!(params["p_22"], "020000");
    assert_eq!(params["p_27"], "0A00");

    let groups = &item["pc"]["pch"][0]["pch"];
    assert_eq!(groups[1], json!({"pn": "e_3003", "pch": [{"pn": "p_2D", "pv": "02"}]}));
    assert_eq!(groups[2], json!({"pn": "e_A002", "pch": [{"pn": "p_01", "pv": "01"}]}));
}

#[tokio::test]
async fn set_target_temperature_writes_half_degree_byte() {
    let server = MockServer::start().await;
    let mut client = refreshed_client(&server).await;
    Mock::given(method("PUT"))
        .and(path("/dsiot/multireq"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": [{"rsc": 2000}]})))
        .mount(&server)
        .await;

    client.set_target_temperature("1", 24.5).await.unwrap();

    let params = e3001_params(&write_bodies(&server).await[0]);
    assert_eq!(params["p_01"], "0200");
    assert_eq!(params["p_02"], "31");
}

#[tokio::test]
async fn set_target_temperature_rejects_out_of_range() {
    let server = MockServer::start().await;
    let mut client = refreshed_client(&server).await;

    let err = client.set_target_temperature("1", 200.0).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTemperature(_)), "got {err:?}");
    assert!(write_bodies(&server).await.is_empty());
}

#[tokio::test]
async fn set_fan_speed_uses_mode_specific_key() {
    let server = MockServer::start().await;
    let mut client = refreshed_client(&server).await;
    Mock::given(method("PUT"))
        .and(path("/dsiot/multireq"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": [{"rsc": 2000}]})))
        .mount(&server)
        .await;

    client.set_fan_speed("1", FanSpeed::Level3).await.unwrap();

    let params = e3001_params(&write_bodies(&server).await[0]);
    assert_eq!(params["p_09"], "0500");
    assert!(!params.contains_key("p_27"));
    assert!(!params.contains_key("p_28"));
}

#[tokio::test]
async fn set_swing_mode_overrides_louvre_params() {
    let server = MockServer::start().await;
    let mut client = refreshed_client(&server).await;
    Mock::given(method("PUT"))
        .and(path("/dsiot/multireq"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": [{"rsc": 2000}]})))
        .mount(&server)
        .await;

    client.set_swing_mode("1", SwingMode::Vertical).await.unwrap();

    let params = e3001_params(&write_bodies(&server).await[0]);
    assert_eq!(params["p_05"], "0F0000");
    assert_eq!(params["p_06"], "000000");
}

#[tokio::test]
async fn write_accepts_missing_result_code() {
    let server = MockServer::start().await;
    let mut client = refreshed_client(&server).await;
    Mock::given(method("PUT"))
        .and(path("/dsiot/multireq"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": [{}]})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/dsiot/multireq"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": [{"rsc": null}]})))
        .mount(&server)
        .await;

    client.turn_on("1").await.expect("absent rsc is accepted");
    client.turn_off("1").await.expect("null rsc is accepted");
}

#[tokio::test]
async fn write_non_integer_result_code_is_protocol_error() {
    let server = MockServer::start().await;
    let mut client = refreshed_client(&server).await;
    Mock::given(method("PUT"))
        .and(path("/dsiot/multireq"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": [{"rsc": "x"}]})))
        .mount(&server)
        .await;

    let err = client.turn_on("1").await.unwrap_err();
    assert!(matches!(err, Error::Protocol(ref msg) if msg.contains("rsc")), "got {err:?}");
}

#[tokio::test]
async fn diffed_message_log_compares_like_requests() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_refresh(&server, SCENARIO_RAW).await;
    let log = tempfile::NamedTempFile::new().unwrap();

    let mut client = DaikinClient::builder("user@example.com", "hunter2")
        .base_url(server.uri())
        .discovery_urls([format!("{}/common/login", server.uri())])
        .message_log(MessageLogMode::Diffed, log.path().to_str().unwrap())
        .build()
        .unwrap();
    client.refresh().await.unwrap();
    client.refresh().await.unwrap();

    let responses: Vec<Value> = std::fs::read_to_string(log.path())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str::<Value>(l).unwrap())
        .filter(|entry| entry["dir"] == "resp")
        .collect();
    assert_eq!(responses.len(), 4);
    assert_eq!(responses[0]["full"], true);
    assert_eq!(responses[1]["full"], true);
    for repeat in &responses[2..] {
        assert_eq!(repeat["changes"], json!([]), "unexpected changes in {repeat}");
    }
}
