mod common;

use std::time::Duration;

use common::entity;
use common::script;
use common::FakeController;
use common::FakeState;
use common::TOKEN;
use serde_json::json;
use verlichting::entity::OnOff;
use verlichting::entity::SceneMode;
use verlichting::routing::ServiceCall;
use verlichting::routing::ServiceDomain;
use verlichting::HttpUpstream;
use verlichting::Upstream;
use verlichting::UpstreamError;

fn client(url: &str) -> HttpUpstream {
    HttpUpstream::new(url, TOKEN.to_string(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_fetch_all_sends_bearer_token() {
    let controller = FakeController::start(FakeState {
        states: vec![
            entity("switch.tv_meubel", "on", "TV meubel"),
            script("script.uit", "Uit", Some("2025-10-19T21:31:10.500157+00:00")),
        ],
        ..Default::default()
    })
    .await;

    let entities = client(&controller.url).fetch_all().await.unwrap();

    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0].entity_id, "switch.tv_meubel");
    assert_eq!(entities[0].friendly_name(), "TV meubel");
    assert_eq!(
        entities[1].attributes.last_triggered.as_deref(),
        Some("2025-10-19T21:31:10.500157+00:00")
    );

    let requests = controller.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/api/states");
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer test-token")
    );
}

#[tokio::test]
async fn test_trailing_slash_in_base_url() {
    let controller = FakeController::start(FakeState::default()).await;

    let url = format!("{}/", controller.url);
    let entities = client(&url).fetch_all().await.unwrap();

    assert!(entities.is_empty());
    assert_eq!(controller.requests()[0].path, "/api/states");
}

#[tokio::test]
async fn test_empty_body_is_empty_list() {
    let controller = FakeController::start(FakeState {
        raw_states_body: Some(String::new()),
        ..Default::default()
    })
    .await;

    let entities = client(&controller.url).fetch_all().await.unwrap();
    assert!(entities.is_empty());
}

#[tokio::test]
async fn test_bad_records_are_skipped() {
    let controller = FakeController::start(FakeState {
        raw_states_body: Some(
            r#"[
                {"entity_id": "script.uit", "state": "off", "attributes": {"last_triggered": null}},
                {"entity_id": 17, "state": "on"},
                {"entity_id": "input_boolean.vacation_mode", "state": "on"}
            ]"#
            .to_string(),
        ),
        ..Default::default()
    })
    .await;

    let entities = client(&controller.url).fetch_all().await.unwrap();

    let ids: Vec<_> = entities.iter().map(|e| e.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["script.uit", "input_boolean.vacation_mode"]);
    assert_eq!(entities[0].attributes.last_triggered, None);
}

#[tokio::test]
async fn test_wrong_token_is_status_error() {
    let controller = FakeController::start(FakeState::default()).await;

    let upstream =
        HttpUpstream::new(&controller.url, "wrong".to_string(), Duration::from_secs(5)).unwrap();
    let err = upstream.fetch_all().await.unwrap_err();

    match err {
        UpstreamError::Status { status, endpoint } => {
            assert_eq!(status, 401);
            assert_eq!(endpoint, "GET /api/states");
        }
        other => panic!("Expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_status_error() {
    let controller = FakeController::start(FakeState {
        status: Some(502),
        ..Default::default()
    })
    .await;

    let call = ServiceCall::turn(ServiceDomain::Switch, "switch.x", OnOff::On);
    let err = client(&controller.url).invoke(&call).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "upstream returned status 502 for POST /api/services/switch/turn_on"
    );
}

#[tokio::test]
async fn test_malformed_json_is_decode_error() {
    let controller = FakeController::start(FakeState {
        raw_states_body: Some("<html>not json</html>".to_string()),
        ..Default::default()
    })
    .await;

    let err = client(&controller.url).fetch_all().await.unwrap_err();
    assert!(matches!(err, UpstreamError::Decode { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_unreachable_controller_is_transport_error() {
    // Grab a free port and release it again
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client(&url).fetch_all().await.unwrap_err();
    assert!(matches!(err, UpstreamError::Transport { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_slow_controller_times_out() {
    let controller = FakeController::start(FakeState {
        delay: Some(Duration::from_secs(2)),
        ..Default::default()
    })
    .await;

    let upstream =
        HttpUpstream::new(&controller.url, TOKEN.to_string(), Duration::from_millis(200)).unwrap();
    let err = upstream.fetch_all().await.unwrap_err();

    match err {
        UpstreamError::Transport { source, .. } => assert!(source.is_timeout()),
        other => panic!("Expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invoke_posts_entity_id() {
    let controller = FakeController::start(FakeState {
        service_response: vec![entity("light.keuken", "off", "Keuken")],
        ..Default::default()
    })
    .await;

    let call = ServiceCall::turn(ServiceDomain::Light, "light.keuken", OnOff::Off);
    let raw = client(&controller.url).invoke(&call).await.unwrap().unwrap();

    assert_eq!(raw.entity_id, "light.keuken");
    assert_eq!(raw.state, "off");

    let requests = controller.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/api/services/light/turn_off");
    assert_eq!(requests[0].body, Some(json!({"entity_id": "light.keuken"})));
}

#[tokio::test]
async fn test_invoke_prefers_matching_entity() {
    let controller = FakeController::start(FakeState {
        service_response: vec![
            entity("light.keuken", "on", "Keuken"),
            script("script.koken", "Koken", Some("2025-10-19T18:00:00+00:00")),
        ],
        ..Default::default()
    })
    .await;

    let call = ServiceCall::activate_scene(SceneMode::Script, "script.koken");
    let raw = client(&controller.url).invoke(&call).await.unwrap().unwrap();
    assert_eq!(raw.entity_id, "script.koken");

    let requests = controller.requests();
    assert_eq!(requests[0].path, "/api/services/script/koken");
    assert_eq!(requests[0].body, Some(json!({})));
}

#[tokio::test]
async fn test_invoke_with_empty_response() {
    let controller = FakeController::start(FakeState::default()).await;

    let call = ServiceCall::activate_scene(SceneMode::Scene, "scene.avond");
    let raw = client(&controller.url).invoke(&call).await.unwrap();
    assert!(raw.is_none());
}

#[tokio::test]
async fn test_fetch_one() {
    let controller = FakeController::start(FakeState {
        states: vec![
            entity("switch.x", "on", "X"),
            entity("input_boolean.vacation_mode", "off", "Vakantie"),
        ],
        ..Default::default()
    })
    .await;
    let upstream = client(&controller.url);

    let raw = upstream
        .fetch_one("input_boolean.vacation_mode")
        .await
        .unwrap();
    assert_eq!(raw.friendly_name(), "Vakantie");

    let err = upstream.fetch_one("switch.missing").await.unwrap_err();
    assert!(matches!(err, UpstreamError::Status { status: 404, .. }));
}
