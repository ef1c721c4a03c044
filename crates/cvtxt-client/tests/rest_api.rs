mod common;

use std::time::Duration;

use common::{Reply, TestServer};
use cvtxt_client::models::{CameraConfig, Counter, Direction, Motor, Servomotor};
use cvtxt_client::{ApiErrorKind, ClientConfig, ClientError, ControllerApi};

fn api(server: &TestServer) -> ControllerApi {
    ControllerApi::new(ClientConfig::new(server.base_url()).with_api_key("k"))
        .expect("client should be created")
}

fn api_kind(err: ClientError) -> ApiErrorKind {
    match err {
        ClientError::Api(err) => err.kind(),
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn discovery_parses_controllers() {
    let server = TestServer::start(Reply::json(
        200,
        r#"[{"name":"TXT 4.0","serial_number":"S1","firmware":"3.1"},{"name":"spare"}]"#,
    ))
    .await;

    let controllers = api(&server).get_controllers().await.expect("discovery");
    assert_eq!(controllers.len(), 2);
    assert_eq!(controllers[0].serial_number.as_deref(), Some("S1"));
    assert_eq!(controllers[1].name.as_deref(), Some("spare"));

    let received = server.received();
    assert_eq!(
        received[0].request_line(),
        "GET /api/v1/controller/discovery HTTP/1.1"
    );
    assert_eq!(received[0].header("x-api-key"), Some("k"));
}

#[tokio::test]
async fn statuses_map_to_error_kinds() {
    let cases = [
        (400, ApiErrorKind::BadRequest),
        (404, ApiErrorKind::NotFound),
        (412, ApiErrorKind::PreconditionFailed),
        (500, ApiErrorKind::InternalServer),
        (503, ApiErrorKind::Unexpected),
    ];
    for (status, kind) in cases {
        let server = TestServer::start(Reply::json(status, r#"{"message":"nope"}"#)).await;
        let err = api(&server)
            .get_controller_by_id(1)
            .await
            .expect_err("non-2xx should fail");
        match err {
            ClientError::Api(err) => {
                assert_eq!(err.kind(), kind, "status {status}");
                assert_eq!(err.status(), Some(status));
                assert_eq!(err.body(), r#"{"message":"nope"}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

#[tokio::test]
async fn unparsable_success_body_is_malformed_response() {
    let server = TestServer::start(Reply::json(200, "<html>oops</html>")).await;
    let err = api(&server)
        .get_controller_counters(1)
        .await
        .expect_err("body is not json");
    assert_eq!(api_kind(err), ApiErrorKind::MalformedResponse);
}

#[tokio::test]
async fn start_camera_posts_config() {
    let server = TestServer::start(Reply::new(200)).await;
    let config = CameraConfig {
        fps: 15,
        ..CameraConfig::default()
    };
    api(&server).start_camera(&config).await.expect("start camera");

    let received = server.received();
    assert_eq!(
        received[0].request_line(),
        "POST /api/v1/controller/camera/start HTTP/1.1"
    );
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).expect("json body");
    assert_eq!(
        body,
        serde_json::json!({ "debug": false, "fps": 15, "height": 480, "rotate": false, "width": 640 })
    );
}

#[tokio::test]
async fn stop_camera_and_counter_reset_use_expected_methods() {
    let server = TestServer::start(Reply::new(200)).await;
    let api = api(&server);
    api.stop_camera().await.expect("stop camera");
    api.update_controller_counter_by_id(1, 2)
        .await
        .expect("reset counter");
    api.init_controller_by_id(3).await.expect("init controller");

    let lines: Vec<String> = server
        .received()
        .iter()
        .map(|r| r.request_line().to_string())
        .collect();
    assert_eq!(
        lines,
        [
            "DELETE /api/v1/controller/camera/stop HTTP/1.1",
            "PATCH /api/v1/controller/1/counters/2 HTTP/1.1",
            "POST /api/v1/controller/3 HTTP/1.1",
        ]
    );
}

#[tokio::test]
async fn output_updates_serialize_bodies() {
    let server = TestServer::start(Reply::new(200)).await;
    let api = api(&server);
    api.update_controller_motor_by_id(1, 2, &Motor::new(300, Direction::Clockwise))
        .await
        .expect("motor update");
    api.update_controller_servomotor_by_id(
        1,
        4,
        &Servomotor {
            value: 256,
            ..Servomotor::default()
        },
    )
    .await
    .expect("servo update");
    api.add_controller_counters(
        1,
        &[Counter {
            name: Some("C1".to_string()),
            ..Counter::default()
        }],
    )
    .await
    .expect("add counters");

    let received = server.received();
    assert_eq!(
        received[0].request_line(),
        "POST /api/v1/controller/1/motors/2 HTTP/1.1"
    );
    let motor: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(motor, serde_json::json!({ "values": [300], "direction": "CW" }));

    let servo: serde_json::Value = serde_json::from_slice(&received[1].body).unwrap();
    assert_eq!(servo, serde_json::json!({ "value": 256 }));

    let counters: serde_json::Value = serde_json::from_slice(&received[2].body).unwrap();
    assert_eq!(counters, serde_json::json!([{ "name": "C1" }]));
}

#[tokio::test]
async fn slow_rest_call_times_out() {
    let server = TestServer::start(
        Reply::new(200)
            .pause(Duration::from_millis(500))
            .chunks(&[b"[]"]),
    )
    .await;
    let api = ControllerApi::new(
        ClientConfig::new(server.base_url()).with_request_timeout(Duration::from_millis(100)),
    )
    .expect("client should be created");

    let err = api.get_controllers().await.expect_err("should time out");
    assert!(matches!(err, ClientError::Transport(_)), "{err:?}");
    assert!(err.is_transient());
}
