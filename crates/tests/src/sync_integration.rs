//! Integration tests for the synchronization pass
//!
//! These tests run the directory, the session and the driver together
//! against an in-memory host and controller.

use serde_json::json;
use std::sync::Arc;
use switchboard_core::domain::{
    ControlSession, DeviceDirectory, DeviceError, DeviceSpec, Direction, NativeId, Route,
    SessionError, SessionState, SourceAssignment, SwitchboardConfig, SyncDriver, SyncError,
};
use switchboard_tests::{init_tracing, FakeController, FakeHost};

fn driver(host: Arc<FakeHost>, controller: &FakeController, config: &SwitchboardConfig) -> SyncDriver<FakeController> {
    init_tracing();
    let directory = DeviceDirectory::new(host);
    let defaults = directory
        .defaults_from_host(config.defaults.input.as_deref(), config.defaults.output.as_deref())
        .unwrap();
    SyncDriver::new(directory, ControlSession::new(controller.clone()), defaults)
}

fn config(doc: &str) -> SwitchboardConfig {
    SwitchboardConfig::from_toml(doc).unwrap()
}

const HEADSET_ONLY: &str = r#"
[[inputs]]
source = "mic-1"
device = "Headset Microphone"
"#;

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_single_input_route_is_pushed() {
    let host = FakeHost::new(&[("Speakers", "S1")], &[("Headset Microphone", "A1")]);
    let controller = FakeController::obs();
    let config = config(HEADSET_ONLY);

    let summary = driver(host, &controller, &config)
        .run(&config.routes())
        .await
        .unwrap();

    assert_eq!(summary.applied(), 1);
    let state = controller.state.lock().unwrap();
    assert_eq!(
        state.calls_to("SetSourceSettings"),
        vec![json!({ "sourceName": "Mic/Aux", "sourceSettings": { "device_id": "A1" } })]
    );
}

#[tokio::test]
async fn test_missing_device_issues_no_set_call() {
    let host = FakeHost::new(&[("Speakers", "S1")], &[]);
    let controller = FakeController::obs();
    let config = config(
        r#"
[defaults]
input = "Headset Microphone"

[[inputs]]
source = "mic-1"
device = "Headset Microphone"
"#,
    );

    let summary = driver(host, &controller, &config)
        .run(&config.routes())
        .await
        .unwrap();

    assert_eq!(summary.applied(), 0);
    assert_eq!(summary.skipped(), 1);
    assert!(controller.state.lock().unwrap().calls_to("SetSourceSettings").is_empty());

    let diagnostic = summary.outcomes[0].diagnostic().unwrap();
    assert!(diagnostic.contains("Headset Microphone"));
    assert!(diagnostic.contains("Available audio input devices: (none)"));
    match &summary.outcomes[0] {
        switchboard_core::domain::RouteOutcome::Skipped {
            error: SyncError::Device(DeviceError::NotFound { name, available, .. }),
            ..
        } => {
            assert_eq!(name, "Headset Microphone");
            assert!(available.is_empty());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_default_device_id_is_reported_as_system_default() {
    let host = FakeHost::new(&[("Speakers", "S1")], &[("Headset Microphone", "A1")]);
    let controller = FakeController::obs();
    controller.set_device("Desktop Audio", "S1");
    controller.set_device("Mic/Aux", "unplugged-id");
    let config = config("");

    let mut driver = driver(host, &controller, &config);
    let report = driver.report().await.unwrap();

    let by_role = |role: &str| report.iter().find(|r| r.role == role).unwrap().assignment.clone();
    assert_eq!(
        by_role("desktop-1"),
        SourceAssignment::Device {
            name: "Speakers".to_string(),
            id: NativeId::new("S1")
        }
    );
    assert_eq!(by_role("desktop-2"), SourceAssignment::SystemDefault);
    assert_eq!(by_role("mic-1"), SourceAssignment::Unknown(NativeId::new("unplugged-id")));

    // Reporting never writes
    assert!(controller.state.lock().unwrap().calls_to("SetSourceSettings").is_empty());
}

// ============================================================================
// PARTIAL FAILURE
// ============================================================================

#[tokio::test]
async fn test_one_bad_route_does_not_stop_the_others() {
    let host = FakeHost::new(
        &[("Speakers (USB Audio Device)", "S1"), ("HDMI", "S2")],
        &[("Headset Microphone (Rift S)", "A1"), ("Line In", "A2")],
    );
    let controller = FakeController::obs();
    let config = config(
        r#"
[defaults]
input = "Line In"

[[inputs]]
source = "mic-1"
device = "Headset Microphone (Rift S)"

[[inputs]]
source = "mic-2"
device = "Webcam Mic"

[[outputs]]
source = "desktop-1"
device = "Speakers (USB Audio Device)"

[[outputs]]
source = "desktop-2"
device = "default"
"#,
    );

    let summary = driver(host, &controller, &config)
        .run(&config.routes())
        .await
        .unwrap();

    assert_eq!(summary.applied(), 3);
    assert_eq!(summary.skipped(), 1);

    let state = controller.state.lock().unwrap();
    assert_eq!(state.device_id("Mic/Aux").as_deref(), Some("A1"));
    assert_eq!(state.device_id("Mic/Aux 2").as_deref(), Some("default"));
    assert_eq!(state.device_id("Desktop Audio").as_deref(), Some("S1"));
    // No output default configured: the OS default speaker is used
    assert_eq!(state.device_id("Desktop Audio 2").as_deref(), Some("S1"));
    assert!(!state.connected);
}

#[tokio::test]
async fn test_ambiguous_name_is_skipped() {
    let host = FakeHost::new(&[], &[("USB Mic", "A1"), ("USB Mic", "A2"), ("Line In", "A3")]);
    let controller = FakeController::obs();
    let config = config(
        r#"
[defaults]
output = "Speakers"

[[inputs]]
source = "mic-1"
device = "USB Mic"

[[inputs]]
source = "mic-2"
device = "Line In"
"#,
    );

    let mut driver = driver(host, &controller, &config);
    let outcomes = driver.apply(&config.routes()).await.unwrap();

    assert!(matches!(
        &outcomes[0],
        switchboard_core::domain::RouteOutcome::Skipped {
            error: SyncError::Device(DeviceError::Ambiguous { .. }),
            ..
        }
    ));
    let diagnostic = outcomes[0].diagnostic().unwrap();
    assert!(diagnostic.contains("ID: 'A1'"));
    assert!(diagnostic.contains("ID: 'A2'"));
    assert!(outcomes[1].is_applied());

    let state = controller.state.lock().unwrap();
    assert_eq!(state.device_id("Mic/Aux").as_deref(), Some("default"));
    assert_eq!(state.device_id("Mic/Aux 2").as_deref(), Some("A3"));
}

#[tokio::test]
async fn test_non_audio_source_is_reported_unreadable() {
    let host = FakeHost::new(&[("Speakers", "S1")], &[("Line In", "A1")]);
    let controller = FakeController::obs();
    controller
        .state
        .lock()
        .unwrap()
        .settings
        .insert("Desktop Audio".to_string(), json!({ "color": 4278190080u32 }));
    let config = config("");

    let mut driver = driver(host, &controller, &config);
    let report = driver.report().await.unwrap();
    let desktop = report.iter().find(|r| r.role == "desktop-1").unwrap();
    assert!(matches!(desktop.assignment, SourceAssignment::Unreadable(_)));
    assert_eq!(report.len(), 4);
}

#[tokio::test]
async fn test_report_then_raw_ids_share_one_connection() {
    let host = FakeHost::new(&[("Speakers", "S1")], &[("Line In", "A1")]);
    let controller = FakeController::obs();
    controller.set_device("Mic/Aux", "A1");
    let config = config("");

    let mut driver = driver(host, &controller, &config);
    driver.report().await.unwrap();
    let mut session = driver.into_session();
    let states = session.source_states().await.unwrap();
    session.disconnect().await.unwrap();

    assert_eq!(states.len(), 4);
    assert_eq!(states["mic-1"].source_name, "Mic/Aux");
    assert_eq!(states["mic-1"].device_id, NativeId::new("A1"));
    assert!(states["desktop-2"].device_id.is_default());
    let state = controller.state.lock().unwrap();
    assert_eq!((state.opens, state.closes), (1, 1));
}

#[tokio::test]
async fn test_transport_loss_aborts_and_disconnects() {
    let host = FakeHost::new(&[("Speakers", "S1")], &[("Line In", "A1")]);
    let controller = FakeController::obs();
    controller.state.lock().unwrap().drop_on = Some("SetSourceSettings".to_string());
    let config = config(
        r#"
[[inputs]]
source = "mic-1"
device = "Line In"

[[outputs]]
source = "desktop-1"
device = "Speakers"
"#,
    );

    let mut driver = driver(host, &controller, &config);
    let err = driver.run(&config.routes()).await.unwrap_err();

    assert!(matches!(err, SyncError::Session(SessionError::Transport(_))));
    assert_eq!(driver.session().state(), SessionState::Disconnected);
    let state = controller.state.lock().unwrap();
    assert!(state.calls_to("SetSourceSettings").is_empty());
    assert_eq!(state.closes, 1);
}

#[tokio::test]
async fn test_unreachable_controller_fails_the_pass() {
    let host = FakeHost::new(&[("Speakers", "S1")], &[("Line In", "A1")]);
    let controller = FakeController::obs();
    controller.state.lock().unwrap().unreachable = true;
    let config = config(HEADSET_ONLY);

    let err = driver(host, &controller, &config)
        .run(&config.routes())
        .await
        .unwrap_err();
    assert!(!err.is_route_scoped());
}

// ============================================================================
// SESSION AND DIRECTORY PROPERTIES
// ============================================================================

#[tokio::test]
async fn test_set_then_get_round_trip() {
    let controller = FakeController::obs();
    let mut session = ControlSession::new(controller.clone());
    let id = NativeId::new("{0.0.0.00000000}.{5b0c}");

    session.set_source_device_id("Desktop Audio 2", &id).await.unwrap();
    assert_eq!(session.source_device_id("Desktop Audio 2").await.unwrap(), id);
    assert_eq!(controller.state.lock().unwrap().opens, 1);
}

#[tokio::test]
async fn test_enumeration_changes_between_routes_are_seen() {
    let host = FakeHost::new(&[("Speakers", "S1")], &[("Line In", "A1")]);
    let directory = DeviceDirectory::new(host.clone());

    assert!(directory.resolve_by_name("Line In", Direction::Input).is_ok());

    // Device re-plugged with a new id
    host.mics.lock().unwrap()[0] =
        switchboard_core::domain::DeviceRecord::new(Direction::Input, "Line In", "A9");
    let record = directory.resolve_by_name("Line In", Direction::Input).unwrap();
    assert_eq!(record.native_id.as_str(), "A9");
}

#[test]
fn test_routes_keep_configuration_order() {
    let config = config(
        r#"
[[outputs]]
source = "desktop-1"
device = "Speakers"

[[inputs]]
source = "mic-2"
device = "id:A2"

[[inputs]]
source = "mic-1"
device = "default"
"#,
    );

    let routes = config.routes();
    assert_eq!(
        routes,
        vec![
            Route {
                source_role: "mic-2".to_string(),
                device: DeviceSpec::ByNativeId(NativeId::new("A2")),
                direction: Direction::Input,
            },
            Route {
                source_role: "mic-1".to_string(),
                device: DeviceSpec::Default,
                direction: Direction::Input,
            },
            Route {
                source_role: "desktop-1".to_string(),
                device: DeviceSpec::ByName("Speakers".to_string()),
                direction: Direction::Output,
            },
        ]
    );
}
