use std::{sync::Arc, time::Duration};

use axum::extract::ws::Message;
use roles_coordinator::{
    config::{AppConfig, ElectionSettings},
    dao::presence_store::memory::MemoryPresenceStore,
    dto::ws::DeviceOutboundMessage,
    services::{election_sweep, roles_events},
    state::{
        AppState, SharedState,
        clock::ManualClock,
        device::{DeviceMetadata, DeviceType},
        hub::SocketConnection,
    },
};
use serde_json::Value;
use tokio::sync::mpsc;

const USER: &str = "user-1";

struct Device {
    socket_id: String,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Device {
    fn frames(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            if let Message::Text(text) = message {
                frames.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        frames
    }
}

fn app(clock: Arc<ManualClock>) -> SharedState {
    instance(Arc::new(MemoryPresenceStore::new()), clock)
}

/// One process instance attached to a (possibly shared) coordination store.
fn instance(store: Arc<MemoryPresenceStore>, clock: Arc<ManualClock>) -> SharedState {
    let config = AppConfig::default().with_election(ElectionSettings {
        stale_after: Duration::from_secs(30),
        ..ElectionSettings::default()
    });
    AppState::new(config, store, "memory", clock)
}

async fn join(state: &SharedState, device_id: &str, device_type: DeviceType, can_play: bool) -> Device {
    let socket_id = format!("socket-{device_id}");
    state
        .registry()
        .register_device(
            USER,
            DeviceMetadata {
                device_id: device_id.into(),
                device_type,
                can_play,
                preferred_role: None,
            },
            &socket_id,
        )
        .await
        .unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    state.sockets().attach(
        socket_id.clone(),
        SocketConnection {
            user_id: USER.into(),
            device_id: device_id.into(),
            tx,
            roles: None,
        },
    );
    roles_events::elect_and_publish(state, USER).await.unwrap();
    Device { socket_id, rx }
}

async fn leave(state: &SharedState, device: &Device) {
    state.sockets().detach(&device.socket_id);
    state
        .registry()
        .remove_device_by_socket(USER, &device.socket_id)
        .await
        .unwrap();
    roles_events::elect_and_publish(state, USER).await.unwrap();
}

#[tokio::test]
async fn devices_joining_and_leaving_reshape_the_assignment() {
    let clock = Arc::new(ManualClock::new(1_000));
    let state = app(clock.clone());

    let mut phone = join(&state, "phone", DeviceType::Phone, true).await;
    let frames = phone.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["roles"]["playerDeviceId"], "phone");
    assert_eq!(frames[0]["roles"]["remoteDeviceId"], "phone");

    clock.advance(10);
    let mut desktop = join(&state, "desktop", DeviceType::Desktop, true).await;
    let roles = state.election().get_current_roles(USER).await.unwrap();
    assert_eq!(roles.player_device_id.as_deref(), Some("desktop"));
    assert_eq!(roles.remote_device_id.as_deref(), Some("phone"));
    assert_eq!(roles.version, 2);
    assert_eq!(phone.frames()[0]["roles"]["version"], 2);
    assert_eq!(desktop.frames()[0]["roles"]["version"], 2);

    // A tablet outranks nobody for either role: no commit, only the newcomer is told.
    clock.advance(10);
    let mut tablet = join(&state, "tablet", DeviceType::Tablet, true).await;
    assert_eq!(state.election().get_current_roles(USER).await.unwrap().version, 2);
    assert!(phone.frames().is_empty());
    assert!(desktop.frames().is_empty());
    assert_eq!(tablet.frames()[0]["roles"]["version"], 2);

    leave(&state, &desktop).await;
    let roles = state.election().get_current_roles(USER).await.unwrap();
    assert_eq!(roles.player_device_id.as_deref(), Some("tablet"));
    assert_eq!(roles.remote_device_id.as_deref(), Some("phone"));
    assert_eq!(roles.version, 3);
    assert_eq!(tablet.frames()[0]["roles"]["playerDeviceId"], "tablet");
}

#[tokio::test]
async fn commands_reach_the_elected_player_socket() {
    let clock = Arc::new(ManualClock::new(0));
    let state = app(clock);

    let mut desktop = join(&state, "desktop", DeviceType::Desktop, true).await;
    let _phone = join(&state, "phone", DeviceType::Phone, false).await;
    desktop.frames();

    let roles = state.election().get_current_roles(USER).await.unwrap();
    let player_socket = state
        .election()
        .resolve_player_socket_id(USER, &roles)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(player_socket, desktop.socket_id);

    let delivered = state.delivery().deliver_command(
        &player_socket,
        &DeviceOutboundMessage::Command {
            from_device_id: "phone".into(),
            payload: serde_json::json!({ "action": "play" }),
        },
    );
    assert!(delivered);
    let frames = desktop.frames();
    assert_eq!(frames[0]["type"], "command");
    assert_eq!(frames[0]["payload"]["action"], "play");
}

#[tokio::test]
async fn sweep_demotes_a_player_that_stopped_heartbeating() {
    let clock = Arc::new(ManualClock::new(0));
    let state = app(clock.clone());

    let _desktop = join(&state, "desktop", DeviceType::Desktop, true).await;
    let mut phone = join(&state, "phone", DeviceType::Phone, true).await;
    phone.frames();

    clock.set(31_000);
    state.registry().update_heartbeat(USER, "phone").await.unwrap();
    assert_eq!(election_sweep::sweep_once(&state).await, 1);

    let frames = phone.frames();
    assert_eq!(frames[0]["roles"]["playerDeviceId"], "phone");
    assert_eq!(frames[0]["roles"]["remoteDeviceId"], "phone");
}

#[tokio::test]
async fn commits_from_another_instance_reach_local_sockets_on_the_next_sweep() {
    let clock = Arc::new(ManualClock::new(0));
    let store = Arc::new(MemoryPresenceStore::new());
    let instance_a = instance(store.clone(), clock.clone());
    let instance_b = instance(store, clock.clone());

    let mut phone = join(&instance_a, "phone", DeviceType::Phone, true).await;
    assert_eq!(phone.frames()[0]["roles"]["playerDeviceId"], "phone");

    clock.advance(10);
    let mut desk = join(&instance_b, "desk", DeviceType::Desktop, true).await;
    assert_eq!(desk.frames()[0]["roles"]["version"], 2);
    assert!(phone.frames().is_empty(), "instance B cannot reach sockets of A");

    // A's sweep commits nothing but forwards the assignment its socket missed.
    assert_eq!(election_sweep::sweep_once(&instance_a).await, 0);
    let frames = phone.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["roles"]["version"], 2);
    assert_eq!(frames[0]["roles"]["playerDeviceId"], "desk");
    assert_eq!(frames[0]["roles"]["remoteDeviceId"], "phone");

    // Nothing new on the following pass.
    assert_eq!(election_sweep::sweep_once(&instance_a).await, 0);
    assert!(phone.frames().is_empty());
}
