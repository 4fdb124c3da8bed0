use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    dto::ws::DeviceOutboundMessage,
    state::{hub::SocketHub, roles::RolesState},
};

/// Outbound side of the coordinator: how role updates and commands reach devices.
pub trait DeliveryChannel: Send + Sync {
    /// Push `roles` to every connection of `user_id`, returning how many were reached.
    fn broadcast_roles(&self, user_id: &str, roles: &RolesState) -> usize;

    /// Send `message` to one connection. Returns `false` when the socket is gone.
    fn deliver_command(&self, socket_id: &str, message: &DeviceOutboundMessage) -> bool;
}

impl DeliveryChannel for SocketHub {
    fn broadcast_roles(&self, user_id: &str, roles: &RolesState) -> usize {
        let message = DeviceOutboundMessage::RolesUpdated {
            roles: roles.clone(),
        };
        let targets = self.record_roles(user_id, roles);
        let mut delivered = 0;
        for (socket_id, tx) in targets {
            if send_json(&tx, &message) {
                delivered += 1;
            } else {
                debug!(user_id, socket_id = %socket_id, "roles update skipped; writer closed");
            }
        }
        delivered
    }

    fn deliver_command(&self, socket_id: &str, message: &DeviceOutboundMessage) -> bool {
        match self.sender(socket_id) {
            Some(tx) => send_json(&tx, message),
            None => false,
        }
    }
}

/// Serialize `value` and queue it on a socket writer.
///
/// Returns `false` only when the writer is closed. A serialization failure is a bug,
/// logged and reported as delivered since retrying cannot help.
pub fn send_json<T>(tx: &mpsc::UnboundedSender<Message>, value: &T) -> bool
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return true;
        }
    };
    tx.send(Message::Text(payload.into())).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::hub::SocketConnection;

    fn attach(hub: &SocketHub, socket_id: &str, user_id: &str) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        hub.attach(
            socket_id.into(),
            SocketConnection {
                user_id: user_id.into(),
                device_id: format!("{socket_id}-device"),
                tx,
                roles: None,
            },
        );
        rx
    }

    fn roles(version: u64) -> RolesState {
        RolesState {
            version,
            player_device_id: Some("p".into()),
            remote_device_id: Some("r".into()),
        }
    }

    fn text(message: Message) -> serde_json::Value {
        match message {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn roles_reach_only_the_users_sockets() {
        let hub = SocketHub::new();
        let mut a = attach(&hub, "a", "u1");
        let mut b = attach(&hub, "b", "u1");
        let mut c = attach(&hub, "c", "u2");

        assert_eq!(hub.broadcast_roles("u1", &roles(3)), 2);
        assert_eq!(text(a.try_recv().unwrap())["roles"]["version"], 3);
        assert_eq!(text(b.try_recv().unwrap())["type"], "roles-updated");
        assert!(c.try_recv().is_err());
        assert_eq!(hub.roles_of("a").unwrap().version, 3);
    }

    #[test]
    fn older_versions_are_not_pushed_over_newer_ones() {
        let hub = SocketHub::new();
        let mut a = attach(&hub, "a", "u1");

        hub.broadcast_roles("u1", &roles(5));
        assert_eq!(hub.broadcast_roles("u1", &roles(4)), 0);
        assert_eq!(text(a.try_recv().unwrap())["roles"]["version"], 5);
        assert!(a.try_recv().is_err());
        assert_eq!(hub.roles_of("a").unwrap().version, 5);
    }

    #[test]
    fn repeated_versions_only_reach_sockets_that_missed_them() {
        let hub = SocketHub::new();
        let mut a = attach(&hub, "a", "u1");
        hub.broadcast_roles("u1", &roles(2));
        let mut late = attach(&hub, "late", "u1");

        assert_eq!(hub.broadcast_roles("u1", &roles(2)), 1);
        assert_eq!(text(a.try_recv().unwrap())["roles"]["version"], 2);
        assert!(a.try_recv().is_err());
        assert_eq!(text(late.try_recv().unwrap())["roles"]["version"], 2);
    }

    #[test]
    fn commands_to_missing_or_closed_sockets_report_failure() {
        let hub = SocketHub::new();
        let message = DeviceOutboundMessage::Command {
            from_device_id: "remote".into(),
            payload: serde_json::json!({ "action": "pause" }),
        };
        assert!(!hub.deliver_command("nobody", &message));

        let rx = attach(&hub, "player", "u1");
        drop(rx);
        assert!(!hub.deliver_command("player", &message));

        let mut rx = attach(&hub, "player2", "u1");
        assert!(hub.deliver_command("player2", &message));
        let frame = text(rx.try_recv().unwrap());
        assert_eq!(frame["fromDeviceId"], "remote");
        assert_eq!(frame["payload"]["action"], "pause");
    }
}
