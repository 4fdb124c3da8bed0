use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        validation::validate_identifier,
        ws::{DeviceInboundMessage, DeviceOutboundMessage},
    },
    error::ServiceError,
    services::{delivery::send_json, roles_events},
    state::{SharedState, device::DeviceMetadata, hub::SocketConnection},
};

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Internal error type for per-connection message handling.
///
/// Distinct from `ServiceError` which is used for HTTP responses.
#[derive(Debug, Error)]
enum SocketError {
    /// No player is currently elected or its socket is not reachable.
    #[error("no active player")]
    NoActivePlayer,
    /// Error from the coordination layer.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Identity of a joined connection.
struct Session {
    socket_id: String,
    user_id: String,
    device_id: String,
}

/// Handle the full lifecycle of one device WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(JOIN_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket join timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let (user_id, metadata) = match parse_join(&initial_message) {
        Ok(join) => join,
        Err(message) => {
            warn!(reason = %message, "rejecting websocket without a valid join");
            send_json(&outbound_tx, &DeviceOutboundMessage::Error { message });
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let session = Session {
        socket_id: Uuid::new_v4().simple().to_string(),
        device_id: metadata.device_id.clone(),
        user_id,
    };

    if let Err(err) = join(&state, &session, metadata, &outbound_tx).await {
        warn!(
            user_id = %session.user_id,
            device_id = %session.device_id,
            error = %err,
            "device join failed"
        );
        send_json(
            &outbound_tx,
            &DeviceOutboundMessage::Error {
                message: err.to_string(),
            },
        );
        leave(&state, &session).await;
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match DeviceInboundMessage::from_json_str(&text) {
                Ok(DeviceInboundMessage::Heartbeat) => {
                    if let Err(err) = state
                        .registry()
                        .update_heartbeat(&session.user_id, &session.device_id)
                        .await
                    {
                        warn!(device_id = %session.device_id, error = %err, "heartbeat not recorded");
                    }
                }
                Ok(DeviceInboundMessage::Command { payload }) => {
                    match relay_command(&state, &session, payload).await {
                        Ok(()) => {}
                        Err(err) => {
                            debug!(device_id = %session.device_id, error = %err, "command not relayed");
                            let reply = DeviceOutboundMessage::Error {
                                message: err.to_string(),
                            };
                            if !send_json(&outbound_tx, &reply) {
                                break;
                            }
                        }
                    }
                }
                Ok(DeviceInboundMessage::Leave) => {
                    info!(device_id = %session.device_id, "device left");
                    let _ = outbound_tx.send(Message::Close(None));
                    break;
                }
                Ok(DeviceInboundMessage::Join { .. }) => {
                    warn!(device_id = %session.device_id, "ignoring duplicate join message");
                }
                Ok(DeviceInboundMessage::Unknown) => {
                    debug!(device_id = %session.device_id, "ignoring unknown message type");
                }
                Err(err) => {
                    warn!(device_id = %session.device_id, error = %err, "failed to parse device message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(device_id = %session.device_id, "device closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(device_id = %session.device_id, error = %err, "websocket error");
                break;
            }
        }
    }

    leave(&state, &session).await;
    finalize(writer_task, outbound_tx).await;
}

/// Parse and validate the first frame, which must be a `join`.
fn parse_join(text: &str) -> Result<(String, DeviceMetadata), String> {
    let inbound = DeviceInboundMessage::from_json_str(text)
        .map_err(|err| format!("invalid message: {err}"))?;
    let DeviceInboundMessage::Join { user_id, device } = inbound else {
        return Err("first message must be a join".into());
    };
    validate_identifier(&user_id).map_err(|err| format!("invalid userId: {err}"))?;
    device
        .validate()
        .map_err(|err| format!("invalid device: {err}"))?;
    Ok((user_id, device.into()))
}

/// Register the device, attach the socket locally and run an election.
async fn join(
    state: &SharedState,
    session: &Session,
    metadata: DeviceMetadata,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), SocketError> {
    state
        .registry()
        .register_device(&session.user_id, metadata, &session.socket_id)
        .await?;
    state.sockets().attach(
        session.socket_id.clone(),
        SocketConnection {
            user_id: session.user_id.clone(),
            device_id: session.device_id.clone(),
            tx: outbound_tx.clone(),
            roles: None,
        },
    );
    info!(
        user_id = %session.user_id,
        device_id = %session.device_id,
        socket_id = %session.socket_id,
        "device joined"
    );

    // Only a failed registration rejects the device. An election that cannot run
    // leaves the stored assignment in force; the sweep or the next event retries.
    if let Err(err) = roles_events::elect_and_publish(state, &session.user_id).await {
        warn!(
            user_id = %session.user_id,
            device_id = %session.device_id,
            error = %err,
            "election after join failed; serving stored roles"
        );
        match state.election().get_current_roles(&session.user_id).await {
            Ok(roles) => {
                roles_events::publish_roles(state, &session.user_id, &roles);
            }
            Err(err) => {
                warn!(user_id = %session.user_id, error = %err, "stored roles unavailable");
            }
        }
    }
    Ok(())
}

/// Forward a command payload to the socket of the elected player.
async fn relay_command(
    state: &SharedState,
    session: &Session,
    payload: Value,
) -> Result<(), SocketError> {
    let election = state.election();
    let roles = election.get_current_roles(&session.user_id).await?;
    let player_socket = election
        .resolve_player_socket_id(&session.user_id, &roles)
        .await?
        .ok_or(SocketError::NoActivePlayer)?;

    let message = DeviceOutboundMessage::Command {
        from_device_id: session.device_id.clone(),
        payload,
    };
    if state.delivery().deliver_command(&player_socket, &message) {
        debug!(
            user_id = %session.user_id,
            from = %session.device_id,
            to_socket = %player_socket,
            "command relayed"
        );
        Ok(())
    } else {
        Err(SocketError::NoActivePlayer)
    }
}

/// Forget the socket locally and in the registry, then re-elect.
async fn leave(state: &SharedState, session: &Session) {
    state.sockets().detach(&session.socket_id);
    match state
        .registry()
        .remove_device_by_socket(&session.user_id, &session.socket_id)
        .await
    {
        Ok(Some(device_id)) => {
            info!(user_id = %session.user_id, device_id = %device_id, "device disconnected");
            roles_events::elect_and_publish_logged(state, &session.user_id).await;
        }
        Ok(None) => {}
        Err(err) => {
            warn!(
                user_id = %session.user_id,
                socket_id = %session.socket_id,
                error = %err,
                "failed to unregister device; it will age out"
            );
        }
    }
}

async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
