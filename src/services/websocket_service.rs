use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    services::{answer_service, session_service},
    state::{
        SharedState,
        registry::{ConnectionHandle, ConnectionRole},
    },
};

/// Attach parameters taken from the upgrade request.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// Room code, i.e. the session's join code.
    pub code: String,
    pub role: ConnectionRole,
    /// Identity recovered across reconnects.
    pub participant_id: Option<Uuid>,
}

/// Handle the full lifecycle of one host or participant WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket, params: ConnectionParams) {
    let (mut sender, mut receiver) = socket.split();

    let Some((handle, mut room_rx)) =
        state
            .registry()
            .attach(&params.code, params.role, params.participant_id)
    else {
        warn!("websocket attached without a room code");
        let _ = sender.send(Message::Close(None)).await;
        return;
    };

    // Control frames bypass the room queue so they are never dropped.
    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<Message>();

    let writer_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(message) = room_rx.recv() => message,
                Some(message) = control_rx.recv() => message,
                else => break,
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    info!(
        code = %handle.code(),
        role = ?handle.role(),
        participant = ?params.participant_id,
        "websocket connected"
    );

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(code = %handle.code(), payload = %text, "received client message");
                match ClientMessage::from_json_str(&text) {
                    Ok(message) => dispatch(&state, &handle, message).await,
                    Err(err) => {
                        warn!(
                            code = %handle.code(),
                            role = ?handle.role(),
                            error = %err,
                            "failed to parse client message"
                        );
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = control_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                debug!(code = %handle.code(), "client closed the connection");
                let _ = control_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(code = %handle.code(), error = %err, "websocket error");
                break;
            }
        }
    }

    state.registry().detach(&handle);
    info!(code = %handle.code(), role = ?handle.role(), "websocket disconnected");

    finalize(writer_task, control_tx).await;
}

async fn dispatch(state: &SharedState, handle: &ConnectionHandle, message: ClientMessage) {
    let kind = message.kind();
    let identity = state.registry().participant_id(handle);

    let result = match message {
        ClientMessage::Join { participant_id, .. } => {
            if handle.role() != ConnectionRole::Participant {
                Err(ServiceError::InvalidState(
                    "only participants can join".into(),
                ))
            } else {
                session_service::register_connection(state, handle, participant_id).await
            }
        }
        ClientMessage::Answer {
            participant_id,
            option_id,
            time_taken,
        } => {
            if handle.role() != ConnectionRole::Participant || identity != Some(participant_id) {
                warn!(
                    code = %handle.code(),
                    role = ?handle.role(),
                    participant = %participant_id,
                    identity = ?identity,
                    "answer does not match the connection identity; dropped"
                );
                return;
            }
            match answer_service::submit_answer(state, handle, participant_id, option_id, time_taken)
                .await
            {
                Ok(_) => Ok(()),
                Err(ServiceError::NotFound(reason)) => {
                    warn!(
                        code = %handle.code(),
                        participant = %participant_id,
                        %reason,
                        "answer references unknown records; dropped"
                    );
                    return;
                }
                Err(err) => Err(err),
            }
        }
        ClientMessage::StartGame | ClientMessage::NextQuestion | ClientMessage::EndGame => {
            host_command(state, handle, message).await
        }
        ClientMessage::Unknown => {
            debug!(code = %handle.code(), "ignoring unknown message type");
            return;
        }
    };

    if let Err(err) = result {
        warn!(
            code = %handle.code(),
            role = ?handle.role(),
            participant = ?identity,
            command = kind,
            error = %err,
            "client command rejected"
        );
        state
            .registry()
            .send_to(handle, &ServerMessage::error(err.client_message()));
    }
}

async fn host_command(
    state: &SharedState,
    handle: &ConnectionHandle,
    message: ClientMessage,
) -> Result<(), ServiceError> {
    if handle.role() != ConnectionRole::Host {
        return Err(ServiceError::Unauthorized(
            "only the host can control the game".into(),
        ));
    }

    let session = session_service::session_by_code(state, handle.code()).await?;
    match message {
        ClientMessage::StartGame => session_service::start_game(state, session.id)
            .await
            .map(|_| ()),
        ClientMessage::NextQuestion => session_service::advance(state, session.id)
            .await
            .map(|_| ()),
        ClientMessage::EndGame => session_service::end_game(state, session.id)
            .await
            .map(|_| ()),
        _ => Ok(()),
    }
}

async fn finalize(writer_task: JoinHandle<()>, control_tx: mpsc::UnboundedSender<Message>) {
    drop(control_tx);
    let _ = writer_task.await;
}
