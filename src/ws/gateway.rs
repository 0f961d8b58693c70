// src/ws/gateway.rs

use serde_json::{Value, json};

use crate::ws::{
    protocol::{ClientEvent, ERROR},
    rooms::{ConnId, Member, RoomRegistry},
};

/// Trata um frame de texto vindo do cliente. Erros viram um frame `error`
/// para quem enviou; a conexão continua aberta.
pub async fn dispatch(registry: &RoomRegistry, conn_id: ConnId, text: &str) {
    let event = match ClientEvent::parse(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "Frame inválido");
            reply_error(registry, conn_id, format!("invalid frame: {e}")).await;
            return;
        }
    };

    match event {
        ClientEvent::JoinRoom(join) => {
            let outcome = registry
                .join(
                    conn_id,
                    &join.room_id,
                    Member {
                        user_id: join.user_id,
                        username: join.username,
                    },
                )
                .await;
            tracing::info!(
                %conn_id,
                room = %join.room_id,
                user_id = join.user_id,
                newly_joined = outcome.newly_joined,
                "Entrou na sala"
            );
        }
        ClientEvent::LeaveRoom(leave) => {
            if registry.leave(conn_id, &leave.room_id).await.is_none() {
                reply_error(registry, conn_id, format!("not a member of room {}", leave.room_id))
                    .await;
            }
        }
        relay => {
            let Some((name, payload)) = relay.into_relay() else {
                return;
            };
            let data = Value::Object(payload.body);
            match registry.relay(conn_id, &payload.room_id, name, &data).await {
                Ok(delivered) => {
                    tracing::debug!(%conn_id, room = %payload.room_id, event = name, delivered, "Relay");
                }
                Err(e) => reply_error(registry, conn_id, e.to_string()).await,
            }
        }
    }
}

async fn reply_error(registry: &RoomRegistry, conn_id: ConnId, message: String) {
    registry
        .send_to(conn_id, ERROR, &json!({ "message": message }))
        .await;
}
