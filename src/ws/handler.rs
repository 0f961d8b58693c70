// src/ws/handler.rs

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use uuid::Uuid;

use crate::{
    config::AppState,
    ws::{gateway, rooms::RoomRegistry},
};

/// `GET /ws`: faz o upgrade e registra a conexão no `RoomRegistry`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.rooms))
}

async fn handle_socket(socket: WebSocket, rooms: Arc<RoomRegistry>) {
    let conn_id = Uuid::new_v4();
    tracing::info!(%conn_id, "WebSocket conectado");

    let mut rx = rooms.connect(conn_id).await;
    let (mut sink, mut stream) = socket.split();

    // Task de envio: canal -> socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => gateway::dispatch(&rooms, conn_id, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => tracing::trace!(%conn_id, "Pong"),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "Erro de leitura no WebSocket");
                break;
            }
        }
    }

    let left = rooms.disconnect(conn_id).await;
    send_task.abort();
    for (room, member) in &left {
        tracing::info!(
            %conn_id,
            room = %room,
            user_id = member.user_id,
            username = %member.username,
            "Saiu da sala"
        );
    }
    tracing::info!(%conn_id, rooms_left = left.len(), "WebSocket desconectado");
}
