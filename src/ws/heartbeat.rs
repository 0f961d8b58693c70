// src/ws/heartbeat.rs

use std::{sync::Arc, time::Duration};

use crate::ws::rooms::RoomRegistry;

/// Envia Ping para todas as conexões a cada `every`.
pub fn start_heartbeat(rooms: Arc<RoomRegistry>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // O primeiro tick é imediato
        interval.tick().await;

        loop {
            interval.tick().await;
            let count = rooms.connection_count().await;
            tracing::debug!(count, "Heartbeat do WebSocket");
            rooms.ping_all().await;
        }
    })
}
