// src/ws.rs

//! Gateway de tempo real: salas, relay de eventos de registro e heartbeat.

mod gateway;
mod handler;
mod heartbeat;
pub mod protocol;
pub mod rooms;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use rooms::RoomRegistry;
