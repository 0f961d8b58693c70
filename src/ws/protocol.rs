// src/ws/protocol.rs

//! Envelopes JSON trocados pelo socket.
//!
//! Cliente → servidor: `{"event": "<nome>", "data": {...}}`.
//! Servidor → cliente: `{"event": "<nome>", "seq": <n>, "data": ...}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CONNECTED_USERS: &str = "connected-users";
pub const USER_JOINED: &str = "user-joined";
pub const USER_LEFT: &str = "user-left";
pub const LOCK_EXPIRED: &str = "lock-expired";
pub const ERROR: &str = "error";

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(JoinRoom),
    LeaveRoom(LeaveRoom),
    LockRecord(RelayPayload),
    UnlockRecord(RelayPayload),
    SaveRecord(RelayPayload),
    CreateRecord(RelayPayload),
    DeleteRecord(RelayPayload),
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Nome do evento de relay e o payload, ou `None` para eventos de sala.
    pub fn into_relay(self) -> Option<(&'static str, RelayPayload)> {
        match self {
            ClientEvent::LockRecord(p) => Some(("lock-record", p)),
            ClientEvent::UnlockRecord(p) => Some(("unlock-record", p)),
            ClientEvent::SaveRecord(p) => Some(("save-record", p)),
            ClientEvent::CreateRecord(p) => Some(("create-record", p)),
            ClientEvent::DeleteRecord(p) => Some(("delete-record", p)),
            ClientEvent::JoinRoom(_) | ClientEvent::LeaveRoom(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub user_id: i64,
    pub username: String,
    pub room_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRoom {
    pub room_id: String,
}

/// Payload repassado aos outros membros sem o `roomId`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayPayload {
    pub room_id: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame<'a> {
    pub event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    pub data: &'a Value,
}

impl<'a> ServerFrame<'a> {
    pub fn to_text(&self) -> String {
        // Value sempre serializa
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_room_parses_camel_case_fields() {
        let event = ClientEvent::parse(
            r#"{"event":"join-room","data":{"userId":7,"username":"Kim","roomId":"100"}}"#,
        )
        .unwrap();

        match event {
            ClientEvent::JoinRoom(join) => {
                assert_eq!(join.user_id, 7);
                assert_eq!(join.room_id, "100");
            }
            other => panic!("evento inesperado: {other:?}"),
        }
    }

    #[test]
    fn relay_payload_keeps_everything_but_room_id() {
        let event = ClientEvent::parse(
            r#"{"event":"lock-record","data":{"recordId":42,"locker":7,"isLocked":true,"tableType":"Ready","roomId":"100"}}"#,
        )
        .unwrap();

        let (name, payload) = event.into_relay().unwrap();
        assert_eq!(name, "lock-record");
        assert_eq!(payload.room_id, "100");
        assert_eq!(payload.body.get("recordId"), Some(&json!(42)));
        assert!(!payload.body.contains_key("roomId"));
    }

    #[test]
    fn unknown_event_and_missing_room_are_rejected() {
        assert!(ClientEvent::parse(r#"{"event":"change-record","data":{}}"#).is_err());
        assert!(ClientEvent::parse(r#"{"event":"save-record","data":{"records":[]}}"#).is_err());
        assert!(ClientEvent::parse("not json").is_err());
    }

    #[test]
    fn server_frame_omits_missing_seq() {
        let data = json!({"message": "x"});
        let text = ServerFrame { event: ERROR, seq: None, data: &data }.to_text();
        assert_eq!(text, r#"{"event":"error","data":{"message":"x"}}"#);

        let text = ServerFrame { event: USER_JOINED, seq: Some(3), data: &json!(7) }.to_text();
        assert_eq!(text, r#"{"event":"user-joined","seq":3,"data":7}"#);
    }
}
