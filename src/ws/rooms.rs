// src/ws/rooms.rs

use std::collections::{BTreeSet, HashMap};

use axum::{body::Bytes, extract::ws::Message};
use serde_json::{Value, json};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::ws::protocol::{CONNECTED_USERS, ServerFrame, USER_JOINED, USER_LEFT};

pub type ConnId = Uuid;

/// Metade de envio do canal de uma conexão.
pub type WsSender = mpsc::UnboundedSender<Message>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: i64,
    pub username: String,
}

#[derive(Default)]
struct Room {
    members: HashMap<ConnId, Member>,
    /// Último `seq` emitido nesta sala.
    seq: u64,
}

impl Room {
    fn has_user(&self, user_id: i64) -> bool {
        self.members.values().any(|m| m.user_id == user_id)
    }

    fn user_ids(&self) -> Vec<i64> {
        let ids: BTreeSet<i64> = self.members.values().map(|m| m.user_id).collect();
        ids.into_iter().collect()
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnId, WsSender>,
    rooms: HashMap<String, Room>,
}

impl Inner {
    /// Envia o evento para os membros da sala, exceto `skip`. O `seq` é
    /// atribuído aqui, sob o lock de escrita.
    fn broadcast(&mut self, room_id: &str, event: &str, data: &Value, skip: Option<ConnId>) -> usize {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return 0;
        };
        let seq = room.next_seq();
        let text = ServerFrame { event, seq: Some(seq), data }.to_text();

        let mut delivered = 0;
        for conn_id in room.members.keys() {
            if Some(*conn_id) == skip {
                continue;
            }
            if let Some(sender) = self.connections.get(conn_id) {
                if sender.send(Message::Text(text.clone().into())).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    fn leave(&mut self, conn_id: ConnId, room_id: &str) -> Option<Member> {
        let room = self.rooms.get_mut(room_id)?;
        let member = room.members.remove(&conn_id)?;

        if room.members.is_empty() {
            self.rooms.remove(room_id);
            return Some(member);
        }

        if !room.has_user(member.user_id) {
            let users = json!(room.user_ids());
            self.broadcast(room_id, USER_LEFT, &json!(member.user_id), None);
            self.broadcast(room_id, CONNECTED_USERS, &users, None);
        }
        Some(member)
    }
}

/// Resultado de um `join-room`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Falso quando o usuário já estava na sala (por esta ou outra conexão).
    pub newly_joined: bool,
    pub users: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("connection has not joined room {0}")]
    NotMember(String),
}

/// Conexões abertas e salas em memória. Compartilhado via `Arc`.
pub struct RoomRegistry {
    inner: RwLock<Inner>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Registra a conexão e devolve o receptor das mensagens de saída.
    pub async fn connect(&self, conn_id: ConnId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().await.connections.insert(conn_id, tx);
        rx
    }

    /// Remove a conexão de todas as salas e do registro.
    pub async fn disconnect(&self, conn_id: ConnId) -> Vec<(String, Member)> {
        let mut inner = self.inner.write().await;

        let joined: Vec<String> = inner
            .rooms
            .iter()
            .filter(|(_, room)| room.members.contains_key(&conn_id))
            .map(|(id, _)| id.clone())
            .collect();

        let mut left = Vec::with_capacity(joined.len());
        for room_id in joined {
            if let Some(member) = inner.leave(conn_id, &room_id) {
                left.push((room_id, member));
            }
        }
        inner.connections.remove(&conn_id);
        left
    }

    pub async fn join(&self, conn_id: ConnId, room_id: &str, member: Member) -> JoinOutcome {
        let mut inner = self.inner.write().await;
        let user_id = member.user_id;

        // Mesma conexão trocando de usuário: sai como o anterior antes de entrar
        let previous = inner
            .rooms
            .get(room_id)
            .and_then(|room| room.members.get(&conn_id))
            .map(|m| m.user_id);
        if previous.is_some_and(|prev| prev != user_id) {
            inner.leave(conn_id, room_id);
        }

        let room = inner.rooms.entry(room_id.to_string()).or_default();
        let newly_joined = !room.has_user(user_id);
        room.members.insert(conn_id, member);
        let users = room.user_ids();

        if newly_joined {
            inner.broadcast(room_id, USER_JOINED, &json!(user_id), Some(conn_id));
        }
        inner.broadcast(room_id, CONNECTED_USERS, &json!(users), None);

        JoinOutcome { newly_joined, users }
    }

    pub async fn leave(&self, conn_id: ConnId, room_id: &str) -> Option<Member> {
        self.inner.write().await.leave(conn_id, room_id)
    }

    /// Repassa o evento aos outros membros. Quem envia precisa estar na sala.
    pub async fn relay(
        &self,
        conn_id: ConnId,
        room_id: &str,
        event: &str,
        data: &Value,
    ) -> Result<usize, RelayError> {
        let mut inner = self.inner.write().await;

        let is_member = inner
            .rooms
            .get(room_id)
            .is_some_and(|room| room.members.contains_key(&conn_id));
        if !is_member {
            return Err(RelayError::NotMember(room_id.to_string()));
        }

        Ok(inner.broadcast(room_id, event, data, Some(conn_id)))
    }

    /// Envia o evento para todas as salas abertas.
    pub async fn broadcast_all(&self, event: &str, data: &Value) -> usize {
        let mut inner = self.inner.write().await;
        let room_ids: Vec<String> = inner.rooms.keys().cloned().collect();
        room_ids
            .iter()
            .map(|room_id| inner.broadcast(room_id, event, data, None))
            .sum()
    }

    /// Mensagem direta, fora de qualquer sala (sem `seq`).
    pub async fn send_to(&self, conn_id: ConnId, event: &str, data: &Value) -> bool {
        let text = ServerFrame { event, seq: None, data }.to_text();
        self.inner
            .read()
            .await
            .connections
            .get(&conn_id)
            .is_some_and(|sender| sender.send(Message::Text(text.into())).is_ok())
    }

    pub async fn connected_users(&self, room_id: &str) -> Vec<i64> {
        self.inner
            .read()
            .await
            .rooms
            .get(room_id)
            .map(Room::user_ids)
            .unwrap_or_default()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    pub async fn ping_all(&self) {
        let inner = self.inner.read().await;
        for sender in inner.connections.values() {
            let _ = sender.send(Message::Ping(Bytes::new()));
        }
    }

    /// Manda Close para todas as conexões e esvazia o registro.
    pub async fn shutdown_all(&self) {
        let mut inner = self.inner.write().await;
        let count = inner.connections.len();
        for sender in inner.connections.values() {
            let _ = sender.send(Message::Close(None));
        }
        inner.connections.clear();
        inner.rooms.clear();
        tracing::info!(count, "Conexões WebSocket encerradas");
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(user_id: i64) -> Member {
        Member {
            user_id,
            username: format!("user{user_id}"),
        }
    }

    /// Drena o canal e devolve os frames de texto já decodificados.
    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Message::Text(text) = msg {
                frames.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        frames
    }

    fn events(frames: &[Value]) -> Vec<&str> {
        frames.iter().map(|f| f["event"].as_str().unwrap()).collect()
    }

    #[tokio::test]
    async fn two_users_see_each_other() {
        let registry = RoomRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rx_a = registry.connect(a).await;
        let mut rx_b = registry.connect(b).await;

        registry.join(a, "100", member(1)).await;
        drain(&mut rx_a);
        let outcome = registry.join(b, "100", member(2)).await;

        assert!(outcome.newly_joined);
        assert_eq!(outcome.users, vec![1, 2]);

        let frames_a = drain(&mut rx_a);
        assert_eq!(events(&frames_a), vec![USER_JOINED, CONNECTED_USERS]);
        assert_eq!(frames_a[0]["data"], 2);
        assert_eq!(frames_a[1]["data"], json!([1, 2]));

        let frames_b = drain(&mut rx_b);
        assert_eq!(events(&frames_b), vec![CONNECTED_USERS]);
        assert_eq!(frames_b[0]["data"], json!([1, 2]));
    }

    #[tokio::test]
    async fn rejoining_does_not_repeat_user_joined() {
        let registry = RoomRegistry::new();
        let (a, b, a2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let _rx_a = registry.connect(a).await;
        let mut rx_b = registry.connect(b).await;
        let _rx_a2 = registry.connect(a2).await;

        registry.join(b, "100", member(2)).await;
        registry.join(a, "100", member(1)).await;
        drain(&mut rx_b);

        // Mesma conexão e segunda aba do mesmo usuário
        assert!(!registry.join(a, "100", member(1)).await.newly_joined);
        assert!(!registry.join(a2, "100", member(1)).await.newly_joined);

        let frames = drain(&mut rx_b);
        assert!(!events(&frames).contains(&USER_JOINED));
        assert_eq!(registry.connected_users("100").await, vec![1, 2]);
    }

    #[tokio::test]
    async fn switching_user_on_the_same_connection_leaves_as_the_old_one() {
        let registry = RoomRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let _rx_a = registry.connect(a).await;
        let mut rx_b = registry.connect(b).await;
        registry.join(a, "100", member(1)).await;
        registry.join(b, "100", member(2)).await;
        drain(&mut rx_b);

        let outcome = registry.join(a, "100", member(3)).await;

        assert!(outcome.newly_joined);
        assert_eq!(outcome.users, vec![2, 3]);
        let frames = drain(&mut rx_b);
        assert_eq!(
            events(&frames),
            vec![USER_LEFT, CONNECTED_USERS, USER_JOINED, CONNECTED_USERS]
        );
        assert_eq!(frames[0]["data"], 1);
        assert_eq!(frames[2]["data"], 3);
        assert_eq!(frames[3]["data"], json!([2, 3]));
    }

    #[tokio::test]
    async fn relay_skips_sender_and_increments_seq() {
        let registry = RoomRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rx_a = registry.connect(a).await;
        let mut rx_b = registry.connect(b).await;
        registry.join(a, "100", member(1)).await;
        registry.join(b, "100", member(2)).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        let data = json!({"recordId": 42});
        assert_eq!(registry.relay(a, "100", "lock-record", &data).await, Ok(1));
        assert_eq!(registry.relay(a, "100", "save-record", &data).await, Ok(1));

        assert!(drain(&mut rx_a).is_empty());
        let frames = drain(&mut rx_b);
        assert_eq!(events(&frames), vec!["lock-record", "save-record"]);
        let first = frames[0]["seq"].as_u64().unwrap();
        let second = frames[1]["seq"].as_u64().unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn relay_from_outside_the_room_is_refused() {
        let registry = RoomRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let _rx_a = registry.connect(a).await;
        let mut rx_b = registry.connect(b).await;
        registry.join(b, "100", member(2)).await;
        drain(&mut rx_b);

        let err = registry
            .relay(a, "100", "delete-record", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, RelayError::NotMember("100".into()));
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn disconnect_announces_user_left_and_prunes_rooms() {
        let registry = RoomRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let _rx_a = registry.connect(a).await;
        let mut rx_b = registry.connect(b).await;
        registry.join(a, "100", member(1)).await;
        registry.join(a, "200", member(1)).await;
        registry.join(b, "100", member(2)).await;
        drain(&mut rx_b);

        let left = registry.disconnect(a).await;
        assert_eq!(left.len(), 2);

        let frames = drain(&mut rx_b);
        assert_eq!(events(&frames), vec![USER_LEFT, CONNECTED_USERS]);
        assert_eq!(frames[0]["data"], 1);
        assert_eq!(frames[1]["data"], json!([2]));

        assert_eq!(registry.room_count().await, 1);
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn broadcast_all_reaches_every_room() {
        let registry = RoomRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rx_a = registry.connect(a).await;
        let mut rx_b = registry.connect(b).await;
        registry.join(a, "100", member(1)).await;
        registry.join(b, "archive", member(2)).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        let delivered = registry
            .broadcast_all("lock-expired", &json!({"recordIds": [1]}))
            .await;

        assert_eq!(delivered, 2);
        assert_eq!(events(&drain(&mut rx_a)), vec!["lock-expired"]);
        assert_eq!(events(&drain(&mut rx_b)), vec!["lock-expired"]);
    }

    #[tokio::test]
    async fn shutdown_sends_close_to_everyone() {
        let registry = RoomRegistry::new();
        let a = Uuid::new_v4();
        let mut rx = registry.connect(a).await;
        registry.join(a, "100", member(1)).await;
        drain(&mut rx);

        registry.shutdown_all().await;

        assert!(matches!(rx.try_recv(), Ok(Message::Close(None))));
        assert_eq!(registry.connection_count().await, 0);
        assert_eq!(registry.room_count().await, 0);
    }
}
