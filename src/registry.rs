use crate::protocol::Message;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Outbound side of one connection: the writer task drains the channel
/// and owns the socket, so the registry never touches a stream directly.
#[derive(Clone)]
pub struct ClientLink {
    pub conn_id: Uuid,
    pub tx: mpsc::Sender<String>,
}

/// Logged-in usernames and how to reach them. One instance per server,
/// handed to every session as an `Arc` — never a process global.
pub struct UserRegistry {
    users: Mutex<HashMap<String, ClientLink>>,
}

impl UserRegistry {
    pub fn new() -> Self {
        UserRegistry {
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts iff the username is free; under one mutex, so of any
    /// number of concurrent attempts on the same name exactly one wins.
    /// A successful insert announces USER_JOINED to everyone else.
    pub async fn register(&self, username: &str, link: ClientLink) -> bool {
        if username.trim().is_empty() {
            return false;
        }

        let conn_id = link.conn_id;
        {
            let mut users = self.users.lock().await;
            if users.contains_key(username) {
                return false;
            }
            users.insert(username.to_string(), link);
        }

        self.broadcast_to_others(&Message::user_joined(username), conn_id)
            .await;
        true
    }

    /// Removes whatever entry this connection owns, if any, and
    /// announces USER_LEFT. Safe to call for never-registered
    /// connections.
    pub async fn unregister(&self, conn_id: Uuid) {
        let removed = {
            let mut users = self.users.lock().await;
            let username = users
                .iter()
                .find(|(_, link)| link.conn_id == conn_id)
                .map(|(name, _)| name.clone());
            username.map(|name| {
                users.remove(&name);
                name
            })
        };

        if let Some(username) = removed {
            log::info!("user {} left", username);
            self.broadcast_to_others(&Message::user_left(&username), conn_id)
                .await;
        }
    }

    pub async fn broadcast_to_all(&self, message: &Message) {
        let targets = self.snapshot().await;
        self.deliver(message, targets).await;
    }

    pub async fn broadcast_to_others(&self, message: &Message, excluding: Uuid) {
        let targets = self
            .snapshot()
            .await
            .into_iter()
            .filter(|(_, link)| link.conn_id != excluding)
            .collect();
        self.deliver(message, targets).await;
    }

    pub async fn usernames(&self) -> Vec<String> {
        self.users.lock().await.keys().cloned().collect()
    }

    pub async fn user_count(&self) -> usize {
        self.users.lock().await.len()
    }

    // Snapshot under the lock, deliver outside it: connections joining
    // or leaving mid-broadcast get best-effort treatment only.
    async fn snapshot(&self) -> Vec<(String, ClientLink)> {
        self.users
            .lock()
            .await
            .iter()
            .map(|(name, link)| (name.clone(), link.clone()))
            .collect()
    }

    async fn deliver(&self, message: &Message, targets: Vec<(String, ClientLink)>) {
        let line = message.encode();
        for (username, link) in targets {
            if let Err(e) = link.tx.send(line.clone()).await {
                // Peer already gone; its session cleanup will unregister it.
                log::warn!("broadcast to {} failed: {}", username, e);
            }
        }
    }
}
