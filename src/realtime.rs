//! In-process fan-out for the two realtime streams: per-user notification
//! counters and per-group topic proposal snapshots.
//!
//! Connections register an unbounded channel sender under their key; pushes
//! walk the registered senders and drop the ones whose receiver is gone.
//! Delivery is best-effort by construction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

type SenderMap = Arc<RwLock<HashMap<i64, Vec<mpsc::UnboundedSender<String>>>>>;

#[derive(Clone, Default)]
pub struct WsHub {
    users: SenderMap,
    groups: SenderMap,
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a notification stream for a user. The returned receiver is
    /// owned by the WebSocket task; dropping it unregisters the connection
    /// on the next push.
    pub fn subscribe_user(&self, user_id: i64) -> mpsc::UnboundedReceiver<String> {
        subscribe(&self.users, user_id)
    }

    /// Register a topic-proposal stream for a group.
    pub fn subscribe_group(&self, group_id: i64) -> mpsc::UnboundedReceiver<String> {
        subscribe(&self.groups, group_id)
    }

    pub fn send_to_user(&self, user_id: i64, message: &str) {
        send(&self.users, user_id, message);
    }

    pub fn send_to_group(&self, group_id: i64, message: &str) {
        send(&self.groups, group_id, message);
    }
}

fn subscribe(map: &SenderMap, key: i64) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut guard = map.write().unwrap_or_else(|e| e.into_inner());
    guard.entry(key).or_default().push(tx);
    rx
}

fn send(map: &SenderMap, key: i64, message: &str) {
    let mut guard = map.write().unwrap_or_else(|e| e.into_inner());
    if let Some(senders) = guard.get_mut(&key) {
        senders.retain(|s| s.send(message.to_string()).is_ok());
        if senders.is_empty() {
            guard.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_all_subscribers_of_a_key() {
        let hub = WsHub::new();
        let mut a = hub.subscribe_group(7);
        let mut b = hub.subscribe_group(7);
        hub.send_to_group(7, "snapshot");
        assert_eq!(a.recv().await.unwrap(), "snapshot");
        assert_eq!(b.recv().await.unwrap(), "snapshot");
    }

    #[tokio::test]
    async fn prunes_dropped_receivers() {
        let hub = WsHub::new();
        let rx = hub.subscribe_user(1);
        drop(rx);
        // Push after drop must not panic and must clean up the entry.
        hub.send_to_user(1, "count");
        let mut live = hub.subscribe_user(1);
        hub.send_to_user(1, "count");
        assert_eq!(live.recv().await.unwrap(), "count");
    }
}
