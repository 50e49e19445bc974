// Active connection registry.
//
// Backs the two things no single `Connection` can answer about the service
// as a whole: event fan-out (bus envelope -> every subscribed socket) and
// `get_subscription_stats`. The registry only ever hands out clones of the
// `Arc<Connection>`s it holds; it never calls back into a connection while
// holding its own lock.

use super::connection::Connection;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SubscriptionStats {
    pub total_connections: usize,
    pub per_topic: HashMap<String, usize>,
}

pub struct ConnectionRegistry {
    connections: Mutex<HashMap<Uuid, Arc<Connection>>>,
}
impl ConnectionRegistry {
    pub fn new() -> Self {
        Self { connections: Mutex::new(HashMap::new()) }
    }

    pub fn insert(
        &self,
        connection: Arc<Connection>,
    ) {
        self.connections.lock().insert(connection.id, connection);
    }
    pub fn remove(
        &self,
        id: Uuid,
    ) {
        self.connections.lock().remove(&id);
    }
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.lock().values().cloned().collect()
    }

    pub fn stats(&self) -> SubscriptionStats {
        let connections = self.connections.lock();
        let mut per_topic: HashMap<String, usize> = HashMap::new();
        for connection in connections.values() {
            for topic in connection.subscribed_topics() {
                *per_topic.entry(topic.as_str().to_owned()).or_insert(0) += 1;
            }
        }
        SubscriptionStats { total_connections: connections.len(), per_topic }
    }
}
impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
