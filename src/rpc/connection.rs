// Per-connection state.
//
// Connection lifecycle: Unauthenticated -> Authenticated -> Closed. The
// WebSocket handshake itself (spec's "Accepted" stage) completes before a
// `Connection` is ever constructed — `rpc::server::handle_connection` only
// builds one once `accept_hdr_async_with_config` has already returned — so
// there is no observable state prior to `Unauthenticated`.
//
// The connection is the sole writer of its own subscription set and auth
// state (locking discipline); fan-out reads the subscription set
// under a shared lock and never calls back into handler code while holding
// it.

use crate::{auth::Role, events::Topic};
use parking_lot::Mutex;
use std::{collections::HashSet, time::Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unauthenticated,
    Authenticated,
    Closed,
}

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub role: Role,
}

pub struct Connection {
    pub id: uuid::Uuid,
    state: Mutex<ConnectionState>,
    auth: Mutex<Option<AuthContext>>,
    subscriptions: Mutex<HashSet<Topic>>,
    outbound: mpsc::Sender<Message>,
    /// Cancelled when the connection closes, so any in-flight handler's
    /// downstream HTTP call is cancelled along with it rather than
    /// outliving the socket.
    cancellation: CancellationToken,
    last_pong: Mutex<Instant>,
}
impl Connection {
    pub fn new(outbound: mpsc::Sender<Message>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            state: Mutex::new(ConnectionState::Unauthenticated),
            auth: Mutex::new(None),
            subscriptions: Mutex::new(HashSet::new()),
            outbound,
            cancellation: CancellationToken::new(),
            last_pong: Mutex::new(Instant::now()),
        }
    }

    /// Token for the connection's lifetime; a fresh child is not derived
    /// per-request since one connection carries at most one in-flight
    /// handler's worth of cancellation concern per the current dispatch
    /// model (handlers run sequentially against this token).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn note_pong(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    pub fn since_last_pong(&self) -> std::time::Duration {
        self.last_pong.lock().elapsed()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }
    pub fn is_authenticated(&self) -> bool {
        *self.state.lock() == ConnectionState::Authenticated
    }
    pub fn auth(&self) -> Option<AuthContext> {
        self.auth.lock().clone()
    }

    pub fn authenticate(
        &self,
        context: AuthContext,
    ) {
        *self.auth.lock() = Some(context);
        *self.state.lock() = ConnectionState::Authenticated;
    }

    pub fn close(&self) {
        *self.state.lock() = ConnectionState::Closed;
        self.cancellation.cancel();
    }

    pub fn subscribe(
        &self,
        topics: &[Topic],
    ) {
        self.subscriptions.lock().extend(topics.iter().copied());
    }
    pub fn unsubscribe(
        &self,
        topics: &[Topic],
    ) {
        let mut subscriptions = self.subscriptions.lock();
        for topic in topics {
            subscriptions.remove(topic);
        }
    }
    pub fn subscribed_topics(&self) -> HashSet<Topic> {
        self.subscriptions.lock().clone()
    }
    pub fn is_subscribed(
        &self,
        topic: Topic,
    ) -> bool {
        self.subscriptions.lock().contains(&topic)
    }

    /// `Err` means the outbound queue is full or the socket is gone; the
    /// caller (event fan-out) disconnects the subscriber rather than block
    /// the publisher.
    pub fn try_send(
        &self,
        message: Message,
    ) -> Result<(), mpsc::error::TrySendError<Message>> {
        self.outbound.try_send(message)
    }
}
