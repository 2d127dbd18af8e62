//! The event fan-out hub (§4.6): one `broadcast` channel per trivia, plus a
//! ticket store for connection authorization. Modeled on the reference
//! stack's single global `beamer_broadcast` channel, generalized to be keyed
//! per trivia as §5's "registry … keyed by trivia id" requires.

use crate::ids::{TriviaId, UserId};
use crate::protocol::EngineEvent;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};

/// Channel depth per trivia. Slow subscribers fall behind and the native
/// `broadcast` lag semantics silently drop the oldest frames for them,
/// satisfying §4.6's "oldest-drop" policy without a bespoke queue.
const CHANNEL_CAPACITY: usize = 256;

struct TicketEntry {
    trivia_id: TriviaId,
    user_id: Option<UserId>,
    expires_at: Instant,
}

/// In-process pub/sub keyed by trivia id, with ticket-based subscribe
/// authorization (§4.6).
#[derive(Clone)]
pub struct Hub {
    channels: Arc<RwLock<HashMap<TriviaId, broadcast::Sender<EngineEvent>>>>,
    tickets: Arc<RwLock<HashMap<String, TicketEntry>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            tickets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn sender_for(&self, trivia_id: TriviaId) -> broadcast::Sender<EngineEvent> {
        if let Some(sender) = self.channels.read().await.get(&trivia_id) {
            return sender.clone();
        }
        let mut channels = self.channels.write().await;
        channels
            .entry(trivia_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Opaque subscriber handle: a receiver for this trivia's channel.
    pub async fn subscribe(&self, trivia_id: TriviaId) -> broadcast::Receiver<EngineEvent> {
        self.sender_for(trivia_id).await.subscribe()
    }

    /// `unsubscribe` has no explicit call in this model: dropping the
    /// receiver returned by `subscribe` is the idempotent unsubscribe §4.6
    /// requires. Kept as a no-op method so callers that model an explicit
    /// lifecycle (e.g. a connection handler's cleanup path) have something
    /// to call without special-casing "no-op" at the call site.
    pub fn unsubscribe(&self, _receiver: broadcast::Receiver<EngineEvent>) {}

    /// Deliver an event to every live subscriber of a trivia. Takes no lock
    /// across the send: `broadcast::Sender::send` never blocks (it writes
    /// into the ring buffer and returns), so there is no suspension point to
    /// worry about holding the registry lock across, unlike a bounded mpsc
    /// per subscriber would require.
    pub async fn broadcast(&self, trivia_id: TriviaId, event: EngineEvent) {
        let sender = self.sender_for(trivia_id).await;
        // No receivers connected is not an error; the event is simply not observed.
        let _ = sender.send(event);
    }

    /// Create a single-use ticket admitting one subscription to `trivia_id`,
    /// valid for `ttl`. Returns the opaque token.
    pub async fn create_ticket(&self, trivia_id: TriviaId, user_id: Option<UserId>, ttl: Duration) -> String {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let token = hex_encode(&bytes);

        self.tickets.write().await.insert(
            token.clone(),
            TicketEntry {
                trivia_id,
                user_id,
                expires_at: Instant::now() + ttl,
            },
        );
        token
    }

    /// Validate and consume a ticket, returning `(trivia_id, user_id)` on
    /// success. A ticket can be validated at most once.
    pub async fn validate_ticket(&self, token: &str) -> Option<(TriviaId, Option<UserId>)> {
        let mut tickets = self.tickets.write().await;
        let entry = tickets.remove(token)?;
        if entry.expires_at < Instant::now() {
            return None;
        }
        Some((entry.trivia_id, entry.user_id))
    }

    /// Remove every expired ticket. Intended to run on a periodic interval
    /// (§10.2); tickets that are never validated would otherwise accumulate
    /// forever.
    pub async fn sweep_expired_tickets(&self) {
        let now = Instant::now();
        self.tickets.write().await.retain(|_, entry| entry.expires_at >= now);
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Spawn the background ticket sweep task, mirroring the reference stack's
/// periodic cleanup tasks in `broadcast.rs`.
pub fn spawn_ticket_sweep(hub: Hub, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            hub.sweep_expired_tickets().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_is_scoped_to_its_trivia() {
        let hub = Hub::new();
        let trivia_a = TriviaId::new();
        let trivia_b = TriviaId::new();

        let mut sub_a = hub.subscribe(trivia_a).await;
        let mut sub_b = hub.subscribe(trivia_b).await;

        hub.broadcast(
            trivia_a,
            EngineEvent::StatusUpdated {
                state: crate::protocol::EventTriviaState::Waiting,
                current_question_index: 0,
            },
        )
        .await;

        assert!(sub_a.try_recv().is_ok());
        assert!(sub_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn ticket_validates_once_then_fails() {
        let hub = Hub::new();
        let trivia_id = TriviaId::new();
        let token = hub.create_ticket(trivia_id, None, Duration::from_secs(60)).await;

        let first = hub.validate_ticket(&token).await;
        assert_eq!(first.unwrap().0, trivia_id);

        let second = hub.validate_ticket(&token).await;
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn expired_ticket_fails_validation() {
        let hub = Hub::new();
        let trivia_id = TriviaId::new();
        let token = hub
            .create_ticket(trivia_id, None, Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(hub.validate_ticket(&token).await.is_none());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_tickets() {
        let hub = Hub::new();
        let trivia_id = TriviaId::new();
        let short = hub
            .create_ticket(trivia_id, None, Duration::from_millis(1))
            .await;
        let long = hub.create_ticket(trivia_id, None, Duration::from_secs(60)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        hub.sweep_expired_tickets().await;

        assert_eq!(hub.tickets.read().await.len(), 1);
        assert!(hub.tickets.read().await.contains_key(&long));
        assert!(!hub.tickets.read().await.contains_key(&short));
    }
}
