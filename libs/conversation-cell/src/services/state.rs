use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_utils::Clock;

use crate::models::ConversationState;

/// In-process conversation memory keyed by session id. Idle sessions are
/// evicted on a timeout so an abandoned chat never pins stale booking data.
pub struct ConversationStore {
    sessions: RwLock<HashMap<String, ConversationState>>,
    clock: Arc<dyn Clock>,
}

impl ConversationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Existing session, or a fresh one. A session without a caller-known
    /// patient gets a minted patient id that sticks for its lifetime.
    pub async fn get_or_create(
        &self,
        id: &str,
        patient_id: Option<Uuid>,
    ) -> ConversationState {
        let mut sessions = self.sessions.write().await;
        let now = self.clock.now();
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(session = id, "starting new conversation");
                ConversationState::new(id, patient_id.unwrap_or_else(Uuid::new_v4), now)
            })
            .clone()
    }

    pub async fn save(&self, state: ConversationState) {
        self.sessions
            .write()
            .await
            .insert(state.id.clone(), state);
    }

    /// Drops the session entirely. Returns whether one existed.
    pub async fn reset(&self, id: &str) -> bool {
        let existed = self.sessions.write().await.remove(id).is_some();
        if existed {
            info!(session = id, "conversation reset");
        }
        existed
    }

    /// Removes sessions idle longer than `timeout_minutes`. Returns how many
    /// were dropped.
    pub async fn evict_idle(&self, timeout_minutes: i64) -> usize {
        let cutoff = self.clock.now() - Duration::minutes(timeout_minutes);
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, state| state.last_active >= cutoff);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, "evicted idle conversations");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
