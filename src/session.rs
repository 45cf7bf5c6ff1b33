//! Per-user conversation and game state
//!
//! Sessions are created on first contact and live in memory only. Each one
//! sits behind its own async mutex so an invocation can hold it across LLM
//! and delivery calls without blocking other users.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const GREETING: &str =
    "Hi! I'm your Luffa assistant. Ask me anything, or reply \"yes\" to play rock-paper-scissors.";

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    /// A round is waiting for the user's move
    InGame,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub phase: Phase,
    pub user_score: u32,
    pub ai_score: u32,
    /// Most recent text sent to the user
    pub last_message: String,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            user_score: 0,
            ai_score: 0,
            last_message: GREETING.to_string(),
        }
    }
}

/// Exclusive access to one session, held for the duration of an invocation
pub type SessionGuard = OwnedMutexGuard<Session>;

struct Entry {
    session: Arc<Mutex<Session>>,
    last_active: Instant,
}

impl Entry {
    /// The map holds one reference; any other means a guard or waiter is live.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.session) > 1
    }
}

/// In-memory store of sessions keyed by user id
pub struct SessionStore {
    entries: Mutex<HashMap<String, Entry>>,
    capacity: usize,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Lock the session for `id`, creating it with defaults on first contact.
    pub async fn lock(&self, id: &str) -> SessionGuard {
        let session = {
            let mut entries = self.entries.lock().await;
            if !entries.contains_key(id) && entries.len() >= self.capacity {
                evict_least_recent(&mut entries);
            }
            let entry = entries.entry(id.to_string()).or_insert_with(|| {
                tracing::debug!(user_id = %id, "Creating session");
                Entry {
                    session: Arc::new(Mutex::new(Session::default())),
                    last_active: Instant::now(),
                }
            });
            entry.last_active = Instant::now();
            Arc::clone(&entry.session)
        };
        session.lock_owned().await
    }

    /// Snapshot of the session for `id`, creating it if needed.
    #[allow(dead_code)] // Read-only access for diagnostics and tests
    pub async fn get_or_create(&self, id: &str) -> Session {
        self.lock(id).await.clone()
    }

    /// Apply `mutator` to the session for `id` while holding its lock.
    #[allow(dead_code)] // Single-step transitions outside the agent
    pub async fn update<R>(&self, id: &str, mutator: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.lock(id).await;
        mutator(&mut guard)
    }

    /// Snapshot of an existing session without creating one.
    #[allow(dead_code)] // Read-only access for diagnostics and tests
    pub async fn peek(&self, id: &str) -> Option<Session> {
        let session = {
            let entries = self.entries.lock().await;
            Arc::clone(&entries.get(id)?.session)
        };
        let snapshot = session.lock().await.clone();
        Some(snapshot)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Remove sessions idle for at least `ttl` that nobody is using.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.in_use() || entry.last_active.elapsed() < ttl);
        before - entries.len()
    }

    /// Periodically evict idle sessions until cancelled.
    pub fn spawn_sweeper(self: Arc<Self>, ttl: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let period = ttl.min(MAX_SWEEP_INTERVAL).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = self.evict_idle(ttl).await;
                        if evicted > 0 {
                            let remaining = self.len().await;
                            tracing::info!(evicted, remaining, "Evicted idle sessions");
                        }
                    }
                }
            }
            tracing::info!("Session sweeper stopped");
        })
    }
}

fn evict_least_recent(entries: &mut HashMap<String, Entry>) {
    let oldest = entries
        .iter()
        .filter(|(_, entry)| !entry.in_use())
        .min_by_key(|(_, entry)| entry.last_active)
        .map(|(id, _)| id.clone());

    match oldest {
        Some(id) => {
            entries.remove(&id);
            tracing::info!(user_id = %id, "Session capacity reached, evicted least recent session");
        }
        None => tracing::warn!("Session capacity reached but every session is in use"),
    }
}
