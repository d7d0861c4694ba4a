use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{KvsError, KvsResult};
use crate::traits::{ChangeSource, Get, Store};
use crate::update::Update;

/// In-memory key-value store with a change feed.
///
/// Intended for tests and embedding. Every write is queued as an
/// [`Update`] and handed out in order by [`ChangeSource::next`].
pub struct MemoryKvs {
    state: Mutex<State>,
    notify: Notify,
}

#[derive(Default)]
struct State {
    pairs: HashMap<String, String>,
    queue: VecDeque<Update>,
}

impl MemoryKvs {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
        }
    }

    /// Create a store whose change feed starts with one creation per pair.
    ///
    /// The pairs are not written to the store itself: a router consuming
    /// the feed sees them as they would appear to any new reader.
    pub fn from_existing(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut pairs: Vec<_> = pairs.into_iter().collect();
        pairs.sort();
        let queue = pairs
            .into_iter()
            .map(|(k, v)| Update::created(k, v))
            .collect();
        Self {
            state: Mutex::new(State {
                pairs: HashMap::new(),
                queue,
            }),
            notify: Notify::new(),
        }
    }

    fn state(&self) -> KvsResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| KvsError::Poisoned)
    }

    /// A copy of the stored pairs.
    pub fn snapshot(&self) -> KvsResult<HashMap<String, String>> {
        Ok(self.state()?.pairs.clone())
    }

    /// Number of updates not yet consumed.
    pub fn pending(&self) -> KvsResult<usize> {
        Ok(self.state()?.queue.len())
    }

    fn push(&self, mut state: MutexGuard<'_, State>, update: Update) {
        state.queue.push_back(update);
        drop(state);
        self.notify.notify_one();
    }
}

impl Default for MemoryKvs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryKvs {
    async fn set(&self, key: &str, value: &str) -> KvsResult<()> {
        let mut state = self.state()?;
        let previous = state.pairs.insert(key.to_string(), value.to_string());
        debug!(key, created = previous.is_none(), "Set pair");
        let update = Update {
            key: key.to_string(),
            value: Some(value.to_string()),
            previous,
        };
        self.push(state, update);
        Ok(())
    }

    async fn delete(&self, key: &str) -> KvsResult<()> {
        let mut state = self.state()?;
        let update = if key.ends_with('/') {
            let before = state.pairs.len();
            state.pairs.retain(|k, _| !k.starts_with(key));
            let removed = before - state.pairs.len();
            if removed == 0 {
                return Err(KvsError::NoSuchKey(key.to_string()));
            }
            debug!(prefix = key, removed, "Deleted prefix");
            Update::deleted(key, None)
        } else {
            let previous = state
                .pairs
                .remove(key)
                .ok_or_else(|| KvsError::NoSuchKey(key.to_string()))?;
            debug!(key, "Deleted pair");
            Update::deleted(key, Some(previous))
        };
        self.push(state, update);
        Ok(())
    }
}

#[async_trait]
impl Get for MemoryKvs {
    async fn get(&self, key: &str) -> KvsResult<Option<String>> {
        Ok(self.state()?.pairs.get(key).cloned())
    }
}

#[async_trait]
impl ChangeSource for MemoryKvs {
    async fn next(&self, cancel: &CancellationToken) -> KvsResult<Update> {
        loop {
            let queued = self.state()?.queue.pop_front();
            if let Some(update) = queued {
                return Ok(update);
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = cancel.cancelled() => return Err(KvsError::Cancelled),
            }
        }
    }
}
