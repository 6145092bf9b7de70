use crate::models::config::CachePolicy;
use crate::models::detection::RankedResult;
use crate::services::ocr::RecognitionError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Cache slot for one image. The cell is shared with every caller waiting
/// on the same image, so at most one recognition runs per image at a time.
struct Slot {
    cell: Arc<OnceCell<Arc<RankedResult>>>,
    last_used: u64,
}

#[derive(Default)]
struct CacheInner {
    slots: HashMap<String, Slot>,
    tick: u64,
}

impl CacheInner {
    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn ready_count(&self) -> usize {
        self.slots.values().filter(|s| s.cell.initialized()).count()
    }

    /// Drop least recently used ready entries until `capacity` remain.
    /// Pending slots are never evicted.
    fn evict_to(&mut self, capacity: usize) {
        while self.ready_count() > capacity {
            let oldest = self
                .slots
                .iter()
                .filter(|(_, s)| s.cell.initialized())
                .min_by_key(|(_, s)| s.last_used)
                .map(|(k, _)| k.clone());

            match oldest {
                Some(key) => {
                    debug!(image_id = %key, "Evicting cached recognition result");
                    self.slots.remove(&key);
                }
                None => break,
            }
        }
    }
}

/// Recognition results keyed by image id.
///
/// Entries are written once per image id and stay until removed, cleared,
/// or evicted under `CachePolicy::Lru`. Failed recognitions never leave
/// an entry behind.
pub struct RecognitionCache {
    policy: CachePolicy,
    inner: Mutex<CacheInner>,
}

impl Default for RecognitionCache {
    fn default() -> Self {
        Self::new(CachePolicy::Unbounded)
    }
}

impl RecognitionCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Cached result for `image_id`, if recognition already completed
    pub fn get(&self, image_id: &str) -> Option<Arc<RankedResult>> {
        let mut inner = self.inner.lock();
        let tick = inner.touch();
        let slot = inner.slots.get_mut(image_id)?;
        let result = slot.cell.get().cloned()?;
        slot.last_used = tick;
        Some(result)
    }

    pub fn contains(&self, image_id: &str) -> bool {
        self.inner
            .lock()
            .slots
            .get(image_id)
            .is_some_and(|s| s.cell.initialized())
    }

    /// Number of completed entries
    pub fn len(&self) -> usize {
        self.inner.lock().ready_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget one image. A recognition already in flight for it still
    /// completes for its waiters but is not stored.
    pub fn remove(&self, image_id: &str) -> Option<Arc<RankedResult>> {
        let slot = self.inner.lock().slots.remove(image_id)?;
        slot.cell.get().cloned()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        debug!(entries = inner.slots.len(), "Clearing recognition cache");
        inner.slots.clear();
    }

    /// Return the cached result for `image_id`, or run `init` to produce it.
    ///
    /// Concurrent callers for the same id share one `init` run. If `init`
    /// fails the error goes to that caller. A caller still waiting on the
    /// same slot then runs its own `init` in that slot, so callers arriving
    /// meanwhile join the retry. No entry is kept once nobody is waiting.
    pub async fn get_or_try_insert_with<F, Fut>(
        &self,
        image_id: &str,
        init: F,
    ) -> Result<Arc<RankedResult>, RecognitionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RankedResult, RecognitionError>>,
    {
        let cell = self.slot_cell(image_id);

        let result = cell
            .get_or_try_init(move || async move { init().await.map(Arc::new) })
            .await
            .cloned();

        match result {
            Ok(ranked) => {
                if let Some(capacity) = self.policy.capacity() {
                    let mut inner = self.inner.lock();
                    let tick = inner.touch();
                    if let Some(slot) = inner.slots.get_mut(image_id) {
                        slot.last_used = tick;
                    }
                    inner.evict_to(capacity);
                }
                Ok(ranked)
            }
            Err(err) => {
                self.discard_pending(image_id, &cell);
                Err(err)
            }
        }
    }

    /// Find or create the slot for `image_id` and mark it used
    fn slot_cell(&self, image_id: &str) -> Arc<OnceCell<Arc<RankedResult>>> {
        let mut inner = self.inner.lock();
        let tick = inner.touch();
        let slot = inner.slots.entry(image_id.to_string()).or_insert_with(|| Slot {
            cell: Arc::new(OnceCell::new()),
            last_used: tick,
        });
        slot.last_used = tick;
        Arc::clone(&slot.cell)
    }

    /// Remove a slot left empty by a failed recognition. The slot stays while
    /// another caller still holds its cell (map + this caller = 2), and when
    /// it was replaced or filled in the meantime.
    fn discard_pending(&self, image_id: &str, cell: &Arc<OnceCell<Arc<RankedResult>>>) {
        let mut inner = self.inner.lock();
        let stale = inner.slots.get(image_id).is_some_and(|s| {
            Arc::ptr_eq(&s.cell, cell) && !s.cell.initialized() && Arc::strong_count(&s.cell) <= 2
        });
        if stale {
            inner.slots.remove(image_id);
        }
    }
}
