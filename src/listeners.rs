use crate::util::{eprint_msg, ErrorCode};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a registered listener; used to remove it again.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// Observer registry. Listeners are called on a snapshot, without holding the lock,
// so that they can register or remove listeners themselves.
pub(crate) struct Registry<K, E: ?Sized> {
    entries: Mutex<Vec<(ListenerId, K, Arc<dyn Fn(&E) + Send + Sync>)>>,
}

impl<K: Copy + PartialEq, E: ?Sized> Registry<K, E> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, key: K, listener: Arc<dyn Fn(&E) + Send + Sync>) -> ListenerId {
        let id = ListenerId::next();
        self.lock().push((id, key, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.lock();
        let len = entries.len();
        entries.retain(|(i, _, _)| *i != id);
        entries.len() != len
    }

    pub(crate) fn count(&self, key: K) -> usize {
        self.lock().iter().filter(|(_, k, _)| *k == key).count()
    }

    // returns the number of called listeners
    pub(crate) fn emit(&self, key: K, event: &E) -> usize {
        let snapshot: Vec<Arc<dyn Fn(&E) + Send + Sync>> = self
            .lock()
            .iter()
            .filter(|(_, k, _)| *k == key)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();
        for listener in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                eprint_msg(ErrorCode::Listener, "event listener panicked");
            }
        }
        snapshot.len()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, Vec<(ListenerId, K, Arc<dyn Fn(&E) + Send + Sync>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
