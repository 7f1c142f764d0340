//! Memoizes optimize responses by the full canonical request.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::dto::{OptimizeRequest, OptimizeResponse};

/// Bounded FIFO cache of responses.
///
/// Keys are the complete serialized request, so two requests share an entry
/// only when they describe the same problem. Only responses that did not
/// depend on the wall clock may be stored.
pub struct SolveCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<Vec<u8>, OptimizeResponse>,
    order: VecDeque<Vec<u8>>,
}

impl SolveCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Canonical key of a request; `None` if it cannot be serialized.
    pub fn key(request: &OptimizeRequest) -> Option<Vec<u8>> {
        serde_json::to_vec(request).ok()
    }

    pub fn get(&self, key: &[u8]) -> Option<OptimizeResponse> {
        if self.capacity == 0 {
            return None;
        }
        self.inner.lock().entries.get(key).cloned()
    }

    pub fn insert(&self, key: Vec<u8>, response: OptimizeResponse) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&key) {
            return;
        }
        while inner.order.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(key, response);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
