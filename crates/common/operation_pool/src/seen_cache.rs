use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use ream_consensus_beacon::{
    attestation::{AggregationBits, Attestation},
    attestation_id::{AttestationId, IdSource},
};

use crate::errors::OperationPoolError;

pub const DEFAULT_SEEN_CACHE_SIZE: NonZeroUsize =
    NonZeroUsize::new(1 << 16).expect("Invalid cache size");

/// Tracks, per attestation data id, the union of participation bits already handed to fork
/// choice.
///
/// Entries are evicted least-recently-used first. An evicted vote is simply treated as unseen
/// again, which costs some duplicate aggregation work but keeps memory bounded.
#[derive(Debug)]
pub struct SeenCache {
    processed: Mutex<LruCache<AttestationId, AggregationBits>>,
}

impl SeenCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            processed: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns `true` if every participation bit of `attestation` was already recorded for its
    /// vote. Otherwise records the new bits and returns `false`.
    ///
    /// When the recorded bitlist has a different length than the incoming one (committee sizes
    /// change across epochs) the incoming bits replace the entry without merging.
    pub fn check_and_record(&self, attestation: &Attestation) -> Result<bool, OperationPoolError> {
        let id = AttestationId::new(attestation, IdSource::Data)?;
        Ok(self.record(id, &attestation.aggregation_bits))
    }

    /// [`Self::check_and_record`] for callers that already computed the data id.
    pub fn record(&self, id: AttestationId, incoming: &AggregationBits) -> bool {
        let mut processed = self.processed.lock();
        let recorded = match processed.get(&id) {
            Some(saved) if saved.len() == incoming.len() => {
                if saved == incoming || incoming.difference(saved).is_zero() {
                    return true;
                }
                incoming.union(saved)
            }
            _ => incoming.clone(),
        };
        processed.put(id, recorded);

        false
    }

    /// Drops the entry for `id` so attestations for that vote are admitted again.
    pub fn forget(&self, id: &AttestationId) {
        self.processed.lock().pop(id);
    }

    /// Returns the recorded bits for `id` without touching its recency.
    pub fn get(&self, id: &AttestationId) -> Option<AggregationBits> {
        self.processed.lock().peek(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.processed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.lock().is_empty()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.processed.lock().cap()
    }
}

impl Default for SeenCache {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CACHE_SIZE)
    }
}
