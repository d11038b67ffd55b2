use std::collections::HashMap;

use parking_lot::RwLock;
use ream_consensus_beacon::{
    attestation::Attestation,
    attestation_id::{AttestationId, IdSource},
};

use crate::errors::OperationPoolError;

/// A content-addressed set of attestations keyed by their full id.
///
/// Saving an attestation that is already present overwrites it, so the pool holds at most one
/// entry per distinct (vote, signer set, signature). Every category of attestation the node
/// tracks (unaggregated, aggregated, included in blocks, prepared for fork choice) is a separate
/// instance of this type.
#[derive(Debug, Default)]
pub struct AttestationPool {
    attestations: RwLock<HashMap<AttestationId, Attestation>>,
}

impl AttestationPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty attestations are ignored. Fails without touching the pool if the id can't be
    /// computed.
    pub fn save(&self, attestation: Attestation) -> Result<(), OperationPoolError> {
        if attestation.is_empty() {
            return Ok(());
        }

        let id = AttestationId::new(&attestation, IdSource::Full)?;
        self.attestations.write().insert(id, attestation);

        Ok(())
    }

    /// Saves each attestation in order and stops at the first failure. Attestations saved
    /// before the failure stay in the pool.
    pub fn save_many(
        &self,
        attestations: impl IntoIterator<Item = Attestation>,
    ) -> Result<(), OperationPoolError> {
        for attestation in attestations {
            self.save(attestation)?;
        }

        Ok(())
    }

    /// Returns a copy of every stored attestation, in no particular order.
    pub fn get_all(&self) -> Vec<Attestation> {
        self.attestations.read().values().cloned().collect()
    }

    pub fn delete(&self, attestation: &Attestation) -> Result<(), OperationPoolError> {
        if attestation.is_empty() {
            return Ok(());
        }

        let id = AttestationId::new(attestation, IdSource::Full)?;
        self.attestations.write().remove(&id);

        Ok(())
    }

    pub fn contains(&self, attestation: &Attestation) -> bool {
        AttestationId::new(attestation, IdSource::Full)
            .is_ok_and(|id| self.attestations.read().contains_key(&id))
    }

    pub fn count(&self) -> usize {
        self.attestations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.attestations.read().is_empty()
    }

    pub fn clear(&self) {
        self.attestations.write().clear();
    }
}
