//! Content fingerprints of attestations.
//!
//! Two policies are supported:
//! - [`IdSource::Data`] identifies what was voted for. Attestations for the same vote share a
//!   data id no matter which validators signed them, so it is the grouping key for aggregation.
//! - [`IdSource::Full`] identifies the complete attestation, including the participation bits
//!   and the signature. It is the key of the attestation pools.

use std::fmt;

use alloy_primitives::B256;
use thiserror::Error;
use tree_hash::TreeHash;

use crate::attestation::Attestation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdSource {
    Data,
    Full,
}

/// The attestation is empty or internally inconsistent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttestationIdError {
    #[error("Malformed attestation: aggregation bits are empty")]
    EmptyAggregationBits,
    #[error("Malformed attestation: {0} committee bits are set instead of 1")]
    InvalidCommitteeBits(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttestationId(B256);

impl AttestationId {
    pub fn new(attestation: &Attestation, source: IdSource) -> Result<Self, AttestationIdError> {
        if attestation.is_empty() {
            return Err(AttestationIdError::EmptyAggregationBits);
        }

        match source {
            IdSource::Full => {
                if attestation.committee_indices().is_empty() {
                    return Err(AttestationIdError::InvalidCommitteeBits(0));
                }

                Ok(Self(attestation.tree_hash_root()))
            }
            IdSource::Data => {
                let committee_index = attestation.committee_index().ok_or_else(|| {
                    AttestationIdError::InvalidCommitteeBits(attestation.committee_indices().len())
                })?;
                let mut data = attestation.data.clone();
                data.index = committee_index;

                Ok(Self(data.tree_hash_root()))
            }
        }
    }
}

impl fmt::Display for AttestationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use ream_bls::BLSSignature;
    use ream_consensus_misc::{attestation_data::AttestationData, checkpoint::Checkpoint};
    use rstest::rstest;

    use super::*;
    use crate::attestation::{AggregationBits, CommitteeBits};

    fn attestation(bits: &[bool], committees: &[usize]) -> Attestation {
        let mut aggregation_bits = AggregationBits::with_capacity(bits.len()).unwrap();
        for (index, bit) in bits.iter().enumerate() {
            aggregation_bits.set(index, *bit).unwrap();
        }
        let mut committee_bits = CommitteeBits::new();
        for committee in committees {
            committee_bits.set(*committee, true).unwrap();
        }

        Attestation {
            aggregation_bits,
            data: AttestationData {
                slot: 64,
                index: 0,
                beacon_block_root: B256::repeat_byte(0xaa),
                source: Checkpoint::new(1, B256::repeat_byte(0x01)),
                target: Checkpoint::new(2, B256::repeat_byte(0x02)),
            },
            signature: BLSSignature::infinity(),
            committee_bits,
        }
    }

    #[test]
    fn test_data_id_is_stable_and_ignores_signers() {
        let first = attestation(&[true, false, true, false], &[3]);
        let second = attestation(&[false, true, false, true], &[3]);

        let id = AttestationId::new(&first, IdSource::Data).unwrap();
        assert_eq!(id, AttestationId::new(&first, IdSource::Data).unwrap());
        assert_eq!(id, AttestationId::new(&second, IdSource::Data).unwrap());
    }

    #[test]
    fn test_data_id_differs_per_committee_and_vote() {
        let base = attestation(&[true, false], &[3]);
        let other_committee = attestation(&[true, false], &[4]);
        let mut other_target = base.clone();
        other_target.data.target.epoch += 1;

        let id = AttestationId::new(&base, IdSource::Data).unwrap();
        assert_ne!(
            id,
            AttestationId::new(&other_committee, IdSource::Data).unwrap()
        );
        assert_ne!(id, AttestationId::new(&other_target, IdSource::Data).unwrap());
    }

    #[test]
    fn test_full_id_differs_when_bits_differ() {
        let first = attestation(&[true, false, true, false], &[3]);
        let second = attestation(&[true, false, false, false], &[3]);

        assert_eq!(
            AttestationId::new(&first, IdSource::Full).unwrap(),
            AttestationId::new(&first.clone(), IdSource::Full).unwrap()
        );
        assert_ne!(
            AttestationId::new(&first, IdSource::Full).unwrap(),
            AttestationId::new(&second, IdSource::Full).unwrap()
        );
    }

    #[test]
    fn test_empty_attestation_is_malformed() {
        let empty = attestation(&[], &[0]);

        for source in [IdSource::Data, IdSource::Full] {
            assert_eq!(
                AttestationId::new(&empty, source),
                Err(AttestationIdError::EmptyAggregationBits)
            );
        }
    }

    #[rstest]
    #[case::no_committee(&[], 0)]
    #[case::two_committees(&[0, 9], 2)]
    fn test_data_id_requires_single_committee(
        #[case] committees: &[usize],
        #[case] expected: usize,
    ) {
        let attestation = attestation(&[true], committees);

        assert_eq!(
            AttestationId::new(&attestation, IdSource::Data),
            Err(AttestationIdError::InvalidCommitteeBits(expected))
        );
    }

    #[test]
    fn test_full_id_requires_a_committee() {
        assert_eq!(
            AttestationId::new(&attestation(&[true], &[]), IdSource::Full),
            Err(AttestationIdError::InvalidCommitteeBits(0))
        );
        // Aggregates spanning several committees are valid under the full policy.
        assert!(AttestationId::new(&attestation(&[true], &[0, 9]), IdSource::Full).is_ok());
    }
}
