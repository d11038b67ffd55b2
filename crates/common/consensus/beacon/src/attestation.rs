use ream_bls::BLSSignature;
use ream_consensus_misc::attestation_data::AttestationData;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{
    BitList, BitVector,
    typenum::{U64, U131072},
};
use tree_hash_derive::TreeHash;

/// `MAX_VALIDATORS_PER_COMMITTEE * MAX_COMMITTEES_PER_SLOT` participation bits.
pub type AggregationBits = BitList<U131072>;

/// One bit per committee of the slot.
pub type CommitteeBits = BitVector<U64>;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Attestation {
    pub aggregation_bits: AggregationBits,
    pub data: AttestationData,
    pub signature: BLSSignature,
    pub committee_bits: CommitteeBits,
}

impl Attestation {
    /// An attestation without any participation seats carries no vote and is ignored by the
    /// pools.
    pub fn is_empty(&self) -> bool {
        self.aggregation_bits.len() == 0
    }

    pub fn committee_indices(&self) -> Vec<u64> {
        self.committee_bits
            .iter()
            .enumerate()
            .filter_map(|(index, bit)| bit.then_some(index as u64))
            .collect()
    }

    /// Returns the committee index if exactly one committee bit is set.
    pub fn committee_index(&self) -> Option<u64> {
        match self.committee_indices().as_slice() {
            [index] => Some(*index),
            _ => None,
        }
    }

    pub fn num_participants(&self) -> usize {
        self.aggregation_bits.num_set_bits()
    }

    pub fn is_aggregated(&self) -> bool {
        self.num_participants() > 1
    }

    /// True if no validator signed both `self` and `other`. Attestations with bitlists of
    /// different lengths are never considered disjoint.
    pub fn signers_disjoint_from(&self, other: &Self) -> bool {
        self.aggregation_bits.len() == other.aggregation_bits.len()
            && self
                .aggregation_bits
                .intersection(&other.aggregation_bits)
                .is_zero()
    }
}

#[cfg(test)]
mod tests {
    use ream_consensus_misc::constants::beacon::{
        MAX_COMMITTEES_PER_SLOT, MAX_VALIDATORS_PER_COMMITTEE,
    };

    use super::*;

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
            data: AttestationData::default(),
            signature: BLSSignature::infinity(),
            committee_bits,
        }
    }

    #[test]
    fn test_committee_index() {
        assert_eq!(attestation(&[true], &[5]).committee_index(), Some(5));
        assert_eq!(attestation(&[true], &[]).committee_index(), None);
        assert_eq!(attestation(&[true], &[1, 2]).committee_index(), None);
        assert_eq!(attestation(&[true], &[1, 2]).committee_indices(), vec![1, 2]);
    }

    #[test]
    fn test_signers_disjoint_from() {
        let left = attestation(&[true, false, true, false], &[0]);
        let right = attestation(&[false, true, false, true], &[0]);
        let overlapping = attestation(&[true, true, false, false], &[0]);
        let shorter = attestation(&[false, true], &[0]);

        assert!(left.signers_disjoint_from(&right));
        assert!(!left.signers_disjoint_from(&overlapping));
        assert!(!left.signers_disjoint_from(&shorter));
        assert!(overlapping.is_aggregated());
        assert!(!attestation(&[false, true], &[0]).is_aggregated());
    }

    #[test]
    fn test_bitfield_limits() {
        assert_eq!(
            AggregationBits::max_len() as u64,
            MAX_VALIDATORS_PER_COMMITTEE * MAX_COMMITTEES_PER_SLOT
        );
        assert_eq!(CommitteeBits::new().len() as u64, MAX_COMMITTEES_PER_SLOT);
    }

    #[test]
    fn test_is_empty() {
        assert!(attestation(&[], &[0]).is_empty());
        assert!(!attestation(&[false], &[0]).is_empty());
    }
}
