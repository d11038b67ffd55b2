use std::cmp::Reverse;

use ream_bls::{BLSSignature, traits::Aggregatable};
use ream_consensus_beacon::attestation::{AggregationBits, Attestation};

use crate::errors::OperationPoolError;

/// Packs attestations that share one vote into as few aggregates as possible.
///
/// Every input is cloned, the caller's slice is never modified. Attestations folded into the
/// same aggregate have pairwise disjoint signers, and the union of the returned aggregates covers
/// every signer present in the input. Two inputs that overlap without one containing the other
/// cannot be merged, because their signatures cannot be split, so they end up in separate
/// aggregates.
pub fn aggregate(attestations: &[Attestation]) -> Result<Vec<Attestation>, OperationPoolError> {
    let [first, rest @ ..] = attestations else {
        return Ok(vec![]);
    };
    if rest.is_empty() {
        return Ok(vec![first.clone()]);
    }

    let bits_len = first.aggregation_bits.len();
    if let Some(mismatched) = rest
        .iter()
        .find(|attestation| attestation.aggregation_bits.len() != bits_len)
    {
        return Err(OperationPoolError::AggregationError(format!(
            "Aggregation bits length mismatch: expected {bits_len}, got {}",
            mismatched.aggregation_bits.len()
        )));
    }

    let mut candidates = remove_redundant(attestations);
    let mut covered = AggregationBits::with_capacity(bits_len).map_err(|err| {
        OperationPoolError::AggregationError(format!("Invalid aggregation bits length: {err:?}"))
    })?;
    let mut aggregates = vec![];

    while !candidates.is_empty() {
        candidates.sort_by_key(|candidate| {
            Reverse(
                candidate
                    .aggregation_bits
                    .difference(&covered)
                    .num_set_bits(),
            )
        });

        let (seed, others) = candidates.split_at(1);
        let seed = &seed[0];
        let mut aggregation_bits = seed.aggregation_bits.clone();
        let mut signatures = vec![&seed.signature];
        for candidate in others {
            if candidate
                .aggregation_bits
                .intersection(&aggregation_bits)
                .is_zero()
            {
                aggregation_bits = aggregation_bits.union(&candidate.aggregation_bits);
                signatures.push(&candidate.signature);
            }
        }

        let signature = match signatures.as_slice() {
            [signature] => (*signature).clone(),
            signatures => BLSSignature::aggregate(signatures)?,
        };
        covered = covered.union(&aggregation_bits);
        aggregates.push(Attestation {
            aggregation_bits,
            data: seed.data.clone(),
            signature,
            committee_bits: seed.committee_bits.clone(),
        });

        candidates.retain(|candidate| !is_subset(&candidate.aggregation_bits, &covered));
    }

    Ok(aggregates)
}

/// Drops exact duplicates and attestations whose signers are all contained in another input.
fn remove_redundant(attestations: &[Attestation]) -> Vec<Attestation> {
    let mut sorted = attestations.to_vec();
    sorted.sort_by_key(|attestation| Reverse(attestation.num_participants()));

    let mut kept: Vec<Attestation> = Vec::with_capacity(sorted.len());
    for attestation in sorted {
        if !kept
            .iter()
            .any(|other| is_subset(&attestation.aggregation_bits, &other.aggregation_bits))
        {
            kept.push(attestation);
        }
    }
    kept
}

pub(crate) fn is_subset(bits: &AggregationBits, other: &AggregationBits) -> bool {
    bits.difference(other).is_zero()
}
