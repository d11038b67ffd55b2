use alloy_primitives::B256;
use blst::min_pk::SecretKey;
use ream_bls::{BLSSignature, constants::DST};
use ream_consensus_beacon::attestation::{AggregationBits, Attestation, CommitteeBits};
use ream_consensus_misc::{attestation_data::AttestationData, checkpoint::Checkpoint};

pub fn sign(seed: u8, message: &[u8]) -> BLSSignature {
    SecretKey::key_gen(&[seed; 32], &[])
        .expect("valid key material")
        .sign(message, DST, &[])
        .into()
}

/// Parses a bit string such as `"1010"` into aggregation bits of the same length.
pub fn bits(pattern: &str) -> AggregationBits {
    let mut aggregation_bits =
        AggregationBits::with_capacity(pattern.len()).expect("pattern within bitlist limit");
    for (index, bit) in pattern.chars().enumerate() {
        aggregation_bits
            .set(index, bit == '1')
            .expect("index within bitlist length");
    }
    aggregation_bits
}

pub fn attestation_data(slot: u64) -> AttestationData {
    AttestationData {
        slot,
        index: 0,
        beacon_block_root: B256::repeat_byte(slot as u8),
        source: Checkpoint::new(0, B256::repeat_byte(0x01)),
        target: Checkpoint::new(1, B256::repeat_byte(0x02)),
    }
}

/// Builds an attestation for `slot` and `committee` with the given participation pattern and
/// a valid signature.
pub fn attestation(slot: u64, committee: usize, pattern: &str) -> Attestation {
    let mut committee_bits = CommitteeBits::new();
    committee_bits
        .set(committee, true)
        .expect("committee within bitvector length");
    let seed = pattern
        .bytes()
        .fold(slot as u8 ^ committee as u8, |seed, byte| {
            seed.wrapping_mul(31).wrapping_add(byte)
        });

    Attestation {
        aggregation_bits: bits(pattern),
        data: attestation_data(slot),
        signature: sign(seed, pattern.as_bytes()),
        committee_bits,
    }
}
