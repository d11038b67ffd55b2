#![warn(clippy::unwrap_used)]

pub mod attestation;
pub mod attestation_id;
