use ream_bls::errors::BLSError;
use ream_consensus_beacon::attestation_id::AttestationIdError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperationPoolError {
    #[error("Could not create attestation ID: {0}")]
    IdComputationFailed(#[from] AttestationIdError),

    #[error("Failed to aggregate attestations: {0}")]
    AggregationError(String),

    #[error("External store error: {0}")]
    ExternalStoreError(anyhow::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<BLSError> for OperationPoolError {
    fn from(err: BLSError) -> Self {
        OperationPoolError::AggregationError(format!("Failed to aggregate signatures: {err}"))
    }
}
