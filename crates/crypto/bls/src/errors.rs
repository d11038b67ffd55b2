use thiserror::Error;

#[derive(Error, PartialEq, Debug)]
pub enum BLSError {
    #[error("blst error: {0:?}")]
    BlstError(blst::BLST_ERROR),
    #[error("Invalid byte length")]
    InvalidByteLength,
    #[error("Invalid hex string")]
    InvalidHexString,
    #[error("Cannot aggregate an empty set of signatures")]
    NoSignatures,
}

impl From<blst::BLST_ERROR> for BLSError {
    fn from(err: blst::BLST_ERROR) -> Self {
        BLSError::BlstError(err)
    }
}
