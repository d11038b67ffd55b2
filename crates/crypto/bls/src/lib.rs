pub mod constants;
pub mod errors;
pub mod signature;
pub mod supranational;
pub mod traits;

pub use signature::BLSSignature;
