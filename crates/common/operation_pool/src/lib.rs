pub mod aggregation;
pub mod attestation_map;
pub mod clock;
pub mod errors;
pub mod prepare_fork_choice;
pub mod seen_cache;
pub mod sources;

#[cfg(test)]
mod test_utils;
