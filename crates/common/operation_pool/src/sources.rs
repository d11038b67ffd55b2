use std::sync::Arc;

use async_trait::async_trait;
use ream_consensus_beacon::attestation::Attestation;

use crate::attestation_map::AttestationPool;

/// Anything the batch job can read attestations from.
pub trait AttestationSource: Send + Sync {
    fn attestations(&self) -> Vec<Attestation>;
}

/// A pool the batch job may also rewrite, moving attestations between categories.
pub trait MutableAttestationSource: AttestationSource {
    fn save_attestations(&self, attestations: Vec<Attestation>) -> anyhow::Result<()>;

    fn delete_attestation(&self, attestation: &Attestation) -> anyhow::Result<()>;
}

/// Attestations observed inside blocks. They are handed to fork choice once and then cleared.
pub trait BlockAttestationSource: AttestationSource {
    fn clear_block_attestation(&self, attestation: &Attestation) -> anyhow::Result<()>;
}

/// The store fork choice reads its prepared attestations from.
#[async_trait]
pub trait ForkChoiceAttestationStore: Send + Sync {
    fn fork_choice_attestations(&self) -> Vec<Attestation>;

    async fn save_fork_choice_attestations(
        &self,
        attestations: Vec<Attestation>,
    ) -> anyhow::Result<()>;
}

impl AttestationSource for AttestationPool {
    fn attestations(&self) -> Vec<Attestation> {
        self.get_all()
    }
}

impl MutableAttestationSource for AttestationPool {
    fn save_attestations(&self, attestations: Vec<Attestation>) -> anyhow::Result<()> {
        Ok(self.save_many(attestations)?)
    }

    fn delete_attestation(&self, attestation: &Attestation) -> anyhow::Result<()> {
        Ok(self.delete(attestation)?)
    }
}

impl BlockAttestationSource for AttestationPool {
    fn clear_block_attestation(&self, attestation: &Attestation) -> anyhow::Result<()> {
        Ok(self.delete(attestation)?)
    }
}

#[async_trait]
impl ForkChoiceAttestationStore for AttestationPool {
    fn fork_choice_attestations(&self) -> Vec<Attestation> {
        self.get_all()
    }

    async fn save_fork_choice_attestations(
        &self,
        attestations: Vec<Attestation>,
    ) -> anyhow::Result<()> {
        Ok(self.save_many(attestations)?)
    }
}

/// Where a batch gathers its attestations from, besides the fork choice store itself.
#[derive(Clone)]
pub enum AttestationSources {
    /// Separate pools per category. Unaggregated attestations are folded into the aggregated
    /// pool before each batch, and block attestations are cleared once forwarded.
    Separate {
        unaggregated: Arc<dyn MutableAttestationSource>,
        aggregated: Arc<dyn MutableAttestationSource>,
        block: Arc<dyn BlockAttestationSource>,
    },
    /// A single pool holding every attestation the node has seen.
    Consolidated(Arc<dyn AttestationSource>),
}

/// Attestations read for one batch.
#[derive(Debug, Default)]
pub struct Gathered {
    pub attestations: Vec<Attestation>,
    /// The subset of `attestations` read from the block source.
    pub included_in_blocks: Vec<Attestation>,
}

impl AttestationSources {
    pub fn gather(&self) -> Gathered {
        match self {
            AttestationSources::Separate {
                unaggregated,
                aggregated,
                block,
            } => {
                let included_in_blocks = block.attestations();
                let mut attestations = unaggregated.attestations();
                attestations.extend(aggregated.attestations());
                attestations.extend(included_in_blocks.iter().cloned());
                Gathered {
                    attestations,
                    included_in_blocks,
                }
            }
            AttestationSources::Consolidated(pool) => Gathered {
                attestations: pool.attestations(),
                included_in_blocks: vec![],
            },
        }
    }

    pub fn block_source(&self) -> Option<&Arc<dyn BlockAttestationSource>> {
        match self {
            AttestationSources::Separate { block, .. } => Some(block),
            AttestationSources::Consolidated(_) => None,
        }
    }
}

/// The in-memory pools a node keeps, one per category of attestation.
#[derive(Debug, Default, Clone)]
pub struct AttestationPools {
    pub unaggregated: Arc<AttestationPool>,
    pub aggregated: Arc<AttestationPool>,
    pub block: Arc<AttestationPool>,
    pub fork_choice: Arc<AttestationPool>,
}

impl AttestationPools {
    /// Builds the batch sources over these pools. With `consolidated` set every attestation is
    /// read from the unaggregated pool, which then acts as the single shared pool.
    pub fn sources(&self, consolidated: bool) -> AttestationSources {
        if consolidated {
            AttestationSources::Consolidated(self.unaggregated.clone())
        } else {
            AttestationSources::Separate {
                unaggregated: self.unaggregated.clone(),
                aggregated: self.aggregated.clone(),
                block: self.block.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::attestation;

    #[test]
    fn test_separate_sources_gather_every_pool() {
        let pools = AttestationPools::default();
        pools.unaggregated.save(attestation(1, 0, "10")).unwrap();
        pools.aggregated.save(attestation(1, 0, "11")).unwrap();
        pools.block.save(attestation(2, 0, "01")).unwrap();
        pools.fork_choice.save(attestation(3, 0, "01")).unwrap();

        let sources = pools.sources(false);
        let gathered = sources.gather();

        assert_eq!(gathered.attestations.len(), 3);
        assert_eq!(gathered.included_in_blocks, vec![attestation(2, 0, "01")]);
        assert!(sources.block_source().is_some());
    }

    #[test]
    fn test_consolidated_source_reads_one_pool() {
        let pools = AttestationPools::default();
        pools.unaggregated.save(attestation(1, 0, "10")).unwrap();
        pools.aggregated.save(attestation(1, 0, "11")).unwrap();
        pools.block.save(attestation(2, 0, "01")).unwrap();

        let sources = pools.sources(true);

        let gathered = sources.gather();

        assert_eq!(gathered.attestations, vec![attestation(1, 0, "10")]);
        assert!(gathered.included_in_blocks.is_empty());
        assert!(sources.block_source().is_none());
    }

    #[test]
    fn test_clear_block_attestation() {
        let pool = AttestationPool::new();
        let included = attestation(4, 1, "0110");
        pool.save(included.clone()).unwrap();

        pool.clear_block_attestation(&included).unwrap();
        pool.clear_block_attestation(&included).unwrap();

        assert!(pool.is_empty());
    }

    #[test]
    fn test_pool_as_mutable_source() {
        let pool = AttestationPool::new();
        pool.save_attestations(vec![attestation(1, 0, "10"), attestation(1, 0, "01")])
            .unwrap();

        pool.delete_attestation(&attestation(1, 0, "10")).unwrap();

        assert_eq!(pool.attestations(), vec![attestation(1, 0, "01")]);
    }

    #[tokio::test]
    async fn test_pool_as_fork_choice_store() {
        let pool = AttestationPool::new();
        pool.save_fork_choice_attestations(vec![attestation(1, 0, "10"), attestation(1, 0, "01")])
            .await
            .unwrap();

        assert_eq!(pool.fork_choice_attestations().len(), 2);
    }
}
