use std::{collections::HashMap, sync::Arc, time::Duration};

use ream_consensus_beacon::{
    attestation::Attestation,
    attestation_id::{AttestationId, IdSource},
};
use ream_metrics::{
    BATCH_FORK_CHOICE_ATTESTATIONS_TIME, FORK_CHOICE_ATTESTATIONS, SEEN_CACHE_ENTRIES,
    inc_int_counter_vec, set_int_gauge_vec, start_timer_vec, stop_timer,
};
use tokio::{sync::watch, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    aggregation::{aggregate, is_subset},
    clock::{SlotClock, SlotInterval, SlotIntervalTicker},
    errors::OperationPoolError,
    seen_cache::SeenCache,
    sources::{
        AttestationSources, ForkChoiceAttestationStore, Gathered, MutableAttestationSource,
    },
};

/// Offsets into a 12 second slot at which attestations are batched for fork choice.
pub const DEFAULT_AGGREGATE_INTERVALS: [Duration; 3] = [
    Duration::from_millis(7500),
    Duration::from_millis(9800),
    Duration::from_millis(11800),
];

/// Fits `intervals` into a slot of `slot_duration`, halving every offset until the largest one
/// falls inside the slot. The input is left untouched.
pub fn adjust_intervals(
    intervals: &[Duration],
    slot_duration: Duration,
) -> Result<Vec<Duration>, OperationPoolError> {
    if intervals.is_empty() {
        return Err(OperationPoolError::InvalidConfiguration(
            "At least one aggregate interval is required".to_string(),
        ));
    }
    if slot_duration.is_zero() {
        return Err(OperationPoolError::InvalidConfiguration(
            "Slot duration must be greater than zero".to_string(),
        ));
    }

    let mut adjusted = intervals.to_vec();
    while adjusted
        .iter()
        .max()
        .is_some_and(|largest| *largest >= slot_duration)
    {
        for interval in adjusted.iter_mut() {
            *interval /= 2;
        }
    }

    Ok(adjusted)
}

/// What a single batch did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// Aggregates moved from the unaggregated pool into the aggregated pool.
    pub pre_aggregated: usize,
    pub gathered: usize,
    /// Skipped because every signer was already forwarded.
    pub seen: usize,
    /// Skipped because no data id could be computed.
    pub malformed: usize,
    pub groups: usize,
    pub aggregates: usize,
    pub failed_groups: usize,
}

/// Gathers every known attestation, drops what fork choice already has and hands it the rest as
/// aggregates.
pub struct BatchJob {
    sources: AttestationSources,
    fork_choice_store: Arc<dyn ForkChoiceAttestationStore>,
    seen_cache: Arc<SeenCache>,
}

impl BatchJob {
    pub fn new(
        sources: AttestationSources,
        fork_choice_store: Arc<dyn ForkChoiceAttestationStore>,
        seen_cache: Arc<SeenCache>,
    ) -> Self {
        Self {
            sources,
            fork_choice_store,
            seen_cache,
        }
    }

    pub fn seen_cache(&self) -> &Arc<SeenCache> {
        &self.seen_cache
    }

    /// Runs one batch.
    ///
    /// With separate pools the unaggregated attestations are first folded into the aggregated
    /// pool. Attestations that cannot be identified and groups that fail to aggregate are
    /// skipped. A failing fork choice store ends the batch, and every vote not yet saved is
    /// forgotten by the seen cache so the next batch retries it.
    pub async fn run(&self) -> Result<BatchSummary, OperationPoolError> {
        let pre_aggregated = match &self.sources {
            AttestationSources::Separate {
                unaggregated,
                aggregated,
                ..
            } => self.aggregate_unaggregated(unaggregated.as_ref(), aggregated.as_ref())?,
            AttestationSources::Consolidated(_) => 0,
        };

        let Gathered {
            mut attestations,
            included_in_blocks,
        } = self.sources.gather();
        attestations.extend(self.fork_choice_store.fork_choice_attestations());

        let mut summary = BatchSummary {
            pre_aggregated,
            gathered: attestations.len(),
            ..Default::default()
        };

        let mut groups: HashMap<AttestationId, Vec<Attestation>> = HashMap::new();
        for attestation in attestations {
            let id = match AttestationId::new(&attestation, IdSource::Data) {
                Ok(id) => id,
                Err(err) => {
                    warn!(
                        "Skipping attestation for slot {} target {}: {err}",
                        attestation.data.slot, attestation.data.target
                    );
                    summary.malformed += 1;
                    continue;
                }
            };
            if self.seen_cache.record(id, &attestation.aggregation_bits) {
                summary.seen += 1;
                continue;
            }
            groups.entry(id).or_default().push(attestation);
        }

        let groups = groups.into_iter().collect::<Vec<_>>();
        summary.groups = groups.len();
        for (index, (id, group)) in groups.iter().enumerate() {
            let aggregates = match aggregate(group) {
                Ok(aggregates) => aggregates,
                Err(err) => {
                    warn!("Could not aggregate attestations for data {id}: {err}");
                    self.seen_cache.forget(id);
                    summary.failed_groups += 1;
                    continue;
                }
            };

            let aggregates_len = aggregates.len();
            if let Err(err) = self
                .fork_choice_store
                .save_fork_choice_attestations(aggregates)
                .await
            {
                for (id, _) in &groups[index..] {
                    self.seen_cache.forget(id);
                }
                self.record_metrics(&summary);
                return Err(OperationPoolError::ExternalStoreError(err));
            }
            summary.aggregates += aggregates_len;
        }

        let cleared = match self.sources.block_source() {
            Some(block_source) => included_in_blocks
                .iter()
                .try_for_each(|attestation| block_source.clear_block_attestation(attestation)),
            None => Ok(()),
        };

        self.record_metrics(&summary);
        cleared.map_err(OperationPoolError::ExternalStoreError)?;
        Ok(summary)
    }

    /// Folds each vote's unaggregated attestations together, saves the aggregates into the
    /// aggregated pool and deletes the attestations they cover from the unaggregated pool.
    /// Returns how many aggregates were moved. A vote whose attestations fail to aggregate is
    /// left in the unaggregated pool.
    fn aggregate_unaggregated(
        &self,
        unaggregated: &dyn MutableAttestationSource,
        aggregated: &dyn MutableAttestationSource,
    ) -> Result<usize, OperationPoolError> {
        let mut groups: HashMap<AttestationId, Vec<Attestation>> = HashMap::new();
        for attestation in unaggregated.attestations() {
            // Malformed attestations are reported by the batch itself.
            if let Ok(id) = AttestationId::new(&attestation, IdSource::Data) {
                groups.entry(id).or_default().push(attestation);
            }
        }

        let mut moved = 0;
        for (id, group) in groups {
            if group.len() < 2 {
                continue;
            }

            let aggregates = match aggregate(&group) {
                Ok(aggregates) => aggregates
                    .into_iter()
                    .filter(|aggregate| aggregate.is_aggregated())
                    .collect::<Vec<_>>(),
                Err(err) => {
                    warn!("Could not pre-aggregate attestations for data {id}: {err}");
                    continue;
                }
            };
            if aggregates.is_empty() {
                continue;
            }

            let consumed = group
                .iter()
                .filter(|attestation| {
                    aggregates.iter().any(|aggregate| {
                        is_subset(&attestation.aggregation_bits, &aggregate.aggregation_bits)
                    })
                })
                .collect::<Vec<_>>();
            moved += aggregates.len();
            aggregated
                .save_attestations(aggregates)
                .map_err(OperationPoolError::ExternalStoreError)?;
            for attestation in consumed {
                unaggregated
                    .delete_attestation(attestation)
                    .map_err(OperationPoolError::ExternalStoreError)?;
            }
        }

        if moved > 0 {
            debug!("Moved {moved} aggregates into the aggregated pool");
        }
        Ok(moved)
    }

    fn record_metrics(&self, summary: &BatchSummary) {
        inc_int_counter_vec(
            &FORK_CHOICE_ATTESTATIONS,
            summary.pre_aggregated as u64,
            &["pre_aggregated"],
        );
        inc_int_counter_vec(&FORK_CHOICE_ATTESTATIONS, summary.seen as u64, &["seen"]);
        inc_int_counter_vec(
            &FORK_CHOICE_ATTESTATIONS,
            summary.aggregates as u64,
            &["aggregated"],
        );
        inc_int_counter_vec(
            &FORK_CHOICE_ATTESTATIONS,
            summary.failed_groups as u64,
            &["failed"],
        );
        let no_labels: &[&str] = &[];
        set_int_gauge_vec(&SEEN_CACHE_ENTRIES, self.seen_cache.len() as i64, no_labels);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next interval.
    Idle,
    Running(SlotInterval),
    Stopped,
}

/// Runs a [`BatchJob`] at fixed offsets into every slot until cancelled.
pub struct ForkChoicePreparer {
    job: BatchJob,
    ticker: SlotIntervalTicker,
    cancellation_token: CancellationToken,
}

impl ForkChoicePreparer {
    /// `intervals` are fitted into the clock's slot duration with [`adjust_intervals`].
    pub fn new(
        job: BatchJob,
        clock: SlotClock,
        intervals: &[Duration],
        cancellation_token: CancellationToken,
    ) -> Result<Self, OperationPoolError> {
        let intervals = adjust_intervals(intervals, clock.slot_duration())?;
        Ok(Self {
            job,
            ticker: SlotIntervalTicker::new(clock, intervals)?,
            cancellation_token,
        })
    }

    pub fn intervals(&self) -> &[Duration] {
        self.ticker.offsets()
    }

    /// Spawns the scheduler loop onto the current tokio runtime.
    ///
    /// The loop stops when the token passed to [`Self::new`] is cancelled or
    /// [`SchedulerHandle::stop`] is called. A batch that is already running is finished first.
    pub fn start(self) -> SchedulerHandle {
        let cancellation_token = self.cancellation_token.child_token();
        let (state_sender, state_receiver) = watch::channel(SchedulerState::Idle);
        let task = tokio::spawn(self.run(cancellation_token.clone(), state_sender));

        SchedulerHandle {
            cancellation_token,
            state: state_receiver,
            task,
        }
    }

    async fn run(
        mut self,
        cancellation_token: CancellationToken,
        state: watch::Sender<SchedulerState>,
    ) {
        info!(
            "Preparing fork choice attestations at intervals {:?}",
            self.ticker.offsets()
        );

        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => break,
                tick = self.ticker.tick() => {
                    let Some(tick) = tick else {
                        error!("Slot clock cannot represent the next interval");
                        break;
                    };

                    state.send_replace(SchedulerState::Running(tick));
                    let interval_label = tick.interval.to_string();
                    let timer = start_timer_vec(&BATCH_FORK_CHOICE_ATTESTATIONS_TIME, &[interval_label.as_str()]);
                    let started = Instant::now();

                    match self.job.run().await {
                        Ok(summary) => debug!("Prepared fork choice attestations for slot {}: {summary:?}", tick.slot),
                        Err(err) => error!("Could not prepare attestations for fork choice: {err}"),
                    }

                    stop_timer(timer);
                    if tick.interval == 0 {
                        debug!(
                            "Batched fork choice attestations for slot {} in {:?}",
                            tick.slot,
                            started.elapsed()
                        );
                    }
                    state.send_replace(SchedulerState::Idle);
                }
            }
        }

        state.send_replace(SchedulerState::Stopped);
        info!("Stopped preparing fork choice attestations");
    }
}

/// Control over a started [`ForkChoicePreparer`].
#[derive(Debug)]
pub struct SchedulerHandle {
    cancellation_token: CancellationToken,
    state: watch::Receiver<SchedulerState>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Requests shutdown and waits for the loop to exit.
    pub async fn stop(self) -> anyhow::Result<()> {
        self.cancellation_token.cancel();
        self.task.await?;
        Ok(())
    }
}
