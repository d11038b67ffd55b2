use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::{Instant, sleep_until};

use crate::errors::OperationPoolError;

/// Maps monotonic instants to beacon chain slots.
#[derive(Debug, Clone, Copy)]
pub struct SlotClock {
    /// Start of `anchor_slot`.
    anchor: Instant,
    anchor_slot: u64,
    slot_duration: Duration,
}

impl SlotClock {
    /// Creates a clock whose slot 0 starts at `genesis`.
    pub fn new(genesis: Instant, slot_duration: Duration) -> Result<Self, OperationPoolError> {
        if slot_duration.is_zero() {
            return Err(OperationPoolError::InvalidConfiguration(
                "Slot duration must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            anchor: genesis,
            anchor_slot: 0,
            slot_duration,
        })
    }

    /// Creates a clock from a genesis time in seconds since the unix epoch.
    ///
    /// The clock is anchored at the start of the current slot, so genesis times far in the past
    /// never have to be represented as an [`Instant`].
    pub fn from_genesis_time(
        genesis_time: u64,
        slot_duration: Duration,
    ) -> Result<Self, OperationPoolError> {
        let genesis = UNIX_EPOCH
            .checked_add(Duration::from_secs(genesis_time))
            .ok_or_else(|| {
                OperationPoolError::InvalidConfiguration(format!(
                    "Genesis time {genesis_time} is out of range"
                ))
            })?;
        let now = Instant::now();
        let since_genesis = match SystemTime::now().duration_since(genesis) {
            Ok(since_genesis) => since_genesis,
            Err(err) => {
                let genesis = now.checked_add(err.duration()).ok_or_else(|| {
                    OperationPoolError::InvalidConfiguration(format!(
                        "Genesis time {genesis_time} is too far in the future"
                    ))
                })?;
                return Self::new(genesis, slot_duration);
            }
        };

        let mut clock = Self::new(now, slot_duration)?;
        let current_slot = (since_genesis.as_nanos() / slot_duration.as_nanos()) as u64;
        let into_slot = Duration::from_nanos(
            (since_genesis.as_nanos() % slot_duration.as_nanos()) as u64,
        );
        clock.anchor = now.checked_sub(into_slot).ok_or_else(|| {
            OperationPoolError::InvalidConfiguration(format!(
                "Cannot represent the start of slot {current_slot}"
            ))
        })?;
        clock.anchor_slot = current_slot;

        Ok(clock)
    }

    pub fn slot_duration(&self) -> Duration {
        self.slot_duration
    }

    /// The slot `instant` falls in, or `None` before the clock's first slot.
    pub fn slot_at(&self, instant: Instant) -> Option<u64> {
        let elapsed = instant.checked_duration_since(self.anchor)?;
        let slots = elapsed.as_nanos() / self.slot_duration.as_nanos();
        self.anchor_slot.checked_add(u64::try_from(slots).ok()?)
    }

    pub fn current_slot(&self) -> Option<u64> {
        self.slot_at(Instant::now())
    }

    /// Start of `slot`, or `None` if it precedes the clock's first slot.
    pub fn start_of(&self, slot: u64) -> Option<Instant> {
        let slots = u32::try_from(slot.checked_sub(self.anchor_slot)?).ok()?;
        self.anchor.checked_add(self.slot_duration.checked_mul(slots)?)
    }
}

/// The `interval`-th configured offset within `slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotInterval {
    pub slot: u64,
    pub interval: usize,
}

/// Fires once per configured offset into every slot.
///
/// Ticks that were missed while the caller was busy are skipped rather than fired in a burst.
#[derive(Debug)]
pub struct SlotIntervalTicker {
    clock: SlotClock,
    offsets: Vec<Duration>,
    last: Option<SlotInterval>,
}

impl SlotIntervalTicker {
    /// `offsets` must be strictly increasing and shorter than a slot.
    pub fn new(clock: SlotClock, offsets: Vec<Duration>) -> Result<Self, OperationPoolError> {
        if offsets.is_empty() {
            return Err(OperationPoolError::InvalidConfiguration(
                "At least one interval is required".to_string(),
            ));
        }
        if offsets.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(OperationPoolError::InvalidConfiguration(format!(
                "Intervals must be strictly increasing: {offsets:?}"
            )));
        }
        if offsets
            .last()
            .is_some_and(|offset| *offset >= clock.slot_duration())
        {
            return Err(OperationPoolError::InvalidConfiguration(format!(
                "Intervals must be shorter than the slot duration: {offsets:?}"
            )));
        }

        Ok(Self {
            clock,
            offsets,
            last: None,
        })
    }

    pub fn offsets(&self) -> &[Duration] {
        &self.offsets
    }

    /// Waits for the next tick. Returns `None` if the clock cannot represent it.
    pub async fn tick(&mut self) -> Option<SlotInterval> {
        let (next, at) = self.next_after(Instant::now())?;
        sleep_until(at).await;
        self.last = Some(next);
        Some(next)
    }

    fn next_after(&self, now: Instant) -> Option<(SlotInterval, Instant)> {
        let slot = self
            .clock
            .slot_at(now)
            .unwrap_or(self.clock.anchor_slot);

        for slot in [slot, slot.checked_add(1)?] {
            let start = self.clock.start_of(slot)?;
            for (interval, offset) in self.offsets.iter().enumerate() {
                let candidate = SlotInterval { slot, interval };
                let at = start + *offset;
                if at >= now && self.last.is_none_or(|last| candidate > last) {
                    return Some((candidate, at));
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::advance;

    use super::*;

    const SLOT: Duration = Duration::from_secs(6);

    fn ticker(genesis: Instant, offsets: &[u64]) -> SlotIntervalTicker {
        let offsets = offsets.iter().copied().map(Duration::from_millis).collect();
        SlotIntervalTicker::new(SlotClock::new(genesis, SLOT).unwrap(), offsets).unwrap()
    }

    /// The timer wheel has millisecond resolution, so wakeups may land slightly late.
    fn assert_elapsed(since: Instant, expected: Duration) {
        let elapsed = Instant::now() - since;
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "elapsed {elapsed:?}, expected {expected:?}"
        );
    }

    #[test]
    fn test_slot_at_and_start_of() {
        let genesis = Instant::now();
        let clock = SlotClock::new(genesis, SLOT).unwrap();

        assert_eq!(clock.slot_at(genesis), Some(0));
        assert_eq!(clock.slot_at(genesis + Duration::from_millis(5999)), Some(0));
        assert_eq!(clock.slot_at(genesis + Duration::from_secs(6)), Some(1));
        assert_eq!(clock.slot_at(genesis + Duration::from_secs(61)), Some(10));
        assert_eq!(clock.start_of(10), Some(genesis + Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_slot_duration_is_rejected() {
        assert!(matches!(
            SlotClock::new(Instant::now(), Duration::ZERO),
            Err(OperationPoolError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_clock_from_past_genesis_time() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("correct time")
            .as_secs();
        let clock = SlotClock::from_genesis_time(now - 25, Duration::from_secs(12)).unwrap();

        assert_eq!(clock.current_slot(), Some(2));
        assert_eq!(clock.start_of(1), None);
        assert!(clock.start_of(2).unwrap() <= Instant::now());
        assert!(clock.start_of(3).unwrap() > Instant::now());
    }

    #[test]
    fn test_clock_from_future_genesis_time() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("correct time")
            .as_secs();
        let clock = SlotClock::from_genesis_time(now + 100, Duration::from_secs(12)).unwrap();

        assert_eq!(clock.current_slot(), None);
        assert!(clock.start_of(0).unwrap() > Instant::now());
    }

    #[test]
    fn test_unrepresentable_genesis_time_is_rejected() {
        assert!(matches!(
            SlotClock::from_genesis_time(u64::MAX, Duration::from_secs(12)),
            Err(OperationPoolError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_invalid_offsets_are_rejected() {
        let clock = SlotClock::new(Instant::now(), SLOT).unwrap();
        for offsets in [vec![], vec![3000, 1000], vec![1000, 1000], vec![0, 6000]] {
            let offsets = offsets.into_iter().map(Duration::from_millis).collect();
            assert!(SlotIntervalTicker::new(clock, offsets).is_err());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_follow_offsets() {
        let genesis = Instant::now();
        let mut ticker = ticker(genesis, &[0, 3000]);

        let expected = [
            (0, 0, Duration::ZERO),
            (0, 1, Duration::from_secs(3)),
            (1, 0, Duration::from_secs(6)),
            (1, 1, Duration::from_secs(9)),
        ];
        for (slot, interval, at) in expected {
            assert_eq!(ticker.tick().await, Some(SlotInterval { slot, interval }));
            assert_elapsed(genesis, at);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_ticks_are_skipped() {
        let genesis = Instant::now();
        let mut ticker = ticker(genesis, &[0, 3000]);
        ticker.tick().await;

        advance(Duration::from_secs(7)).await;

        assert_eq!(
            ticker.tick().await,
            Some(SlotInterval {
                slot: 1,
                interval: 1
            })
        );
        assert_elapsed(genesis, Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_genesis() {
        let genesis = Instant::now() + Duration::from_secs(10);
        let mut ticker = ticker(genesis, &[1000]);

        assert_eq!(
            ticker.tick().await,
            Some(SlotInterval {
                slot: 0,
                interval: 0
            })
        );
        assert_elapsed(genesis, Duration::from_secs(1));
    }
}
