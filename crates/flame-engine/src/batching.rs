//! Adaptive batching controller (C8): predicts the next plot-kernel batch
//! size from the observed quality-improvement rate, clamped by update
//! cadence, the remaining time budget, and the configured batch-time cap.

/// The subset of engine configuration the controller needs, snapshotted
/// once per batch so a concurrent `set_*` call mid-batch cannot tear the
/// formula's inputs.
#[derive(Debug, Clone, Copy)]
pub struct BatchingInputs {
    pub updates_per_sec: f64,
    pub max_batch_time_sec: f64,
    pub batch_accelerated: bool,
}

/// Effective maximum batch wall time `B = min(1/updatesPerSec,
/// maxBatchTimeSec)`, treating a non-positive bound as "no limit".
pub fn effective_max_batch_time(inputs: &BatchingInputs) -> f64 {
    let b1 = if inputs.updates_per_sec > 0.0 { 1.0 / inputs.updates_per_sec } else { f64::INFINITY };
    let b2 = if inputs.max_batch_time_sec > 0.0 { inputs.max_batch_time_sec } else { f64::INFINITY };
    b1.min(b2)
}

/// Mutable controller state: just the current batch size, carried across
/// plot-kernel launches for one flame.
#[derive(Debug, Clone, Copy)]
pub struct BatchingState {
    batch_size: u32,
}

impl Default for BatchingState {
    fn default() -> Self {
        BatchingState { batch_size: 1 }
    }
}

impl BatchingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Recompute and store the next batch size. When acceleration is
    /// disabled the batch size stays permanently 1.
    ///
    /// `delta_t`/`delta_q` are the previous batch's wall time and quality
    /// increment; `quality`/`elapsed` are post-batch totals.
    pub fn advance(
        &mut self,
        inputs: &BatchingInputs,
        delta_t: f64,
        delta_q: f64,
        quality: f64,
        max_quality: f64,
        elapsed: f64,
        max_time: f64,
    ) -> u32 {
        if !inputs.batch_accelerated {
            self.batch_size = 1;
            return self.batch_size;
        }

        let b = effective_max_batch_time(inputs);
        let rate = if delta_t > 0.0 { delta_q / delta_t } else { 0.0 };
        let dtime_q = if rate > 0.0 { (max_quality - quality) / rate } else { f64::INFINITY };
        let dtime = dtime_q.min(max_time - elapsed).min(b);

        let next = if delta_t > 0.0 {
            ((self.batch_size as f64) * dtime / delta_t).floor()
        } else {
            self.batch_size as f64
        };

        self.batch_size = (next.max(1.0)) as u32;
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_zero_means_no_cap() {
        let inputs = BatchingInputs { updates_per_sec: 0.0, max_batch_time_sec: 0.0, batch_accelerated: true };
        assert_eq!(effective_max_batch_time(&inputs), f64::INFINITY);
    }

    #[test]
    fn cap_is_the_tighter_of_the_two_bounds() {
        let inputs = BatchingInputs { updates_per_sec: 4.0, max_batch_time_sec: 1.0, batch_accelerated: true };
        // 1/4 = 0.25s is tighter than the 1s cap.
        assert_eq!(effective_max_batch_time(&inputs), 0.25);
    }

    #[test]
    fn disabled_acceleration_pins_batch_size_to_one() {
        let inputs = BatchingInputs { updates_per_sec: 0.0, max_batch_time_sec: 0.0, batch_accelerated: false };
        let mut state = BatchingState::new();
        for _ in 0..5 {
            assert_eq!(state.advance(&inputs, 0.1, 0.5, 1.0, 10.0, 0.1, 60.0), 1);
        }
    }

    #[test]
    fn converges_within_one_step_under_constant_rate() {
        let inputs = BatchingInputs { updates_per_sec: 0.0, max_batch_time_sec: 0.0, batch_accelerated: true };
        let mut state = BatchingState::new();
        let delta_t = 0.1;
        let delta_q = 0.5; // rate = 5 quality/sec
        let quality = 1.0;
        let max_quality = 10.0;
        let elapsed = 1.0;
        let max_time = 60.0;

        let next = state.advance(&inputs, delta_t, delta_q, quality, max_quality, elapsed, max_time);

        let expected_dtime = ((max_quality - quality) / (delta_q / delta_t))
            .min(max_time - elapsed)
            .min(effective_max_batch_time(&inputs));
        let predicted_wall_time = (next as f64) * delta_t / 1.0;
        assert!((predicted_wall_time - expected_dtime).abs() < delta_t);
    }

    #[test]
    fn batch_size_never_drops_below_one() {
        let inputs = BatchingInputs { updates_per_sec: 100.0, max_batch_time_sec: 0.0, batch_accelerated: true };
        let mut state = BatchingState::new();
        let next = state.advance(&inputs, 1.0, 0.0001, 9.999, 10.0, 59.9, 60.0);
        assert!(next >= 1);
    }
}
