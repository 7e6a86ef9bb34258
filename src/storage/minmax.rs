//! A windowed running-maximum filter over a fixed number of recent samples,
//! indexed by an externally supplied monotonic round counter (BBR's
//! `rtt_cnt`). Ported from `minmax_insert`/`minmax_get` in the original BBR
//! source: each insert overwrites the slot for the current round and the max
//! is recomputed by scanning every slot still inside the window.
#[derive(Debug, Clone, Copy)]
struct Sample {
    round: u32,
    value: u64,
}

#[derive(Debug, Clone)]
pub struct MinMaxFilter {
    window_len: u32,
    samples: Vec<Sample>,
    max_idx: usize,
}

impl MinMaxFilter {
    pub fn new(window_len: u32) -> MinMaxFilter {
        MinMaxFilter {
            window_len,
            samples: vec![Sample { round: 0, value: 0 }; window_len as usize],
            max_idx: 0,
        }
    }

    /// Seed every slot with the same initial sample.
    pub fn reset(&mut self, round: u32, value: u64) {
        for sample in &mut self.samples {
            *sample = Sample { round, value };
        }
        self.max_idx = 0;
    }

    pub fn get(&self) -> u64 {
        self.samples[self.max_idx].value
    }

    /// Insert `value` for `round`, then recompute the max over the window.
    pub fn insert(&mut self, round: u32, value: u64) {
        let idx = (round % self.window_len) as usize;
        self.samples[idx] = Sample { round, value };

        let mut max_idx = idx;
        for (i, sample) in self.samples.iter().enumerate() {
            if round.wrapping_sub(sample.round) >= self.window_len {
                continue;
            }
            if sample.value >= self.samples[max_idx].value {
                max_idx = i;
            }
        }
        self.max_idx = max_idx;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_max_within_window() {
        let mut f = MinMaxFilter::new(4);
        f.reset(0, 10);
        f.insert(1, 50);
        f.insert(2, 5);
        assert_eq!(f.get(), 50);
    }

    #[test]
    fn old_max_ages_out_of_window() {
        let mut f = MinMaxFilter::new(4);
        f.reset(0, 100);
        f.insert(1, 10);
        f.insert(2, 10);
        f.insert(3, 10);
        f.insert(4, 10);
        // round 0's sample is now outside the 4-wide window.
        assert_eq!(f.get(), 10);
    }
}
