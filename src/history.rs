// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::VecDeque;

/// How many throughput samples the dashboard keeps: 20 retained plus the
/// newest one before the oldest is evicted.
pub const RATE_HISTORY_CAPACITY: usize = 21;

/// One point on the speed chart: raw per-tick rate, no smoothing.
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputSample {
    pub label: String,
    pub mbps: f64,
}

/// Fixed-capacity FIFO ring of recent throughput samples.
///
/// Capacity is set at construction and never changes; pushing at capacity
/// evicts the oldest sample first.
#[derive(Debug)]
pub struct RateHistory {
    samples: VecDeque<ThroughputSample>,
    capacity: usize,
}

impl RateHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: ThroughputSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> impl Iterator<Item = &ThroughputSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
