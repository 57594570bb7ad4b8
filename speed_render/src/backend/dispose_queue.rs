/// Deferred release of transient resources
///
/// Resources referenced by recorded commands are pushed while recording,
/// sealed with the timeline value signaled by their submission, and handed
/// back by `retire` once the device has reached that value. Dropping what
/// `retire` returns releases them.

use std::collections::VecDeque;

/// Per-command-buffer list of resources waiting for GPU completion
#[derive(Debug)]
pub struct DisposeQueue<T> {
    /// Pushed since the last seal
    pending: Vec<T>,
    /// Sealed batches, ordered by increasing retire value
    in_flight: VecDeque<(u64, Vec<T>)>,
}

impl<T> Default for DisposeQueue<T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            in_flight: VecDeque::new(),
        }
    }
}

impl<T> DisposeQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `item` alive until the next sealed submission completes
    pub fn push(&mut self, item: T) {
        self.pending.push(item);
    }

    /// Tag every pending item with the timeline value of the submission
    /// that references it
    ///
    /// Values must be sealed in increasing order.
    pub fn seal(&mut self, retire_at: u64) {
        if self.pending.is_empty() {
            return;
        }
        debug_assert!(
            self.in_flight.back().map_or(true, |(value, _)| *value <= retire_at),
            "dispose queue sealed out of order"
        );
        let batch = std::mem::take(&mut self.pending);
        self.in_flight.push_back((retire_at, batch));
    }

    /// Remove every batch whose retire value is `<= completed`
    pub fn retire(&mut self, completed: u64) -> Vec<T> {
        let mut retired = Vec::new();
        while let Some((value, _)) = self.in_flight.front() {
            if *value > completed {
                break;
            }
            if let Some((_, batch)) = self.in_flight.pop_front() {
                retired.extend(batch);
            }
        }
        retired
    }

    /// Remove everything, sealed or not
    ///
    /// Only valid once the device is known to be idle.
    pub fn drain_all(&mut self) -> Vec<T> {
        let mut drained: Vec<T> = self.in_flight.drain(..).flat_map(|(_, batch)| batch).collect();
        drained.append(&mut self.pending);
        drained
    }

    /// Items pushed since the last seal
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Items sealed but not yet retired
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.iter().map(|(_, batch)| batch.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}

#[cfg(test)]
#[path = "dispose_queue_tests.rs"]
mod tests;
