//! The per-device round pipeline.
//!
//! Grounded on `worker::gpu::GpuWorker::run`/`run_batch`: a device runs
//! rounds back to back until told to stop, feeding every hit to the shared
//! aggregator. Generalized here to pipeline two rounds in flight per
//! device instead of one round per batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::aggregator::ResultAggregator;
use crate::device::DeviceContext;
use crate::error::GpuError;

/// Drives one attached GPU's round loop.
pub struct RoundDriver {
    device_label: String,
    device: DeviceContext,
    global_work_size: usize,
    next_round: u64,
}

impl RoundDriver {
    pub fn new(device_label: String, device: DeviceContext, global_work_size: usize) -> Self {
        Self {
            device_label,
            device,
            global_work_size,
            next_round: 0,
        }
    }

    /// Runs rounds until `stop_flag` is set, publishing hits to
    /// `aggregator`. Keeps two rounds in flight: round N+1 is enqueued
    /// before round N's results are read back, so the device never idles
    /// waiting on the host. Round N's results live in their own
    /// parity-indexed buffer slot (`device.rs`'s `RESULT_SLOTS`), so
    /// enqueuing round N+1 never overwrites data this loop hasn't collected
    /// yet.
    pub fn run(&mut self, aggregator: &ResultAggregator, stop_flag: &Arc<AtomicBool>) {
        let mut pending_round: Option<u64> = None;

        loop {
            if stop_flag.load(Ordering::Relaxed) {
                break;
            }

            if let Err(e) = self.device.refresh_best_score(aggregator.best_score()) {
                eprintln!("device {}: failed to refresh best score: {}", self.device_label, e);
                std::thread::sleep(std::time::Duration::from_millis(100));
                continue;
            }

            let round = self.next_round;
            if let Err(e) = self.device.enqueue_round(round, self.global_work_size) {
                eprintln!("device {}: round {} enqueue failed: {}", self.device_label, round, e);
                std::thread::sleep(std::time::Duration::from_millis(100));
                continue;
            }
            self.next_round += 1;

            let just_enqueued = round;
            if let Some(previous_round) = pending_round.replace(just_enqueued) {
                if let Err(e) = self.collect_and_publish(previous_round, aggregator) {
                    eprintln!(
                        "device {}: round {} readback failed: {}",
                        self.device_label, previous_round, e
                    );
                }
            }
        }

        if let Some(previous_round) = pending_round {
            if let Err(e) = self.collect_and_publish(previous_round, aggregator) {
                eprintln!(
                    "device {}: round {} final readback failed: {}",
                    self.device_label, previous_round, e
                );
            }
        }

        if let Err(e) = self.device.shutdown() {
            eprintln!("device {}: shutdown error: {}", self.device_label, e);
        }
    }

    /// Reads back `round`'s results (from the buffer slot it was enqueued
    /// into, see `device.rs`'s `RESULT_SLOTS`) and publishes each one.
    /// Each result carries its own `round`/`offset` as written by the score
    /// kernel, so the aggregator labels hits from what the GPU recorded
    /// rather than from this driver-side counter.
    fn collect_and_publish(&self, round: u64, aggregator: &ResultAggregator) -> Result<(), GpuError> {
        let results = self.device.collect_results(round)?;
        for result in results {
            aggregator.publish(result, &self.device_label);
        }
        Ok(())
    }
}
