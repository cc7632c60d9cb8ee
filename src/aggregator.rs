//! Cross-device result aggregation.
//!
//! Grounded on `worker::pool::WorkerPool`'s `bounded(100)` result channel,
//! generalized from "any match" to "only a score that strictly improves on
//! the best seen across every device" via a single CAS-gated `best_score`.

use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::crypto::{Address, SeedKey};
use crate::device::GpuResult;

/// A published, already-verified-monotone hit.
#[derive(Debug, Clone)]
pub struct Hit {
    pub round: u64,
    pub offset: u64,
    pub score: u32,
    pub address: Address,
    /// `None` when the seed key was supplied as a bare public key (no
    /// private scalar to reconstruct from).
    pub private_key: Option<[u8; 32]>,
    pub device_label: String,
}

/// Owns the shared best-score and the hit channel every
/// [`crate::round::RoundDriver`] publishes into.
pub struct ResultAggregator {
    best_score: AtomicU32,
    sender: Sender<Hit>,
    seed: SeedKey,
}

impl ResultAggregator {
    /// Creates a fresh aggregator (best score starts at 0, i.e. any scored
    /// hit improves on it) and its hit receiver.
    pub fn new(seed: SeedKey) -> (Self, Receiver<Hit>) {
        let (sender, receiver) = bounded(100);
        (
            Self {
                best_score: AtomicU32::new(0),
                sender,
                seed,
            },
            receiver,
        )
    }

    /// The current best score, read before each round so devices only
    /// report further improvements.
    pub fn best_score(&self) -> u32 {
        self.best_score.load(Ordering::Acquire)
    }

    /// Accepts a GPU result if (and only if) it strictly improves on the
    /// current best score, via compare-and-swap. Devices that lose the
    /// race against a concurrently-published better score are silently
    /// dropped rather than retried, since by then they're no longer an
    /// improvement.
    ///
    /// `result.round`/`result.offset`, not a caller-supplied round index,
    /// label the published [`Hit`] — the score kernel stamps both into the
    /// record itself, and that is the only label guaranteed to match the
    /// candidate it actually scored.
    pub fn publish(&self, result: GpuResult, device_label: &str) {
        loop {
            let current = self.best_score.load(Ordering::Acquire);
            if result.score <= current {
                return;
            }
            match self.best_score.compare_exchange(
                current,
                result.score,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(_) => continue,
            }
        }

        let offset_scalar = offset_to_scalar(result.offset);
        let private_key = self.seed.private_key_for_offset(&offset_scalar);
        let address = Address::from_bytes(result.address);

        let hit = Hit {
            round: result.round,
            offset: result.offset,
            score: result.score,
            address,
            private_key,
            device_label: device_label.to_string(),
        };

        // the channel is bounded; a full channel means the consumer isn't
        // keeping up. Don't block a GPU round driver on that, drop instead.
        let _ = self.sender.try_send(hit);
    }
}

fn offset_to_scalar(offset: u64) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&offset.to_be_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(round: u64, score: u32) -> GpuResult {
        GpuResult {
            round,
            offset: 1,
            score,
            address: [0u8; 20],
        }
    }

    #[test]
    fn first_hit_always_publishes() {
        let (aggregator, rx) = ResultAggregator::new(SeedKey::generate());
        aggregator.publish(result(0, 10), "dev0");
        assert_eq!(aggregator.best_score(), 10);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn equal_or_lower_score_is_dropped() {
        let (aggregator, rx) = ResultAggregator::new(SeedKey::generate());
        aggregator.publish(result(0, 10), "dev0");
        let _ = rx.try_recv();

        aggregator.publish(result(1, 10), "dev0");
        aggregator.publish(result(2, 5), "dev0");
        assert_eq!(aggregator.best_score(), 10);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn strictly_higher_score_replaces_best() {
        let (aggregator, rx) = ResultAggregator::new(SeedKey::generate());
        aggregator.publish(result(0, 10), "dev0");
        let _ = rx.try_recv();

        aggregator.publish(result(1, 11), "dev1");
        assert_eq!(aggregator.best_score(), 11);
        let hit = rx.try_recv().unwrap();
        assert_eq!(hit.score, 11);
        assert_eq!(hit.device_label, "dev1");
    }

    #[test]
    fn hit_round_comes_from_the_gpu_result_not_a_caller_label() {
        let (aggregator, rx) = ResultAggregator::new(SeedKey::generate());
        aggregator.publish(result(7, 10), "dev0");
        let hit = rx.try_recv().unwrap();
        assert_eq!(hit.round, 7);
    }

    #[test]
    fn bare_public_key_seed_yields_no_private_key() {
        use secp256k1::{PublicKey, Secp256k1, SecretKey};

        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&[3u8; 32]).unwrap();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        let hex_coords = hex::encode(&public_key.serialize_uncompressed()[1..]);
        let seed = SeedKey::from_public_hex(&hex_coords).unwrap();

        let (aggregator, rx) = ResultAggregator::new(seed);
        aggregator.publish(result(0, 1), "dev0");
        let hit = rx.try_recv().unwrap();
        assert!(hit.private_key.is_none());
    }

    #[test]
    fn generated_seed_yields_reconstructable_private_key() {
        let (aggregator, rx) = ResultAggregator::new(SeedKey::generate());
        aggregator.publish(result(0, 1), "dev0");
        let hit = rx.try_recv().unwrap();
        assert!(hit.private_key.is_some());
    }
}
