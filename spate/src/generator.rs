use rand::distributions::Alphanumeric;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use spate_core::SyntheticRequest;
use std::time::{SystemTime, UNIX_EPOCH};

const SUFFIX_LEN: usize = 12;

/// Lazily produces the synthetic users for one run, one per pull.
///
/// The sequence is finite and strictly index-ordered; a pulled request is
/// never produced again. Email uniqueness composes the run start timestamp,
/// the process id, the sequence index and a random suffix, so repeated runs
/// against a store with a unique-email constraint stay collision-free.
pub struct RequestGenerator {
    produced: u64,
    total: u64,
    start_millis: u64,
    process_id: u32,
    rng: SmallRng,
}

impl RequestGenerator {
    pub fn new(total: u64) -> Self {
        let start_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0);
        Self::with_context(total, start_millis, std::process::id(), SmallRng::from_entropy())
    }

    /// All entropy sources injected, for deterministic sequences in tests.
    pub(crate) fn with_context(total: u64, start_millis: u64, process_id: u32, rng: SmallRng) -> Self {
        Self {
            produced: 0,
            total,
            start_millis,
            process_id,
            rng,
        }
    }

    fn suffix(&mut self) -> String {
        (&mut self.rng)
            .sample_iter(Alphanumeric)
            .take(SUFFIX_LEN)
            .map(|byte| (byte as char).to_ascii_lowercase())
            .collect()
    }
}

impl Iterator for RequestGenerator {
    type Item = SyntheticRequest;

    fn next(&mut self) -> Option<SyntheticRequest> {
        if self.produced >= self.total {
            return None;
        }
        self.produced += 1;
        let index = self.produced;

        let suffix = self.suffix();
        let unique = format!(
            "{}-{}-{}-{}",
            self.start_millis, self.process_id, index, suffix
        );
        Some(SyntheticRequest {
            index,
            name: format!("Test User {unique}"),
            email: format!("test{unique}@example.com"),
            age: self.rng.gen_range(1..=100),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total - self.produced) as usize;
        (remaining, Some(remaining))
    }
}
