//! Seedable RNG used for tile spawning.
//!
//! Sessions own a `TileRng` so that a given seed always produces the same
//! sequence of spawned tiles. Production sessions seed from OS entropy.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic RNG backing tile spawns.
#[derive(Clone, Debug)]
pub struct TileRng {
    inner: ChaCha8Rng,
    seed: u64,
}

impl TileRng {
    /// Create an RNG with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Create an RNG seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// Derive an independent RNG for the next session.
    ///
    /// The derived seed depends only on this RNG's seed and position, so a
    /// seeded manager produces the same sequence of sessions every run.
    #[must_use]
    pub fn derive(&mut self) -> Self {
        Self::new(self.inner.next_u64())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RngCore for TileRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}
