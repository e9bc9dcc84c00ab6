//! Deterministic randomness for command handlers.
//!
//! Randomness is only ever consumed while a command is being turned into
//! events; the reducer never sees an RNG. Each command gets a stream
//! derived from the match seed and the state revision it was issued
//! against, so the same command against the same state always rolls the
//! same dice. The rolled values end up inside events, which is what makes
//! replay independent of the RNG entirely.
//!
//! ```
//! use tabletop_engine::core::GameRng;
//!
//! let mut a = GameRng::for_revision(42, 7);
//! let mut b = GameRng::for_revision(42, 7);
//! assert_eq!(a.roll_die(6), b.roll_die(6));
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// ChaCha8 stream scoped to one command.
#[derive(Clone, Debug)]
pub struct GameRng {
    inner: ChaCha8Rng,
}

impl GameRng {
    /// Create an RNG with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// The stream for a command processed at `revision` of a match seeded
    /// with `match_seed`.
    #[must_use]
    pub fn for_revision(match_seed: u64, revision: u64) -> Self {
        Self::new(mix(match_seed ^ mix(revision.wrapping_add(1))))
    }

    /// Roll a die with `sides` faces, returning `1..=sides`.
    pub fn roll_die(&mut self, sides: u32) -> u32 {
        self.inner.gen_range(1..=sides.max(1))
    }
}

/// splitmix64 finalizer.
const fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
