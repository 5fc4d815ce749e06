//! The `split_rng` module provides a splittable pseudo-random stream for
//! deterministic fork/join shuffling.
//!
//! `SplitRng` is a splitmix64 generator carrying a per-stream gamma (odd
//! increment). Drawing advances the state by the gamma and mixes it; splitting
//! derives a child (seed, gamma) pair from the parent state alone, with no
//! shared mutable state and no locking. A stream handed to a forked task is
//! therefore a pure function of the recursion path that produced it, never of
//! the thread that happens to run it. Not cryptographically secure.

use rand::{Error, RngCore};

// First 64 bits of the golden ratio fraction; the default stream increment.
const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Clone, Debug)]
pub struct SplitRng {
    seed: u64,
    gamma: u64,
}

impl SplitRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            gamma: GOLDEN_GAMMA,
        }
    }

    fn next_seed(&mut self) -> u64 {
        self.seed = self.seed.wrapping_add(self.gamma);
        self.seed
    }

    /// Forks an independent child stream.
    ///
    /// The parent advances past the two values consumed here, so the child
    /// shares no future state with it. Splitting is deterministic: the same
    /// parent state always yields the same child.
    pub fn split(&mut self) -> Self {
        let seed = mix64(self.next_seed());
        let gamma = mix_gamma(self.next_seed());
        Self { seed, gamma }
    }
}

impl RngCore for SplitRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        mix64(self.next_seed())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

// Stafford variant 13 finalizer.
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// Murmur3 finalizer, then force the result odd and require enough 01/10 bit
// transitions for the increment to cover the state space well.
fn mix_gamma(mut z: u64) -> u64 {
    z = (z ^ (z >> 33)).wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    z = (z ^ (z >> 33)).wrapping_mul(0xC4CE_B9FE_1A85_EC53);
    z = (z ^ (z >> 33)) | 1;
    if (z ^ (z >> 1)).count_ones() < 24 {
        z ^ 0xAAAA_AAAA_AAAA_AAAA
    } else {
        z
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rand::Rng, std::iter::repeat_with};

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = SplitRng::new(42);
        let mut b = SplitRng::new(42);
        let xs: Vec<u64> = repeat_with(|| a.next_u64()).take(32).collect();
        let ys: Vec<u64> = repeat_with(|| b.next_u64()).take(32).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_distinct_seeds_distinct_streams() {
        let mut a = SplitRng::new(42);
        let mut b = SplitRng::new(7);
        let xs: Vec<u64> = repeat_with(|| a.next_u64()).take(8).collect();
        let ys: Vec<u64> = repeat_with(|| b.next_u64()).take(8).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn test_split_is_deterministic() {
        let mut a = SplitRng::new(123);
        let mut b = SplitRng::new(123);
        let mut left_a = a.split();
        let mut left_b = b.split();
        let mut right_a = a.split();
        let mut right_b = b.split();
        for _ in 0..16 {
            assert_eq!(left_a.next_u64(), left_b.next_u64());
            assert_eq!(right_a.next_u64(), right_b.next_u64());
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_split_streams_diverge() {
        let mut parent = SplitRng::new(99);
        let mut left = parent.split();
        let mut right = parent.split();
        let ls: Vec<u64> = repeat_with(|| left.next_u64()).take(8).collect();
        let rs: Vec<u64> = repeat_with(|| right.next_u64()).take(8).collect();
        let ps: Vec<u64> = repeat_with(|| parent.next_u64()).take(8).collect();
        assert_ne!(ls, rs);
        assert_ne!(ls, ps);
        assert_ne!(rs, ps);
    }

    #[test]
    fn test_bounded_draws_stay_in_range() {
        let mut rng = SplitRng::new(1);
        for bound in [1usize, 2, 3, 10, 1000] {
            for _ in 0..100 {
                assert!(rng.gen_range(0..bound) < bound);
            }
        }
    }

    #[test]
    fn test_fill_bytes_deterministic() {
        let mut a = SplitRng::new(5);
        let mut b = SplitRng::new(5);
        // Lengths straddling the 8-byte chunking.
        for len in [0usize, 1, 7, 8, 9, 31] {
            let mut xs = vec![0u8; len];
            let mut ys = vec![0u8; len];
            a.fill_bytes(&mut xs);
            b.fill_bytes(&mut ys);
            assert_eq!(xs, ys);
        }
    }

    #[test]
    fn test_gamma_is_always_odd() {
        for z in (0..1000u64).chain([u64::MAX, u64::MAX / 2]) {
            assert_eq!(mix_gamma(z) & 1, 1);
        }
    }
}
