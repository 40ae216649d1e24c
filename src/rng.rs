//! SplitMix64 generators. Deterministic for a given seed; not cryptographically secure.
//!
//! [`Rng`] is the plain single-owner generator used by the host simulation.
//! [`SharedRng`] advances its state with one atomic add so pool readers can draw
//! random picks through `&self` without taking a lock.

use std::sync::atomic::{AtomicU64, Ordering};

const SPLITMIX64_GOLDEN: u64 = 0x9e3779b97f4a7c15;
const SPLITMIX64_M1: u64 = 0xbf58476d1ce4e5b9;
const SPLITMIX64_M2: u64 = 0x94d049bb133111eb;

#[inline]
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(SPLITMIX64_M1);
    z = (z ^ (z >> 27)).wrapping_mul(SPLITMIX64_M2);
    z ^ (z >> 31)
}

/// Seed from the OS, falling back to the clock when the OS source is unavailable.
pub fn entropy_seed() -> u64 {
    let mut buf = [0_u8; 8];
    match getrandom::getrandom(&mut buf) {
        Ok(()) => u64::from_le_bytes(buf),
        Err(err) => {
            tracing::warn!(%err, "os entropy unavailable, seeding from clock");
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos() as u64)
                .unwrap_or(SPLITMIX64_GOLDEN)
        }
    }
}

/// Map a 64-bit draw onto `0..n`. `n` must be non-zero.
#[inline]
fn bounded(draw: u64, n: usize) -> usize {
    ((draw as u128 * n as u128) >> 64) as usize
}

#[inline]
fn unit(draw: u64) -> f64 {
    (draw >> 11) as f64 / (1_u64 << 53) as f64
}

#[derive(Debug, Clone, Copy)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(SPLITMIX64_GOLDEN);
        mix(self.state)
    }

    /// Uniform index in `0..n`, or None when `n == 0`.
    pub fn below(&mut self, n: usize) -> Option<usize> {
        (n > 0).then(|| bounded(self.next_u64(), n))
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        unit(self.next_u64())
    }

    /// Uniform in `[lo, hi)`.
    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

#[derive(Debug)]
pub struct SharedRng {
    state: AtomicU64,
}

impl SharedRng {
    pub fn new(seed: u64) -> Self {
        Self {
            state: AtomicU64::new(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(entropy_seed())
    }

    #[inline]
    pub fn next_u64(&self) -> u64 {
        let previous = self.state.fetch_add(SPLITMIX64_GOLDEN, Ordering::Relaxed);
        mix(previous.wrapping_add(SPLITMIX64_GOLDEN))
    }

    pub fn below(&self, n: usize) -> Option<usize> {
        (n > 0).then(|| bounded(self.next_u64(), n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitmix64_deterministic() {
        let mut a = Rng::new(7);
        let mut b = Rng::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn shared_and_plain_produce_same_sequence() {
        let mut plain = Rng::new(99);
        let shared = SharedRng::new(99);
        for _ in 0..50 {
            assert_eq!(plain.next_u64(), shared.next_u64());
        }
    }

    #[test]
    fn below_stays_in_range() {
        let mut rng = Rng::new(3);
        assert_eq!(rng.below(0), None);
        for _ in 0..1000 {
            let pick = rng.below(7).unwrap();
            assert!(pick < 7);
        }
        let shared = SharedRng::new(5);
        for _ in 0..1000 {
            assert!(shared.below(3).unwrap() < 3);
        }
    }

    #[test]
    fn next_f64_is_unit_interval() {
        let mut rng = Rng::new(11);
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }
}
