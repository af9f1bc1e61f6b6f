//! # Random Streams
//!
//! Deterministic pseudorandom generators for jobs. A job holds its stream
//! through a [`SharedRandom`] slot so nested jobs can draw from the same
//! stream and so a scope can swap the slot out and put the exact same
//! reference back afterwards.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cell::RefCell;
use std::rc::Rc;

/// A job's random stream slot
pub type SharedRandom = Rc<RefCell<RandomStream>>;

/// Deterministic random stream.
///
/// Cloning yields an independent stream whose future draws are identical to
/// the source's future draws as of the clone; the source is not advanced.
#[derive(Debug, Clone)]
pub struct RandomStream {
    inner: ChaCha8Rng,
}

impl RandomStream {
    /// Create a stream from a seed
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Create a stream already wrapped in a job slot
    pub fn shared(seed: u64) -> SharedRandom {
        Rc::new(RefCell::new(Self::new(seed)))
    }

    /// Wrap this stream in a fresh slot
    pub fn into_shared(self) -> SharedRandom {
        Rc::new(RefCell::new(self))
    }

    /// Uniform integer in `[0, bound)`; `bound` of zero yields zero
    pub fn next_int(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.inner.gen_range(0..bound)
    }

    /// Uniform float in `[0, 1)`
    pub fn next_double(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }
}

impl RngCore for RandomStream {
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

/// Temporarily replaces a job's random slot.
///
/// The saved reference is put back when the scope is dropped, which happens
/// on normal exit, on `?` propagation and while unwinding a panic.
pub struct RandomScope<'a> {
    slot: &'a mut SharedRandom,
    saved: Option<SharedRandom>,
}

impl<'a> RandomScope<'a> {
    /// Swap `replacement` into `slot` until the scope ends
    pub fn enter(slot: &'a mut SharedRandom, replacement: SharedRandom) -> Self {
        let saved = std::mem::replace(slot, replacement);
        Self {
            slot,
            saved: Some(saved),
        }
    }

    /// The stream in effect inside the scope
    pub fn current(&self) -> &SharedRandom {
        self.slot
    }
}

impl Drop for RandomScope<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *self.slot = saved;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_draws() {
        let mut a = RandomStream::new(42);
        let mut b = RandomStream::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_int(1000), b.next_int(1000));
        }
    }

    #[test]
    fn test_clone_does_not_advance_source() {
        let mut source = RandomStream::new(7);
        source.next_double();

        let mut copy = source.clone();
        let from_copy: Vec<u64> = (0..8).map(|_| copy.next_int(100)).collect();
        let from_source: Vec<u64> = (0..8).map(|_| source.next_int(100)).collect();
        assert_eq!(from_copy, from_source);
    }

    #[test]
    fn test_next_int_bounds() {
        let mut rng = RandomStream::new(1);
        assert_eq!(rng.next_int(0), 0);
        for _ in 0..100 {
            assert!(rng.next_int(5) < 5);
            let d = rng.next_double();
            assert!((0.0..1.0).contains(&d));
        }
    }

    #[test]
    fn test_scope_restores_exact_reference() {
        let original = RandomStream::shared(3);
        let mut slot = Rc::clone(&original);
        {
            let scope = RandomScope::enter(&mut slot, RandomStream::shared(9));
            assert!(!Rc::ptr_eq(scope.current(), &original));
        }
        assert!(Rc::ptr_eq(&slot, &original));
    }

    #[test]
    fn test_scope_restores_on_panic() {
        let original = RandomStream::shared(3);
        let mut slot = Rc::clone(&original);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = RandomScope::enter(&mut slot, RandomStream::shared(9));
            panic!("nested job blew up");
        }));
        assert!(result.is_err());
        assert!(Rc::ptr_eq(&slot, &original));
    }
}
