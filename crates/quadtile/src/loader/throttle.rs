//! Parse throttle - bounds how many interpretations run at once.
//!
//! A counting semaphore that never blocks: the loader asks for a permit and
//! leaves work queued when none is free. The permit travels into the rayon
//! job and releases on drop, so a panicking interpreter still frees its slot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ParseThrottle {
  max: usize,
  in_flight: Arc<AtomicUsize>,
}

impl ParseThrottle {
  /// `max` of 0 is treated as 1.
  pub fn new(max: usize) -> Self {
    Self {
      max: max.max(1),
      in_flight: Arc::new(AtomicUsize::new(0)),
    }
  }

  pub fn try_acquire(&self) -> Option<ParsePermit> {
    self
      .in_flight
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < self.max).then_some(n + 1))
      .ok()
      .map(|_| ParsePermit {
        in_flight: self.in_flight.clone(),
      })
  }

  pub fn in_flight(&self) -> usize {
    self.in_flight.load(Ordering::Acquire)
  }

  pub fn max(&self) -> usize {
    self.max
  }
}

/// One interpretation slot.
#[derive(Debug)]
pub struct ParsePermit {
  in_flight: Arc<AtomicUsize>,
}

impl Drop for ParsePermit {
  fn drop(&mut self) {
    self.in_flight.fetch_sub(1, Ordering::AcqRel);
  }
}
