//! SimpleIdentity - opaque 64-bit handles for scene resources.
//!
//! Every drawable, texture, program, render target and component object is
//! addressed by a `SimpleIdentity`. Identities come from one process-wide
//! counter and are never handed out twice, so a stale identity can only ever
//! miss a lookup, never alias a newer resource.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counter for generating unique identities. 0 is reserved.
static IDENTITY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque resource identifier.
///
/// Generated atomically - guaranteed unique within process lifetime.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct SimpleIdentity(u64);

/// The identity that never names a resource.
pub const EMPTY_IDENTITY: SimpleIdentity = SimpleIdentity(0);

impl SimpleIdentity {
  /// Generate a new unique identity.
  pub fn generate() -> Self {
    Self(IDENTITY_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  /// Get the raw ID value.
  pub fn raw(&self) -> u64 {
    self.0
  }

  /// True for [`EMPTY_IDENTITY`].
  pub fn is_empty(&self) -> bool {
    self.0 == 0
  }
}

impl std::fmt::Display for SimpleIdentity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;

  #[test]
  fn identities_are_unique() {
    let a = SimpleIdentity::generate();
    let b = SimpleIdentity::generate();
    let c = SimpleIdentity::generate();

    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_ne!(a, c);
    assert!(!a.is_empty());
  }

  #[test]
  fn identities_increase_monotonically() {
    let a = SimpleIdentity::generate();
    let b = SimpleIdentity::generate();
    assert!(b > a);
  }

  #[test]
  fn identities_unique_across_threads() {
    let ids: Vec<SimpleIdentity> = std::thread::scope(|s| {
      let handles: Vec<_> = (0..4)
        .map(|_| s.spawn(|| (0..1000).map(|_| SimpleIdentity::generate()).collect::<Vec<_>>()))
        .collect();
      handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect()
    });

    let unique: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
  }

  #[test]
  fn empty_identity_is_reserved() {
    assert!(EMPTY_IDENTITY.is_empty());
    assert_eq!(EMPTY_IDENTITY.raw(), 0);
  }
}
