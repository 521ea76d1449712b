//! Synthetic tile server.
//!
//! Each fetch runs on rayon, sleeps for the configured latency and answers
//! with a small PNG whose colour is derived from the tile URL.

use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use quadtile::loader::{FetchTicket, TileFetchRequest, TileFetcher};
use quadtile::FetchError;

use crate::config::SourceConfig;

#[derive(Debug, Default)]
pub struct FetchCounters {
  pub served: AtomicU64,
  pub failed: AtomicU64,
  pub cancelled: AtomicU64,
}

pub struct SyntheticFetcher {
  tile_size: u32,
  latency: Duration,
  fail_every: u64,
  started: u64,
  cancelled: Arc<Mutex<HashSet<FetchTicket>>>,
  counters: Arc<FetchCounters>,
}

impl SyntheticFetcher {
  pub fn new(config: &SourceConfig) -> Self {
    Self {
      tile_size: config.tile_size,
      latency: Duration::from_millis(config.latency_ms),
      fail_every: config.fail_every,
      started: 0,
      cancelled: Arc::new(Mutex::new(HashSet::new())),
      counters: Arc::new(FetchCounters::default()),
    }
  }

  pub fn counters(&self) -> Arc<FetchCounters> {
    self.counters.clone()
  }
}

impl TileFetcher for SyntheticFetcher {
  fn start_tile_fetches(&mut self, requests: Vec<TileFetchRequest>) {
    for request in requests {
      self.started += 1;
      let fail = self.fail_every > 0 && self.started % self.fail_every == 0;
      let tile_size = self.tile_size;
      let latency = self.latency;
      let cancelled = self.cancelled.clone();
      let counters = self.counters.clone();

      rayon::spawn(move || {
        std::thread::sleep(latency);
        let was_cancelled = cancelled
          .lock()
          .unwrap_or_else(PoisonError::into_inner)
          .remove(&request.ticket);
        if was_cancelled {
          counters.cancelled.fetch_add(1, Ordering::Relaxed);
          request.responder.finish(Err(FetchError::Cancelled));
          return;
        }
        if fail {
          counters.failed.fetch_add(1, Ordering::Relaxed);
          request
            .responder
            .finish(Err(FetchError::Io(format!("synthetic failure for {}", request.info.url))));
          return;
        }
        let result = render_tile(&request.info.url, tile_size);
        if result.is_ok() {
          counters.served.fetch_add(1, Ordering::Relaxed);
        }
        request.responder.finish(result);
      });
    }
  }

  fn cancel_tile_fetches(&mut self, tickets: &[FetchTicket]) {
    self
      .cancelled
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .extend(tickets.iter().copied());
  }
}

/// Solid tile with a one-pixel dark border, tinted by the URL hash.
fn render_tile(url: &str, size: u32) -> Result<Vec<u8>, FetchError> {
  let mut hasher = DefaultHasher::new();
  url.hash(&mut hasher);
  let [r, g, b, ..] = hasher.finish().to_le_bytes();

  let image = image::RgbaImage::from_fn(size, size, |x, y| {
    let border = x == 0 || y == 0 || x + 1 == size || y + 1 == size;
    if border {
      image::Rgba([16, 16, 16, 255])
    } else {
      image::Rgba([r, g, b, 255])
    }
  });

  let mut bytes = Vec::new();
  image
    .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
    .map_err(|err| FetchError::Other(err.to_string()))?;
  Ok(bytes)
}
