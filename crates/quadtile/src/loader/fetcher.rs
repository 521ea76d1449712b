//! Tile fetcher contract.
//!
//! The loader hands out `TileFetchRequest`s; the fetcher does the I/O on
//! whatever threads it likes and completes each request through its
//! `FetchResponder`. Results travel back over a channel the loader drains in
//! its tick, so no fetcher thread ever touches loader or scene state.
//!
//! ```text
//! loader ── start_tile_fetches ──► fetcher ──► I/O
//!   ▲                                           │
//!   └──── channel ◄── FetchResponder::finish ◄──┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::Sender;

use super::frame::QuadFrameInfo;
use crate::error::FetchError;
use crate::quadtree::QuadTreeIdentifier;

static FETCH_TICKET_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Handle for one fetch, unique within the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct FetchTicket(u64);

impl FetchTicket {
  pub(crate) fn next() -> Self {
    Self(FETCH_TICKET_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  pub fn raw(&self) -> u64 {
    self.0
  }
}

/// Where to get one tile frame from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchInfo {
  pub url: String,
}

impl FetchInfo {
  pub fn new(url: impl Into<String>) -> Self {
    Self { url: url.into() }
  }
}

/// Outcome of one fetch, as the loader receives it.
#[derive(Debug)]
pub(crate) struct FetchResult {
  pub ticket: FetchTicket,
  pub ident: QuadTreeIdentifier,
  pub frame: QuadFrameInfo,
  pub generation: u64,
  pub result: Result<Vec<u8>, FetchError>,
}

/// Completion handle for one fetch.
///
/// Dropping it without calling `finish` reports `FetchError::Cancelled`.
pub struct FetchResponder {
  ticket: FetchTicket,
  ident: QuadTreeIdentifier,
  frame: QuadFrameInfo,
  generation: u64,
  sender: Option<Sender<FetchResult>>,
}

impl FetchResponder {
  pub(crate) fn new(
    ticket: FetchTicket,
    ident: QuadTreeIdentifier,
    frame: QuadFrameInfo,
    generation: u64,
    sender: Sender<FetchResult>,
  ) -> Self {
    Self {
      ticket,
      ident,
      frame,
      generation,
      sender: Some(sender),
    }
  }

  pub fn ticket(&self) -> FetchTicket {
    self.ticket
  }

  pub fn ident(&self) -> QuadTreeIdentifier {
    self.ident
  }

  pub fn frame(&self) -> QuadFrameInfo {
    self.frame
  }

  /// Report the fetched bytes or the failure.
  pub fn finish(mut self, result: Result<Vec<u8>, FetchError>) {
    self.send(result);
  }

  fn send(&mut self, result: Result<Vec<u8>, FetchError>) {
    let Some(sender) = self.sender.take() else {
      return;
    };
    // Receiver gone means the loader was dropped; nothing left to tell.
    let _ = sender.send(FetchResult {
      ticket: self.ticket,
      ident: self.ident,
      frame: self.frame,
      generation: self.generation,
      result,
    });
  }
}

impl Drop for FetchResponder {
  fn drop(&mut self) {
    self.send(Err(FetchError::Cancelled));
  }
}

impl std::fmt::Debug for FetchResponder {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FetchResponder")
      .field("ticket", &self.ticket)
      .field("ident", &self.ident)
      .field("frame", &self.frame)
      .field("generation", &self.generation)
      .field("finished", &self.sender.is_none())
      .finish()
  }
}

/// One frame of one tile to fetch.
#[derive(Debug)]
pub struct TileFetchRequest {
  pub ticket: FetchTicket,
  pub ident: QuadTreeIdentifier,
  pub frame: QuadFrameInfo,
  /// Higher first. Coarser levels outrank finer ones.
  pub priority: i32,
  /// Tie-break within a priority, higher first.
  pub importance: f64,
  pub info: FetchInfo,
  pub responder: FetchResponder,
}

/// Network or disk I/O for tile data.
///
/// Timeouts and retry with backoff belong to the implementation; the loader
/// only reacts to success, failure and cancellation.
pub trait TileFetcher: Send {
  fn start_tile_fetches(&mut self, requests: Vec<TileFetchRequest>);

  /// Best effort. A cancelled fetch may still complete; the loader drops
  /// the result.
  fn cancel_tile_fetches(&mut self, tickets: &[FetchTicket]);

  /// New `(priority, importance)` for fetches still queued.
  fn update_priorities(&mut self, _updates: &[(FetchTicket, i32, f64)]) {}
}
