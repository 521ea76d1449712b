//! Tile loading: fetch, interpret, merge.
//!
//! # Module Structure
//!
//! - [`loader`]: `QuadTileLoader` - per-tile frame state machine and merge
//! - [`fetcher`]: `TileFetcher` contract, requests and responders
//! - [`source`]: `TileInfoSource`, `UrlTemplateSource`
//! - [`interpreter`]: `LoaderInterpreter`, `ImageInterpreter`
//! - [`loader_return`]: `QuadLoaderReturn` handoff parcel
//! - [`frame`]: frame slots and `FrameStats`
//! - [`throttle`]: bounded parse concurrency

pub mod fetcher;
pub mod frame;
pub mod interpreter;
#[allow(clippy::module_inception)]
pub mod loader;
pub mod loader_return;
pub mod source;
pub mod throttle;

// Re-exports
pub use fetcher::{FetchInfo, FetchResponder, FetchTicket, TileFetchRequest, TileFetcher};
pub use frame::{FrameStat, FrameState, FrameStats, QuadFrameInfo};
pub use interpreter::{ImageInterpreter, LoaderData, LoaderInterpreter};
pub use loader::{LoaderConfig, LoaderStats, QuadTileLoader};
pub use loader_return::QuadLoaderReturn;
pub use source::{TileInfoSource, UrlTemplateSource};
pub use throttle::{ParsePermit, ParseThrottle};
