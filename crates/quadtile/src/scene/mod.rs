//! Scene module - resource tables and the change request queue.
//!
//! ```text
//!  worker threads                      render thread
//!  ──────────────                      ─────────────
//!  build ChangeSet ──► add_change_requests ──► pending queue
//!                                               │
//!                           process_frame ◄─────┘
//!                             1. pre-execute requests (resource setup)
//!                             2. active models
//!                             3. remaining ready requests, enqueue order
//! ```
//!
//! # Module Structure
//!
//! - [`change`]: `ChangeRequest` trait, `ChangeSet` and the built-in requests
//! - [`tables`]: `Scene` - per-category resource tables and the pending queue
//! - [`resources`]: textures, drawables, programs, render targets
//! - [`render`]: `RenderBackend` GPU hooks and `NullRenderer`
//! - [`manager`]: named scene managers, `ComponentManager`
//! - [`active_model`]: per-frame hooks

pub mod active_model;
pub mod change;
pub mod manager;
pub mod render;
pub mod resources;
pub mod tables;

// Re-exports
pub use active_model::ActiveModel;
pub use change::{
  AddDrawableReq, AddProgramReq, AddRenderTargetReq, AddTextureReq, ChangeRequest, ChangeSet, DelayedReq,
  DrawPriorityReq, OnOffDrawableReq, RemDrawableReq, RemProgramReq, RemRenderTargetReq, RemTextureReq,
  SetUniformReq,
};
pub use manager::{ComponentManager, ComponentObject, SceneManager, COMPONENT_MANAGER};
pub use render::{NullRenderer, RenderBackend};
pub use resources::{Drawable, Program, RenderTarget, Texture, TextureFormat, UniformValue};
pub use tables::Scene;
