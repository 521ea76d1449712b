//! GPU-visible resources owned by the scene.
//!
//! These are CPU-side descriptions; a `RenderBackend` turns them into real
//! GPU objects on the render thread.

use std::collections::HashMap;

use glam::{DVec3, Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use crate::identity::{SimpleIdentity, EMPTY_IDENTITY};

/// Pixel layout of texture data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
  Rgba8,
  Rgb8,
  Luminance8,
}

impl TextureFormat {
  #[inline]
  pub fn bytes_per_pixel(&self) -> usize {
    match self {
      TextureFormat::Rgba8 => 4,
      TextureFormat::Rgb8 => 3,
      TextureFormat::Luminance8 => 1,
    }
  }
}

/// Texture image data.
#[derive(Clone)]
pub struct Texture {
  pub id: SimpleIdentity,
  pub name: String,
  pub width: u32,
  pub height: u32,
  pub format: TextureFormat,
  pub data: Vec<u8>,
}

impl Texture {
  /// Create a texture with a fresh identity.
  pub fn new(name: impl Into<String>, width: u32, height: u32, format: TextureFormat, data: Vec<u8>) -> Self {
    Self {
      id: SimpleIdentity::generate(),
      name: name.into(),
      width,
      height,
      format,
      data,
    }
  }

  /// True when `data` holds exactly `width * height` pixels.
  pub fn is_complete(&self) -> bool {
    self.data.len() == self.width as usize * self.height as usize * self.format.bytes_per_pixel()
  }
}

impl std::fmt::Debug for Texture {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Texture")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("width", &self.width)
      .field("height", &self.height)
      .field("format", &self.format)
      .field("bytes", &self.data.len())
      .finish()
  }
}

/// Indexed triangle geometry with its render state.
///
/// Positions are `f32` offsets from `center` so tiles deep in the tree keep
/// their precision.
#[derive(Clone)]
pub struct Drawable {
  pub id: SimpleIdentity,
  pub name: String,
  /// Display-space origin of `positions`.
  pub center: DVec3,
  pub positions: Vec<Vec3>,
  pub tex_coords: Vec<Vec2>,
  pub indices: Vec<u32>,
  pub texture_ids: SmallVec<[SimpleIdentity; 2]>,
  pub program_id: SimpleIdentity,
  pub color: Vec4,
  pub draw_priority: i32,
  pub enabled: bool,
}

impl Drawable {
  /// Empty drawable with a fresh identity.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      id: SimpleIdentity::generate(),
      name: name.into(),
      center: DVec3::ZERO,
      positions: Vec::new(),
      tex_coords: Vec::new(),
      indices: Vec::new(),
      texture_ids: SmallVec::new(),
      program_id: EMPTY_IDENTITY,
      color: Vec4::ONE,
      draw_priority: 0,
      enabled: true,
    }
  }

  #[inline]
  pub fn vertex_count(&self) -> usize {
    self.positions.len()
  }

  #[inline]
  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }
}

impl std::fmt::Debug for Drawable {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Drawable")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("vertex_count", &self.vertex_count())
      .field("triangle_count", &self.triangle_count())
      .field("texture_ids", &self.texture_ids)
      .field("draw_priority", &self.draw_priority)
      .field("enabled", &self.enabled)
      .finish()
  }
}

/// Shader uniform value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
  Int(i32),
  Float(f32),
  Vec2(Vec2),
  Vec3(Vec3),
  Vec4(Vec4),
}

/// Shader program with its uniform state.
#[derive(Clone, Debug)]
pub struct Program {
  pub id: SimpleIdentity,
  pub name: String,
  pub uniforms: HashMap<String, UniformValue>,
}

impl Program {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      id: SimpleIdentity::generate(),
      name: name.into(),
      uniforms: HashMap::new(),
    }
  }
}

/// Offscreen render target.
#[derive(Clone, Debug)]
pub struct RenderTarget {
  pub id: SimpleIdentity,
  pub width: u32,
  pub height: u32,
  pub clear_color: Vec4,
}

impl RenderTarget {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      id: SimpleIdentity::generate(),
      width,
      height,
      clear_color: Vec4::ZERO,
    }
  }
}
