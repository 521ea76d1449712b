//! Interpreters turn fetched bytes into scene content for one tile frame.
//!
//! They run on rayon workers, never on the loader thread, and only fill in a
//! `QuadLoaderReturn`. The loader decides later whether it gets merged.

use std::sync::Arc;

use super::frame::QuadFrameInfo;
use super::loader_return::QuadLoaderReturn;
use crate::builder::{build_tile_mesh, MeshSettings};
use crate::coord::DisplaySurface;
use crate::error::{QuadTileError, Result};
use crate::identity::{SimpleIdentity, EMPTY_IDENTITY};
use crate::quadtree::{EdgeMatch, QuadTreeIdentifier, SamplingParams};
use crate::scene::{AddDrawableReq, ComponentObject, Texture, TextureFormat};

/// Everything an interpreter needs to know about one fetched tile frame.
#[derive(Clone)]
pub struct LoaderData {
  pub ident: QuadTreeIdentifier,
  pub frame: QuadFrameInfo,
  pub bytes: Vec<u8>,
  pub params: Arc<SamplingParams>,
  pub display: DisplaySurface,
  pub edges: EdgeMatch,
  /// Whether this frame is the one currently shown.
  pub enabled: bool,
  pub draw_priority: i32,
  pub flip_y: bool,
}

impl std::fmt::Debug for LoaderData {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LoaderData")
      .field("ident", &self.ident)
      .field("frame", &self.frame)
      .field("bytes", &self.bytes.len())
      .field("edges", &self.edges)
      .field("enabled", &self.enabled)
      .finish()
  }
}

/// Format-specific conversion of fetched bytes.
///
/// An error marks the frame failed; it is retried on a later pass.
pub trait LoaderInterpreter: Send + Sync {
  fn interpret(&self, data: LoaderData, ret: &mut QuadLoaderReturn) -> Result<()>;
}

/// Decodes PNG or JPEG tiles into a texture draped over a tile mesh.
#[derive(Clone, Copy, Debug)]
pub struct ImageInterpreter {
  pub program_id: SimpleIdentity,
}

impl Default for ImageInterpreter {
  fn default() -> Self {
    Self {
      program_id: EMPTY_IDENTITY,
    }
  }
}

impl ImageInterpreter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_program(mut self, program_id: SimpleIdentity) -> Self {
    self.program_id = program_id;
    self
  }
}

impl LoaderInterpreter for ImageInterpreter {
  fn interpret(&self, data: LoaderData, ret: &mut QuadLoaderReturn) -> Result<()> {
    let coord_sys = data.params.coord_sys.as_ref().ok_or(QuadTileError::MissingCoordSystem)?;
    let image = image::load_from_memory(&data.bytes).map_err(|err| QuadTileError::Interpret(err.to_string()))?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    let ident = data.ident;
    let name = format!("tile {}/{}/{} frame {}", ident.level, ident.x, ident.y, data.frame.index);
    let texture = Texture::new(name.clone(), width, height, TextureFormat::Rgba8, rgba.into_raw());

    let settings = MeshSettings {
      coord_sys,
      display: data.display,
      tess_x: data.params.tessellation_x,
      tess_y: data.params.tessellation_y,
      flip_y: data.flip_y,
    };
    let mut drawable = build_tile_mesh(&settings, &ident, data.edges).into_drawable(name);
    drawable.texture_ids.push(texture.id);
    drawable.program_id = self.program_id;
    drawable.draw_priority = data.draw_priority;
    drawable.enabled = data.enabled;

    let mut component = ComponentObject::new();
    component.drawable_ids.push(drawable.id);
    component.texture_ids.push(texture.id);
    component.enabled = data.enabled;

    ret.images.push(texture);
    ret.changes.push(Box::new(AddDrawableReq::new(drawable)));
    ret.comp_objs.push(component);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use glam::DVec2;

  use super::*;
  use crate::coord::{CoordSystemKind, FlatCoordSystem, Mbr};
  use crate::loader::FetchTicket;

  fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
    let mut bytes = Vec::new();
    img
      .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
      .expect("encode png");
    bytes
  }

  fn data(bytes: Vec<u8>) -> LoaderData {
    LoaderData {
      ident: QuadTreeIdentifier::new(1, 0, 1),
      frame: QuadFrameInfo::new(0),
      bytes,
      params: Arc::new(SamplingParams {
        coord_sys: Some(CoordSystemKind::Flat(FlatCoordSystem {
          bounds: Mbr::new(DVec2::ZERO, DVec2::ONE),
        })),
        tessellation_x: 2,
        tessellation_y: 2,
        ..Default::default()
      }),
      display: DisplaySurface::Flat,
      edges: EdgeMatch::NONE,
      enabled: false,
      draw_priority: 7,
      flip_y: false,
    }
  }

  #[test]
  fn test_png_becomes_texture_and_drawable() {
    let d = data(png_bytes(8, 4));
    let mut ret = QuadLoaderReturn::new(d.ident, d.frame, 1, FetchTicket::next());
    ImageInterpreter::new().interpret(d, &mut ret).expect("interpret");

    assert_eq!(ret.images.len(), 1);
    let texture = &ret.images[0];
    assert_eq!((texture.width, texture.height), (8, 4));
    assert!(texture.is_complete());

    assert_eq!(ret.changes.len(), 1);
    assert_eq!(ret.changes[0].name(), "add_drawable");

    let component = &ret.comp_objs[0];
    assert_eq!(component.texture_ids.as_slice(), &[texture.id]);
    assert_eq!(component.drawable_ids.len(), 1);
    assert!(!component.enabled);
  }

  #[test]
  fn test_garbage_is_an_error() {
    let d = data(vec![0, 1, 2, 3]);
    let mut ret = QuadLoaderReturn::new(d.ident, d.frame, 1, FetchTicket::next());
    let err = ImageInterpreter::new().interpret(d, &mut ret).unwrap_err();
    assert!(matches!(err, QuadTileError::Interpret(_)));
    assert!(ret.is_empty());
  }
}
