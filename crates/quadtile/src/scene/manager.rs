//! Scene managers - named services that group scene resources.
//!
//! Managers hold ID bookkeeping only. Every resource they create or destroy
//! still goes through change requests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use smallvec::SmallVec;

use super::change::{ChangeSet, OnOffDrawableReq, RemDrawableReq, RemTextureReq};
use crate::identity::SimpleIdentity;

/// Name the component manager is registered under.
pub const COMPONENT_MANAGER: &str = "component";

/// A named service registered with the scene.
pub trait SceneManager: Send + Sync {
  fn name(&self) -> &str;

  /// Queue removal of everything the manager owns.
  fn teardown(&self, changes: &mut ChangeSet);
}

/// User-facing handle over the drawables and textures of one piece of
/// content (for example one tile frame).
#[derive(Clone, Debug)]
pub struct ComponentObject {
  pub id: SimpleIdentity,
  pub drawable_ids: SmallVec<[SimpleIdentity; 4]>,
  pub texture_ids: SmallVec<[SimpleIdentity; 2]>,
  pub enabled: bool,
}

impl ComponentObject {
  /// Empty, enabled component object with a fresh identity.
  pub fn new() -> Self {
    Self {
      id: SimpleIdentity::generate(),
      drawable_ids: SmallVec::new(),
      texture_ids: SmallVec::new(),
      enabled: true,
    }
  }
}

impl Default for ComponentObject {
  fn default() -> Self {
    Self::new()
  }
}

/// Tracks component objects and the resources each one owns.
#[derive(Default)]
pub struct ComponentManager {
  components: Mutex<HashMap<SimpleIdentity, ComponentObject>>,
}

impl ComponentManager {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_component(&self, component: ComponentObject) {
    self.lock().insert(component.id, component);
  }

  /// Remove the given components and queue removal of their resources.
  ///
  /// Unknown IDs are skipped.
  pub fn remove_components(&self, ids: &[SimpleIdentity], changes: &mut ChangeSet) {
    let mut components = self.lock();
    for id in ids {
      if let Some(component) = components.remove(id) {
        queue_removal(&component, changes);
      }
    }
  }

  /// Turn the drawables of the given components on or off.
  pub fn enable_components(&self, ids: &[SimpleIdentity], enable: bool, changes: &mut ChangeSet) {
    let mut components = self.lock();
    for id in ids {
      let Some(component) = components.get_mut(id) else {
        continue;
      };
      if component.enabled == enable {
        continue;
      }
      component.enabled = enable;
      for drawable in &component.drawable_ids {
        changes.push(Box::new(OnOffDrawableReq::new(*drawable, enable)));
      }
    }
  }

  pub fn has_component(&self, id: SimpleIdentity) -> bool {
    self.lock().contains_key(&id)
  }

  pub fn is_enabled(&self, id: SimpleIdentity) -> Option<bool> {
    self.lock().get(&id).map(|c| c.enabled)
  }

  pub fn count(&self) -> usize {
    self.lock().len()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SimpleIdentity, ComponentObject>> {
    self.components.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl SceneManager for ComponentManager {
  fn name(&self) -> &str {
    COMPONENT_MANAGER
  }

  fn teardown(&self, changes: &mut ChangeSet) {
    let mut components = self.lock();
    let mut all: Vec<ComponentObject> = components.drain().map(|(_, c)| c).collect();
    all.sort_by_key(|c| c.id);
    for component in &all {
      queue_removal(component, changes);
    }
  }
}

fn queue_removal(component: &ComponentObject, changes: &mut ChangeSet) {
  for drawable in &component.drawable_ids {
    changes.push(Box::new(RemDrawableReq::new(*drawable)));
  }
  for texture in &component.texture_ids {
    changes.push(Box::new(RemTextureReq::new(*texture)));
  }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;
