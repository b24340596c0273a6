//! Rendering resource abstraction.
//!
//! Animators never talk to a GPU directly. They acquire opaque resource
//! handles (geometry buffers, materials, the renderer itself) from a
//! [`RenderBackend`] and must hand every one of them back exactly once.
//!
//! # Resource Flow
//!
//! ```text
//! Animator                      Backend
//!   |-- surface_size() -------->|   (fails if the surface is detached)
//!   |-- allocate(Geometry) ---->|-- ResourceId
//!   |          ...              |
//!   |-- release(ResourceId) --->|   (false on double release)
//! ```

use crate::error::EnvError;
use crate::types::Viewport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Opaque handle to a backend-owned resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

/// Category of a rendering resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// The renderer / output surface binding
    Renderer,
    /// Vertex or point buffers
    Geometry,
    /// Shading state (colour, emissive, opacity)
    Material,
}

/// A host that owns the output surface and hands out rendering resources.
pub trait RenderBackend: Send + 'static {
    /// Returns the current surface size.
    ///
    /// # Returns
    /// * `Err(EnvError::SurfaceUnavailable)` - nothing to mount into
    fn surface_size(&self) -> Result<Viewport, EnvError>;

    /// Acquires a new resource.
    fn allocate(&mut self, kind: ResourceKind, label: &str) -> Result<ResourceId, EnvError>;

    /// Releases a resource.
    ///
    /// Returns `false` if the handle was unknown or already released.
    fn release(&mut self, id: ResourceId) -> bool;

    /// Resizes the output surface.
    fn set_output_size(&mut self, viewport: Viewport);
}

#[derive(Debug, Default)]
struct Ledger {
    next_id: u64,
    live: HashMap<ResourceId, (ResourceKind, String)>,
    allocated_total: u64,
    double_releases: u64,
    surface: Option<Viewport>,
}

/// In-memory backend for headless runs and tests.
///
/// Clones share the same ledger, so a test can keep one clone while the
/// animator consumes the other and still inspect what leaked.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    ledger: Arc<Mutex<Ledger>>,
}

impl HeadlessBackend {
    /// Creates a backend with an attached surface of the given size.
    pub fn new(viewport: Viewport) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger {
                surface: Some(viewport),
                ..Default::default()
            })),
        }
    }

    /// Creates a backend with no surface attached.
    pub fn detached() -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::default())),
        }
    }

    /// Removes the surface; later allocations fail.
    pub fn detach(&self) {
        self.ledger.lock().unwrap().surface = None;
    }

    /// Number of resources currently held.
    pub fn live_count(&self) -> usize {
        self.ledger.lock().unwrap().live.len()
    }

    /// Number of live resources of one kind.
    pub fn live_of(&self, kind: ResourceKind) -> usize {
        self.ledger
            .lock()
            .unwrap()
            .live
            .values()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    /// Total resources ever allocated.
    pub fn allocated_total(&self) -> u64 {
        self.ledger.lock().unwrap().allocated_total
    }

    /// Releases of handles that were not live.
    pub fn double_releases(&self) -> u64 {
        self.ledger.lock().unwrap().double_releases
    }

    /// Current output size, if attached.
    pub fn output_size(&self) -> Option<Viewport> {
        self.ledger.lock().unwrap().surface
    }
}

impl RenderBackend for HeadlessBackend {
    fn surface_size(&self) -> Result<Viewport, EnvError> {
        self.ledger
            .lock()
            .unwrap()
            .surface
            .ok_or_else(|| EnvError::surface("headless surface is detached"))
    }

    fn allocate(&mut self, kind: ResourceKind, label: &str) -> Result<ResourceId, EnvError> {
        let mut ledger = self.ledger.lock().unwrap();
        if ledger.surface.is_none() {
            return Err(EnvError::surface(format!("cannot allocate {label}")));
        }

        let id = ResourceId(ledger.next_id);
        ledger.next_id += 1;
        ledger.allocated_total += 1;
        ledger.live.insert(id, (kind, label.to_string()));
        Ok(id)
    }

    fn release(&mut self, id: ResourceId) -> bool {
        let mut ledger = self.ledger.lock().unwrap();
        if ledger.live.remove(&id).is_some() {
            true
        } else {
            ledger.double_releases += 1;
            false
        }
    }

    fn set_output_size(&mut self, viewport: Viewport) {
        let mut ledger = self.ledger.lock().unwrap();
        if ledger.surface.is_some() {
            ledger.surface = Some(viewport);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_release() {
        let mut backend = HeadlessBackend::new(Viewport::default());
        let observer = backend.clone();

        let a = backend.allocate(ResourceKind::Geometry, "ground").unwrap();
        let b = backend.allocate(ResourceKind::Material, "ground").unwrap();
        assert_ne!(a, b);
        assert_eq!(observer.live_count(), 2);
        assert_eq!(observer.live_of(ResourceKind::Material), 1);

        assert!(backend.release(a));
        assert!(!backend.release(a));
        assert_eq!(observer.live_count(), 1);
        assert_eq!(observer.double_releases(), 1);
    }

    #[test]
    fn test_detached_surface_fails_fast() {
        let mut backend = HeadlessBackend::detached();
        assert!(matches!(
            backend.surface_size(),
            Err(EnvError::SurfaceUnavailable(_))
        ));
        assert!(backend.allocate(ResourceKind::Renderer, "renderer").is_err());
        assert_eq!(backend.allocated_total(), 0);
    }

    #[test]
    fn test_resize_updates_output() {
        let mut backend = HeadlessBackend::new(Viewport::default());
        let vp = Viewport::new(640, 480).unwrap();
        backend.set_output_size(vp);
        assert_eq!(backend.output_size(), Some(vp));
    }
}
