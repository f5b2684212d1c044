//! Memoized dependency caching
//!
//! Every decoded object is reached through a cache keyed by what it is and
//! where it lives in the document. Entries hold shared futures, so the first
//! request starts the decode and every later or concurrent request awaits the
//! same in-flight work.

pub mod files;
pub mod metrics;
pub mod primitive;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::animation::AnimationClip;
use crate::attribute::{Attribute, BufferSlice};
use crate::error::Result;
use crate::material::Material;
use crate::scene::{Camera, Light, Mesh, Node, Scene, Skin};
use crate::texture::Texture;

pub use files::FileCache;
pub use metrics::{ResolveMetrics, ResolveMetricsHandle};
pub use primitive::primitive_key;

/// A decode in flight or finished, shareable between any number of waiters
pub type SharedResult<V> = Shared<BoxFuture<'static, Result<V>>>;

/// The document arrays a dependency can be resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyKind {
    Scene,
    Node,
    Mesh,
    Accessor,
    BufferView,
    Buffer,
    Material,
    Texture,
    Skin,
    Animation,
    Camera,
    Light,
}

impl DependencyKind {
    /// Name used in log lines and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Node => "node",
            Self::Mesh => "mesh",
            Self::Accessor => "accessor",
            Self::BufferView => "bufferView",
            Self::Buffer => "buffer",
            Self::Material => "material",
            Self::Texture => "texture",
            Self::Skin => "skin",
            Self::Animation => "animation",
            Self::Camera => "camera",
            Self::Light => "light",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(kind, index)` address of a dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyKey {
    pub kind: DependencyKind,
    pub index: usize,
}

impl DependencyKey {
    pub fn new(kind: DependencyKind, index: usize) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.index)
    }
}

/// A resolved dependency
#[derive(Debug, Clone)]
pub enum Dependency {
    Buffer(BufferSlice),
    BufferView(BufferSlice),
    /// `None` for accessors with neither a buffer view nor sparse data
    Accessor(Option<Arc<Attribute>>),
    Texture(Arc<Texture>),
    Material(Arc<Material>),
    Mesh(Arc<Mesh>),
    Skin(Arc<Skin>),
    Node(Arc<Node>),
    /// `None` for cameras missing their projection parameters
    Camera(Option<Arc<Camera>>),
    Animation(Arc<AnimationClip>),
    Light(Arc<Light>),
    Scene(Arc<Scene>),
}

/// Whether a lookup found an existing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Hit,
    Miss,
}

/// Map from key to shared decode future
///
/// The entry is inserted before the future is first polled, so at most one
/// decode runs per key no matter how many callers race for it.
pub struct MemoCache<K, V: Clone> {
    entries: Mutex<HashMap<K, SharedResult<V>>>,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the entry for `key`, creating it with `make` on a miss
    ///
    /// `make` must only build the future. It runs under the cache lock, so it
    /// must not poll anything or touch this cache.
    pub fn get_or_insert_with<F>(&self, key: K, make: F) -> (SharedResult<V>, Lookup)
    where
        F: FnOnce() -> BoxFuture<'static, Result<V>>,
    {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&key) {
            return (existing.clone(), Lookup::Hit);
        }
        let shared = make().shared();
        entries.insert(key, shared.clone());
        (shared, Lookup::Miss)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<K, V> Default for MemoCache<K, V>
where
    K: Eq + Hash,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V: Clone> fmt::Debug for MemoCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

/// Synchronous string-keyed store for derived objects
///
/// Used for interleaved buffers, material variants and texture variants,
/// which are built without awaiting anything.
pub struct Registry<T> {
    entries: Mutex<HashMap<String, Arc<T>>>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries.lock().get(key).cloned()
    }

    /// Return the entry for `key`, building it with `make` on a miss
    pub fn get_or_insert_with<F>(&self, key: String, make: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        let mut entries = self.entries.lock();
        Arc::clone(entries.entry(key).or_insert_with(|| Arc::new(make())))
    }

    /// Like [`Registry::get_or_insert_with`] for builders that can fail
    pub fn get_or_try_insert_with<F>(&self, key: String, make: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&key) {
            return Ok(Arc::clone(existing));
        }
        let value = Arc::new(make()?);
        entries.insert(key, Arc::clone(&value));
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}
