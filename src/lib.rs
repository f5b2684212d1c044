//! archetype_gltf - glTF 2.0 asset decoder with a memoized dependency resolver
//!
//! # Features
//! - `.gltf` (JSON) and `.glb` (binary container) input
//! - On-demand, concurrent dependency resolution: every buffer, accessor,
//!   texture, material, mesh, node, ... is decoded at most once per load
//! - Geometry sharing between identical primitives
//! - Extension handlers: lights, unlit, specular-glossiness, texture
//!   transform, Draco and DDS (through caller-supplied collaborators)
//! - Executor-agnostic background loading
//!
//! # Quick Start
//!
//! ```ignore
//! use archetype_gltf::GltfLoader;
//!
//! let loader = GltfLoader::new();
//! let asset = futures::executor::block_on(loader.load("models/duck.gltf"))?;
//! if let Some(scene) = &asset.scene {
//!     for renderable in scene.renderables() {
//!         println!("{} ({} vertices)", renderable.name, renderable.geometry.vertex_count());
//!     }
//! }
//! ```
//!
//! Individual dependencies can be requested without decoding the whole
//! document:
//!
//! ```ignore
//! let parser = loader.parser(bytes, "models/")?;
//! let material = parser.material(2).await?;
//! ```
//!
//! # Feature Flags
//!
//! - `runtime-tokio`: [`TokioSpawner`] and async file reads through `tokio::fs`

// Core modules
pub mod cache;
pub mod document;
pub mod extensions;
pub mod loader;
pub mod parser;
pub mod runtime;

// Decoded output
pub mod animation;
pub mod attribute;
pub mod geometry;
pub mod material;
pub mod scene;
pub mod texture;

pub mod async_loading;

mod error;
pub use error::{DecodeError, Result};

pub use cache::{Dependency, DependencyKind, ResolveMetrics, ResolveMetricsHandle};
pub use document::Document;
pub use extensions::{ExtensionSet, KnownExtension};
pub use loader::{AssetSource, Fetcher, GltfLoader, LoaderOptions, ResourceFetcher};
pub use parser::{GltfParser, ParserOptions};

pub use animation::{AnimationClip, Interpolation, KeyframeTrack, TrackKind};
pub use attribute::{Attribute, TypedArray};
pub use geometry::{Geometry, GeometryDecompressor};
pub use material::{AlphaMode, Material, MaterialKind, Side, TextureSlot};
pub use scene::{
    Camera, GltfAsset, Light, LightKind, Mesh, Node, NodeKind, Projection, Renderable,
    RenderableKind, Scene, Skeleton, Transform,
};
pub use texture::{Texture, TextureError, TextureImage, TextureLoader};

pub use runtime::mock::MockSpawner;
#[cfg(feature = "runtime-tokio")]
pub use runtime::tokio_impl::TokioSpawner;
pub use runtime::{AsyncSpawner, JoinHandle};

pub use async_loading::{AsyncAssetHandle, AsyncLoadError, LoadState};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
