//! Blocking convenience API
//!
//! Thin wrappers over [`GltfLoader`](super::GltfLoader) for callers without
//! an async runtime. Each call drives the load on the current thread.

use super::{extract_url_base, GltfLoader};
use crate::error::Result;
use crate::scene::GltfAsset;
use futures::executor::block_on;
use std::path::Path;

/// Load a `.gltf` or `.glb` file, resolving external resources next to it
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<GltfAsset> {
    let url = path.as_ref().to_string_lossy().replace('\\', "/");
    block_on(GltfLoader::new().load(&url))
}

/// Decode binary content (GLB, or JSON as bytes)
///
/// `path` is the base relative URIs resolve against; pass the directory of
/// the original file, or an empty string for self-contained assets.
pub fn load_bytes(data: &[u8], path: &str) -> Result<GltfAsset> {
    block_on(GltfLoader::new().parse(data, path))
}

/// Decode JSON text
pub fn load_text(text: &str, path: &str) -> Result<GltfAsset> {
    block_on(GltfLoader::new().parse(text, path))
}

/// Directory of `path` in URL form, usable as the base for [`load_bytes`]
pub fn base_of<P: AsRef<Path>>(path: P) -> String {
    extract_url_base(&path.as_ref().to_string_lossy().replace('\\', "/"))
}
