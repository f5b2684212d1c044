//! Integration tests for file loading and the background loading pipeline

mod common;

use archetype_gltf::loader::load_file;
use archetype_gltf::runtime::MockSpawnBehavior;
use archetype_gltf::{
    AsyncLoadError, AsyncSpawner, GltfLoader, LoadState, LoaderOptions, MockSpawner,
};
use std::path::PathBuf;

/// Scratch directory removed on drop
struct TempDir(PathBuf);

impl TempDir {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("archetype-gltf-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn write(&self, name: &str, bytes: &[u8]) -> String {
        let path = self.0.join(name);
        std::fs::write(&path, bytes).unwrap();
        path.to_string_lossy().replace('\\', "/")
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.0).ok();
    }
}

fn scene_with_external_buffer() -> (String, Vec<u8>) {
    let (body, views) = common::triangle();
    let json = format!(
        r#"{{"asset":{{"version":"2.0"}},
            "buffers":[{{"uri":"triangle.bin","byteLength":{len}}}],
            "bufferViews":[{views}],
            "accessors":[{accessors}],
            "meshes":[{{"name":"tri","primitives":[{{"attributes":{{"POSITION":0}},"indices":1}}]}}],
            "nodes":[{{"name":"root","mesh":0}}],
            "scenes":[{{"nodes":[0]}}]}}"#,
        len = body.len(),
        accessors = common::TRIANGLE_ACCESSORS,
    );
    (json, body.bytes)
}

#[test]
fn test_load_file_with_external_buffer() {
    let dir = TempDir::new();
    let (json, body) = scene_with_external_buffer();
    dir.write("triangle.bin", &body);
    let path = dir.write("scene.gltf", json.as_bytes());

    let asset = load_file(&path).unwrap();
    let scene = asset.scene.unwrap();
    let renderable = scene.renderables().next().unwrap();
    assert_eq!(renderable.name, "tri");
    assert_eq!(renderable.geometry.vertex_count(), 3);
    assert!(asset.metrics.total_bytes_fetched() >= body.len() as u64);
}

#[test]
fn test_missing_external_buffer_is_io_error() {
    let dir = TempDir::new();
    let (json, _) = scene_with_external_buffer();
    let path = dir.write("scene.gltf", json.as_bytes());

    let err = load_file(&path).unwrap_err();
    assert!(matches!(err, archetype_gltf::DecodeError::Io { .. }), "{err}");
}

#[test]
fn test_background_load_lifecycle() {
    let dir = TempDir::new();
    let (json, body) = scene_with_external_buffer();
    dir.write("triangle.bin", &body);
    let path = dir.write("scene.gltf", json.as_bytes());

    let loader = GltfLoader::new().with_options(LoaderOptions {
        file_cache_bytes: 1 << 20,
        ..Default::default()
    });

    let pending = loader.load_in_background(&MockSpawner::new(), path.clone());
    assert_eq!(pending.state(), LoadState::Pending);
    assert!(matches!(pending.result(), Err(AsyncLoadError::NotReady(_))));

    let spawner = MockSpawner::with_behavior(MockSpawnBehavior::BlockSync);
    assert_eq!(spawner.runtime_name(), "Mock");
    let handle = loader.load_in_background(&spawner, path.clone());
    assert!(handle.is_ready());
    assert_eq!(handle.progress(), 1.0);
    assert_eq!(handle.asset().unwrap().scenes.len(), 1);

    // second load is served from the shared file cache
    let cache = loader.file_cache().unwrap();
    assert_eq!(cache.len(), 2);
    let again = loader.load_in_background(&spawner, path);
    assert!(again.is_ready());
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_background_load_reports_failure() {
    let dir = TempDir::new();
    let path = dir.write("broken.gltf", br#"{"asset":{"version":"1.0"}}"#);

    let handle = GltfLoader::new().load_in_background(&MockSpawner::blocking(), path);
    assert!(handle.is_failed());
    match handle.result() {
        Err(AsyncLoadError::Failed { message, .. }) => assert!(message.contains("version")),
        other => panic!("unexpected result: {other:?}"),
    }
}
