//! Tokio executor support (`runtime-tokio` feature)

use super::{AsyncSpawner, JoinHandle};
use std::future::Future;

/// Spawns load tasks onto the ambient Tokio runtime
///
/// Must be used from within a runtime context; `spawn` panics otherwise,
/// as `tokio::spawn` does. The wrapped handle is a
/// `tokio::task::JoinHandle<T>`.
#[derive(Clone, Debug, Default, Copy)]
pub struct TokioSpawner;

impl TokioSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl AsyncSpawner for TokioSpawner {
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        JoinHandle::new(tokio::spawn(task))
    }

    fn spawn_with_result<F, T>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        JoinHandle::new(tokio::spawn(task))
    }

    fn runtime_name(&self) -> &'static str {
        "Tokio"
    }

    fn block_on<F, T>(&self, future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            Some(tokio::task::block_in_place(|| handle.block_on(future)))
        } else {
            let rt = tokio::runtime::Runtime::new().ok()?;
            Some(rt.block_on(future))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{GlbContainer, GltfLoader};
    use std::time::Duration;

    #[tokio::test]
    async fn test_background_load_on_tokio() {
        let dir = std::env::temp_dir().join(format!("archetype-gltf-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("scene.glb");
        let glb = GlbContainer::new(
            r#"{"asset":{"version":"2.0"},"scenes":[{"nodes":[0]}],"nodes":[{"name":"root"}]}"#,
            None,
        );
        std::fs::write(&file, glb.to_vec()).unwrap();

        let handle = GltfLoader::new()
            .load_in_background(&TokioSpawner::new(), file.to_string_lossy().to_string());
        for _ in 0..200 {
            if !handle.is_loading() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let asset = handle.result().unwrap();
        assert_eq!(asset.scene.as_ref().unwrap().len(), 1);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_spawn_with_result_wraps_tokio_handle() {
        let handle = TokioSpawner::new().spawn_with_result(async { 7u32 });
        let inner = handle
            .downcast::<tokio::task::JoinHandle<u32>>()
            .unwrap();
        assert_eq!(inner.await.unwrap(), 7);
    }

    #[test]
    fn test_block_on_without_runtime() {
        let spawner = TokioSpawner::new();
        assert_eq!(spawner.runtime_name(), "Tokio");
        assert_eq!(spawner.block_on(async { 5 }), Some(5));
    }
}
