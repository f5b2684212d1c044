//! Executor abstraction for background loads
//!
//! Decoding itself is executor-agnostic: every operation is a plain future.
//! [`AsyncSpawner`] is the seam where a caller plugs in the runtime that
//! drives [`GltfLoader::load_in_background`](crate::loader::GltfLoader::load_in_background).

pub mod mock;
#[cfg(feature = "runtime-tokio")]
pub mod tokio_impl;

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

/// A boxed future that can be sent across threads
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased handle to a spawned task
///
/// Holds whatever the runtime returned (a tokio `JoinHandle`, an eagerly
/// computed value, ...); [`downcast`](Self::downcast) recovers it.
#[derive(Debug)]
pub struct JoinHandle {
    inner: Box<dyn std::any::Any + Send>,
}

impl JoinHandle {
    pub fn new<T: Send + 'static>(handle: T) -> Self {
        Self {
            inner: Box::new(handle),
        }
    }

    pub fn downcast<T: 'static>(self) -> Option<T> {
        self.inner.downcast::<T>().ok().map(|b| *b)
    }
}

/// Runs load tasks on some executor
///
/// # Example
/// ```ignore
/// let handle = GltfLoader::new().load_in_background(&TokioSpawner::new(), "duck.glb");
/// while handle.is_loading() { /* render a frame */ }
/// ```
pub trait AsyncSpawner: Send + Sync + Clone + Debug {
    /// Start `task` in the background
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static;

    fn spawn_with_result<F, T>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static;

    fn runtime_name(&self) -> &'static str;

    /// Drive `future` to completion on the calling thread
    ///
    /// `None` when the runtime cannot block.
    fn block_on<F, T>(&self, _future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        None
    }
}

pub use mock::{MockSpawnBehavior, MockSpawner};

#[cfg(feature = "runtime-tokio")]
pub use tokio_impl::TokioSpawner;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::loader::GltfLoader;

    #[test]
    fn test_join_handle_downcast() {
        let handle = JoinHandle::new(Some(3usize));
        assert_eq!(handle.downcast::<Option<usize>>(), Some(Some(3)));
    }

    #[test]
    fn test_join_handle_wrong_type() {
        let handle = JoinHandle::new(3usize);
        assert!(handle.downcast::<String>().is_none());
    }

    #[test]
    fn test_spawned_decode_result() {
        let loader = GltfLoader::new();
        let handle = MockSpawner::blocking().spawn_with_result(async move {
            loader
                .parse(r#"{"asset":{"version":"2.0"},"scenes":[{}]}"#, "")
                .await
                .map(|asset| asset.scenes.len())
        });
        let result = handle.downcast::<Option<Result<usize>>>().unwrap();
        assert_eq!(result.unwrap().unwrap(), 1);
    }
}
