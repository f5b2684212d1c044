//! Executor stand-in for tests and single-threaded tools

use super::{AsyncSpawner, JoinHandle};
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSpawnBehavior {
    /// Discard tasks without polling them
    Drop,
    /// Run each task to completion inside `spawn`
    BlockSync,
}

/// Spawner that either discards tasks or runs them inline
///
/// With [`MockSpawnBehavior::BlockSync`] a background load has finished by
/// the time `load_in_background` returns; with [`MockSpawnBehavior::Drop`]
/// its handle stays pending forever.
#[derive(Clone, Debug)]
pub struct MockSpawner {
    behavior: MockSpawnBehavior,
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpawner {
    /// Spawner that drops every task
    pub fn new() -> Self {
        Self::with_behavior(MockSpawnBehavior::Drop)
    }

    pub fn with_behavior(behavior: MockSpawnBehavior) -> Self {
        Self { behavior }
    }

    /// Spawner that runs tasks inline
    pub fn blocking() -> Self {
        Self::with_behavior(MockSpawnBehavior::BlockSync)
    }

    pub fn behavior(&self) -> MockSpawnBehavior {
        self.behavior
    }
}

impl AsyncSpawner for MockSpawner {
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.behavior == MockSpawnBehavior::BlockSync {
            futures::executor::block_on(task);
        }
        JoinHandle::new(())
    }

    fn spawn_with_result<F, T>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        JoinHandle::new(self.block_on(task))
    }

    fn runtime_name(&self) -> &'static str {
        "Mock"
    }

    fn block_on<F, T>(&self, future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        match self.behavior {
            MockSpawnBehavior::Drop => None,
            MockSpawnBehavior::BlockSync => Some(futures::executor::block_on(future)),
        }
    }
}
