//! Background loading handles
//!
//! [`GltfLoader::load_in_background`](crate::loader::GltfLoader::load_in_background)
//! returns an [`AsyncAssetHandle`] that the caller polls from its own loop
//! (typically once per frame) until the asset is ready.

use crate::scene::GltfAsset;
use parking_lot::RwLock as SyncRwLock;
use std::sync::Arc;
use thiserror::Error;

/// Error reported by a handle whose load did not produce an asset
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsyncLoadError {
    #[error("Asset \"{0}\" is still loading")]
    NotReady(String),

    #[error("Asset \"{url}\" failed to load: {message}")]
    Failed { url: String, message: String },
}

/// Stage of a background load
#[derive(Debug, Clone)]
pub enum LoadState {
    /// Not started; a task dropped by its spawner stays here
    Pending,

    /// Reading the asset file
    Fetching,

    /// Decoding the document and its dependencies
    Decoding,

    Completed(Arc<GltfAsset>),

    /// Load failed with the rendered error
    Failed(String),
}

impl LoadState {
    fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Decoding => "decoding",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
        }
    }
}

impl PartialEq for LoadState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Pending, Self::Pending)
            | (Self::Fetching, Self::Fetching)
            | (Self::Decoding, Self::Decoding) => true,
            (Self::Completed(a), Self::Completed(b)) => Arc::ptr_eq(a, b),
            (Self::Failed(a), Self::Failed(b)) => a == b,
            _ => false,
        }
    }
}

/// Shared view of one background load
///
/// Clones observe the same state.
#[derive(Debug, Clone)]
pub struct AsyncAssetHandle {
    url: Arc<str>,
    state: Arc<SyncRwLock<LoadState>>,
}

impl AsyncAssetHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().into(),
            state: Arc::new(SyncRwLock::new(LoadState::Pending)),
        }
    }

    /// URL the load was started with
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> LoadState {
        self.state.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.read(), LoadState::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(*self.state.read(), LoadState::Failed(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            *self.state.read(),
            LoadState::Pending | LoadState::Fetching | LoadState::Decoding
        )
    }

    /// Coarse progress in `[0, 1]`
    pub fn progress(&self) -> f32 {
        match &*self.state.read() {
            LoadState::Pending => 0.0,
            LoadState::Fetching => 0.1,
            LoadState::Decoding => 0.5,
            LoadState::Completed(_) => 1.0,
            LoadState::Failed(_) => 0.0,
        }
    }

    /// The decoded asset once loading completed
    pub fn asset(&self) -> Option<Arc<GltfAsset>> {
        match &*self.state.read() {
            LoadState::Completed(asset) => Some(Arc::clone(asset)),
            _ => None,
        }
    }

    /// The asset, or why there is none yet
    pub fn result(&self) -> Result<Arc<GltfAsset>, AsyncLoadError> {
        match &*self.state.read() {
            LoadState::Completed(asset) => Ok(Arc::clone(asset)),
            LoadState::Failed(message) => Err(AsyncLoadError::Failed {
                url: self.url.to_string(),
                message: message.clone(),
            }),
            _ => Err(AsyncLoadError::NotReady(self.url.to_string())),
        }
    }

    pub(crate) fn set_state(&self, state: LoadState) {
        log::trace!("{}: {}", self.url, state.label());
        *self.state.write() = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResolveMetricsHandle;
    use crate::document::AssetInfo;

    fn empty_asset() -> Arc<GltfAsset> {
        Arc::new(GltfAsset {
            scene: None,
            scenes: Vec::new(),
            animations: Vec::new(),
            cameras: Vec::new(),
            asset: AssetInfo::default(),
            user_data: Default::default(),
            metrics: ResolveMetricsHandle::new(),
        })
    }

    #[test]
    fn test_load_state_eq() {
        assert_eq!(LoadState::Pending, LoadState::Pending);
        assert_ne!(LoadState::Pending, LoadState::Fetching);

        let asset = empty_asset();
        assert_eq!(
            LoadState::Completed(Arc::clone(&asset)),
            LoadState::Completed(asset)
        );
        assert_ne!(
            LoadState::Completed(empty_asset()),
            LoadState::Completed(empty_asset())
        );
    }

    #[test]
    fn test_new_handle_is_pending() {
        let handle = AsyncAssetHandle::new("duck.glb");
        assert_eq!(handle.url(), "duck.glb");
        assert_eq!(handle.progress(), 0.0);
        assert!(handle.is_loading());
        assert!(!handle.is_ready());
        assert_eq!(
            handle.result().unwrap_err(),
            AsyncLoadError::NotReady("duck.glb".to_string())
        );
    }

    #[test]
    fn test_state_transitions_are_shared_by_clones() {
        let handle = AsyncAssetHandle::new("duck.glb");
        let observer = handle.clone();

        handle.set_state(LoadState::Fetching);
        assert_eq!(observer.progress(), 0.1);

        handle.set_state(LoadState::Decoding);
        assert_eq!(observer.state(), LoadState::Decoding);

        handle.set_state(LoadState::Completed(empty_asset()));
        assert!(observer.is_ready());
        assert!(!observer.is_loading());
        assert!(observer.asset().is_some());
        assert!(observer.result().is_ok());
    }

    #[test]
    fn test_failure_message() {
        let handle = AsyncAssetHandle::new("bad.glb");
        handle.set_state(LoadState::Failed("Unsupported asset".to_string()));
        assert!(handle.is_failed());
        assert!(handle.asset().is_none());
        assert_eq!(
            handle.result().unwrap_err().to_string(),
            "Asset \"bad.glb\" failed to load: Unsupported asset"
        );
    }
}
