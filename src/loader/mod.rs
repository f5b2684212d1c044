//! Loader front door
//!
//! [`GltfLoader`] turns a URL or in-memory bytes into a [`GltfAsset`]. It owns
//! the collaborators (fetcher, texture loaders, geometry decompressor) and
//! hands a fresh [`GltfParser`] to every load.

pub mod container;
pub mod fetch;
pub mod gltf;

pub use container::{is_glb, GlbContainer, GlbHeader};
pub use fetch::{decode_data_uri, extract_url_base, resolve_url, Fetcher, ResourceFetcher};
pub use gltf::{base_of, load_bytes, load_file, load_text};

use crate::async_loading::{AsyncAssetHandle, LoadState};
use crate::cache::{FileCache, ResolveMetricsHandle};
use crate::document::Document;
use crate::error::{DecodeError, Result};
use crate::geometry::GeometryDecompressor;
use crate::parser::{GltfParser, ParserOptions};
use crate::runtime::AsyncSpawner;
use crate::scene::GltfAsset;
use crate::texture::{ImageTextureLoader, TextureLoader};
use std::fmt;
use std::sync::Arc;

/// Loader configuration
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Prefix for URLs passed to [`GltfLoader::load`], also used as the
    /// resource base when `resource_path` is unset
    pub path: String,
    /// Base for relative buffer and image URIs, overriding the asset URL's
    /// directory
    pub resource_path: Option<String>,
    /// Fail on unknown entries of `extensionsRequired` instead of warning
    pub strict_extensions: bool,
    /// Memory budget of the fetched-file cache in bytes; 0 disables it
    pub file_cache_bytes: usize,
}

/// Asset content handed to [`GltfLoader::parse`]
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// A binary container, or JSON text as bytes
    Bytes(Arc<[u8]>),
    Text(String),
}

impl From<Vec<u8>> for AssetSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes.into())
    }
}

impl From<&[u8]> for AssetSource {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.into())
    }
}

impl From<String> for AssetSource {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for AssetSource {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// glTF 2.0 loader
///
/// # Example
/// ```ignore
/// let loader = GltfLoader::new();
/// let asset = futures::executor::block_on(loader.load("models/duck.glb"))?;
/// for renderable in asset.scene.as_ref().unwrap().renderables() {
///     println!("{}", renderable.name);
/// }
/// ```
#[derive(Clone, Default)]
pub struct GltfLoader {
    options: LoaderOptions,
    fetcher: Option<Arc<dyn Fetcher>>,
    texture_loader: Option<Arc<dyn TextureLoader>>,
    dds_loader: Option<Arc<dyn TextureLoader>>,
    decompressor: Option<Arc<dyn GeometryDecompressor>>,
    file_cache: Option<FileCache>,
}

impl fmt::Debug for GltfLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GltfLoader")
            .field("options", &self.options)
            .field("fetcher", &self.fetcher)
            .field("texture_loader", &self.texture_loader)
            .field("dds_loader", &self.dds_loader.is_some())
            .field("decompressor", &self.decompressor.is_some())
            .finish()
    }
}

impl GltfLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.file_cache =
            (options.file_cache_bytes > 0).then(|| FileCache::new(options.file_cache_bytes));
        self.options = options;
        self
    }

    /// Replace the default [`ResourceFetcher`]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replace the default [`ImageTextureLoader`]
    pub fn with_texture_loader(mut self, loader: Arc<dyn TextureLoader>) -> Self {
        self.texture_loader = Some(loader);
        self
    }

    /// Enable `MSFT_texture_dds`
    pub fn with_dds_loader(mut self, loader: Arc<dyn TextureLoader>) -> Self {
        self.dds_loader = Some(loader);
        self
    }

    /// Enable `KHR_draco_mesh_compression`
    pub fn with_decompressor(mut self, decompressor: Arc<dyn GeometryDecompressor>) -> Self {
        self.decompressor = Some(decompressor);
        self
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Fetched-file cache shared by every load of this loader
    pub fn file_cache(&self) -> Option<&FileCache> {
        self.file_cache.as_ref()
    }

    /// Fetch `url` and decode it
    ///
    /// Relative resources resolve against `resource_path`, then `path`, then
    /// the directory of `url`.
    pub async fn load(&self, url: &str) -> Result<GltfAsset> {
        let metrics = ResolveMetricsHandle::new();
        let (source, base) = self.fetch_source(url, &metrics).await?;
        self.parser_with(source, &base, metrics)?.parse().await
    }

    /// Decode in-memory content, resolving relative resources against `path`
    pub async fn parse(&self, source: impl Into<AssetSource>, path: &str) -> Result<GltfAsset> {
        self.parser(source, path)?.parse().await
    }

    /// Prepare a parser without decoding anything
    ///
    /// Individual dependencies can then be requested on demand.
    pub fn parser(&self, source: impl Into<AssetSource>, path: &str) -> Result<GltfParser> {
        self.parser_with(source.into(), path, ResolveMetricsHandle::new())
    }

    /// Start loading `url` on `spawner` and return a handle tracking it
    pub fn load_in_background<S: AsyncSpawner>(
        &self,
        spawner: &S,
        url: impl Into<String>,
    ) -> AsyncAssetHandle {
        let url = url.into();
        let handle = AsyncAssetHandle::new(url.clone());
        let tracker = handle.clone();
        let loader = self.clone();

        spawner.spawn(async move {
            match loader.load_tracked(&url, &tracker).await {
                Ok(asset) => tracker.set_state(LoadState::Completed(Arc::new(asset))),
                Err(err) => {
                    log::error!("Background load of {url} failed: {err}");
                    tracker.set_state(LoadState::Failed(err.to_string()));
                }
            }
        });

        handle
    }

    async fn load_tracked(&self, url: &str, tracker: &AsyncAssetHandle) -> Result<GltfAsset> {
        tracker.set_state(LoadState::Fetching);
        let metrics = ResolveMetricsHandle::new();
        let (source, base) = self.fetch_source(url, &metrics).await?;
        tracker.set_state(LoadState::Decoding);
        self.parser_with(source, &base, metrics)?.parse().await
    }

    async fn fetch_source(
        &self,
        url: &str,
        metrics: &ResolveMetricsHandle,
    ) -> Result<(AssetSource, String)> {
        let full_url = if self.options.path.is_empty() {
            url.to_string()
        } else {
            resolve_url(url, &self.options.path)
        };
        let base = match &self.options.resource_path {
            Some(resource_path) => resource_path.clone(),
            None if !self.options.path.is_empty() => self.options.path.clone(),
            None => extract_url_base(url),
        };

        log::debug!("Fetching {full_url}");
        let bytes = self.fetcher(metrics).fetch(&full_url).await?;
        Ok((AssetSource::Bytes(bytes), base))
    }

    fn parser_with(
        &self,
        source: AssetSource,
        path: &str,
        metrics: ResolveMetricsHandle,
    ) -> Result<GltfParser> {
        let (json, body) = match source {
            AssetSource::Bytes(bytes) if is_glb(&bytes) => {
                let container = GlbContainer::split(&bytes)?;
                (container.json, container.body)
            }
            AssetSource::Bytes(bytes) => {
                let text = std::str::from_utf8(&bytes).map_err(|err| {
                    DecodeError::format(format!("Asset is neither GLB nor UTF-8 JSON: {err}"))
                })?;
                (text.to_string(), None)
            }
            AssetSource::Text(text) => (text, None),
        };

        let document = Document::from_json(json.trim_start_matches('\u{feff}'))?;
        let fetcher = self.fetcher(&metrics);
        let texture_loader = self
            .texture_loader
            .clone()
            .unwrap_or_else(|| Arc::new(ImageTextureLoader::new(Arc::clone(&fetcher))));

        let options = ParserOptions {
            path: path.to_string(),
            fetcher,
            texture_loader,
            dds_loader: self.dds_loader.clone(),
            geometry_decompressor: self.decompressor.clone(),
            strict_extensions: self.options.strict_extensions,
            metrics,
        };
        GltfParser::new(document, body, options)
    }

    fn fetcher(&self, metrics: &ResolveMetricsHandle) -> Arc<dyn Fetcher> {
        if let Some(fetcher) = &self.fetcher {
            return Arc::clone(fetcher);
        }
        let mut fetcher = ResourceFetcher::new().with_metrics(metrics.clone());
        if let Some(cache) = &self.file_cache {
            fetcher = fetcher.with_cache(cache.clone());
        }
        Arc::new(fetcher)
    }
}
