//! Demand-driven decoding of a parsed document
//!
//! [`GltfParser::resolve`] is the single entry point for every dependency.
//! Each `(kind, index)` pair is decoded at most once; the decode future is
//! cached before it first runs, so concurrent and re-entrant requests all
//! await the same work.

mod accessor;
mod animation;
mod material;
mod mesh;
mod node;
mod texture;

use crate::animation::AnimationClip;
use crate::attribute::{Attribute, BufferSlice, InterleavedBuffer};
use crate::cache::{
    Dependency, DependencyKey, DependencyKind, Lookup, MemoCache, Registry, ResolveMetricsHandle,
    SharedResult,
};
use crate::document::{self, Document, Extensions};
use crate::error::{DecodeError, Result};
use crate::extensions::{document_lights, ExtensionSet, ExtensionSupport, LightDef};
use crate::geometry::{Geometry, GeometryDecompressor};
use crate::loader::{resolve_url, Fetcher};
use crate::material::Material;
use crate::scene::{Camera, GltfAsset, Light, Mesh, Node, Scene, Skin};
use crate::texture::{Texture, TextureLoader};
use futures::future::{try_join_all, FutureExt};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

/// Collaborators and settings for one parse
#[derive(Clone)]
pub struct ParserOptions {
    /// Base path external URIs are resolved against
    pub path: String,
    pub fetcher: Arc<dyn Fetcher>,
    pub texture_loader: Arc<dyn TextureLoader>,
    pub dds_loader: Option<Arc<dyn TextureLoader>>,
    pub geometry_decompressor: Option<Arc<dyn GeometryDecompressor>>,
    /// Fail on unknown required extensions instead of warning
    pub strict_extensions: bool,
    pub metrics: ResolveMetricsHandle,
}

impl fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserOptions")
            .field("path", &self.path)
            .field("fetcher", &self.fetcher)
            .field("texture_loader", &self.texture_loader)
            .field("dds_loader", &self.dds_loader.is_some())
            .field("geometry_decompressor", &self.geometry_decompressor.is_some())
            .field("strict_extensions", &self.strict_extensions)
            .finish()
    }
}

/// Node and mesh facts gathered before any decoding
#[derive(Debug, Default)]
struct NodeRefs {
    bones: HashSet<usize>,
    mesh_references: HashMap<usize, usize>,
    skinned_meshes: HashSet<usize>,
    /// Rank of a node among the nodes sharing its mesh
    instance_numbers: HashMap<usize, usize>,
}

impl NodeRefs {
    fn mark(document: &Document) -> Self {
        let mut refs = Self::default();

        for skin in &document.skins {
            refs.bones.extend(skin.joints.iter().copied());
        }

        for node in &document.nodes {
            if let Some(mesh) = node.mesh {
                *refs.mesh_references.entry(mesh).or_insert(0) += 1;
                if node.skin.is_some() {
                    refs.skinned_meshes.insert(mesh);
                }
            }
        }

        let mut uses: HashMap<usize, usize> = HashMap::new();
        for (index, node) in document.nodes.iter().enumerate() {
            let Some(mesh) = node.mesh else { continue };
            if refs.mesh_references.get(&mesh).copied().unwrap_or(0) > 1 {
                let rank = uses.entry(mesh).or_insert(0);
                refs.instance_numbers.insert(index, *rank);
                *rank += 1;
            }
        }

        refs
    }
}

struct ParserState {
    document: Document,
    body: Option<Arc<[u8]>>,
    options: ParserOptions,
    extensions: ExtensionSet,
    lights: Vec<LightDef>,
    refs: NodeRefs,
    dependencies: MemoCache<DependencyKey, Dependency>,
    primitives: MemoCache<String, Arc<Geometry>>,
    interleaved: Registry<InterleavedBuffer>,
    materials: Registry<Material>,
    textures: Registry<Texture>,
}

/// Decoder for one document
///
/// Cheap to clone; clones share every cache.
#[derive(Clone)]
pub struct GltfParser {
    state: Arc<ParserState>,
}

impl fmt::Debug for GltfParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GltfParser")
            .field("options", &self.state.options)
            .field("dependencies", &self.state.dependencies)
            .field("primitives", &self.state.primitives)
            .finish()
    }
}

macro_rules! typed_dependency {
    ($(#[$doc:meta])* $name:ident, $kind:ident, $ty:ty) => {
        $(#[$doc])*
        pub async fn $name(&self, index: usize) -> Result<$ty> {
            match self.resolve(DependencyKind::$kind, index).await? {
                Dependency::$kind(value) => Ok(value),
                _ => Err(DecodeError::format(format!(
                    "Cache entry {} holds the wrong kind",
                    DependencyKey::new(DependencyKind::$kind, index)
                ))),
            }
        }
    };
}

impl GltfParser {
    /// Prepare a parser: activate extensions and mark bones and shared meshes
    ///
    /// `body` is the BIN chunk of a binary container, used for buffer 0.
    pub fn new(document: Document, body: Option<Arc<[u8]>>, options: ParserOptions) -> Result<Self> {
        let support = ExtensionSupport {
            geometry_decompressor: options.geometry_decompressor.is_some(),
            dds_loader: options.dds_loader.is_some(),
            strict: options.strict_extensions,
        };
        let extensions = ExtensionSet::configure(&document, support)?;
        let lights = document_lights(&document)?;
        let refs = NodeRefs::mark(&document);

        log::debug!(
            "Parser ready: {} nodes, {} meshes, extensions {:?}",
            document.nodes.len(),
            document.meshes.len(),
            extensions.iter().map(|ext| ext.name()).collect::<Vec<_>>()
        );

        Ok(Self {
            state: Arc::new(ParserState {
                document,
                body,
                options,
                extensions,
                lights,
                refs,
                dependencies: MemoCache::new(),
                primitives: MemoCache::new(),
                interleaved: Registry::new(),
                materials: Registry::new(),
                textures: Registry::new(),
            }),
        })
    }

    pub fn document(&self) -> &Document {
        &self.state.document
    }

    pub fn metrics(&self) -> &ResolveMetricsHandle {
        &self.state.options.metrics
    }

    pub fn extensions(&self) -> &ExtensionSet {
        &self.state.extensions
    }

    /// Shared future for the dependency `(kind, index)`
    ///
    /// The cached future holds only a weak handle to the parser, so an
    /// abandoned parse does not keep its caches alive.
    pub fn resolve(&self, kind: DependencyKind, index: usize) -> SharedResult<Dependency> {
        let key = DependencyKey::new(kind, index);
        let weak = Arc::downgrade(&self.state);
        let (future, lookup) = self
            .state
            .dependencies
            .get_or_insert_with(key, move || decode_entry(weak, key).boxed());

        match lookup {
            Lookup::Hit => self.metrics().record_cache_hit(),
            Lookup::Miss => self.metrics().record_cache_miss(),
        }
        future
    }

    typed_dependency!(buffer, Buffer, BufferSlice);
    typed_dependency!(buffer_view, BufferView, BufferSlice);
    typed_dependency!(
        /// `None` for accessors with neither buffer view nor sparse data
        accessor,
        Accessor,
        Option<Arc<Attribute>>
    );
    typed_dependency!(texture, Texture, Arc<Texture>);
    typed_dependency!(material, Material, Arc<Material>);
    typed_dependency!(mesh, Mesh, Arc<Mesh>);
    typed_dependency!(skin, Skin, Arc<Skin>);
    typed_dependency!(node, Node, Arc<Node>);
    typed_dependency!(
        /// `None` when the camera lacks its projection parameters
        camera,
        Camera,
        Option<Arc<Camera>>
    );
    typed_dependency!(animation, Animation, Arc<AnimationClip>);
    typed_dependency!(light, Light, Arc<Light>);
    typed_dependency!(scene, Scene, Arc<Scene>);

    async fn decode(&self, kind: DependencyKind, index: usize) -> Result<Dependency> {
        Ok(match kind {
            DependencyKind::Buffer => Dependency::Buffer(self.load_buffer(index).await?),
            DependencyKind::BufferView => {
                Dependency::BufferView(self.load_buffer_view(index).await?)
            }
            DependencyKind::Accessor => Dependency::Accessor(self.load_accessor(index).await?),
            DependencyKind::Texture => Dependency::Texture(self.load_texture(index).await?),
            DependencyKind::Material => Dependency::Material(self.load_material(index).await?),
            DependencyKind::Mesh => Dependency::Mesh(self.load_mesh(index).await?),
            DependencyKind::Skin => Dependency::Skin(self.load_skin(index).await?),
            DependencyKind::Node => Dependency::Node(self.load_node(index).await?),
            DependencyKind::Camera => Dependency::Camera(self.load_camera(index)?),
            DependencyKind::Animation => {
                Dependency::Animation(self.load_animation(index).await?)
            }
            DependencyKind::Light => Dependency::Light(self.load_light(index)?),
            DependencyKind::Scene => Dependency::Scene(self.load_scene(index).await?),
        })
    }

    /// Decode every scene, animation and camera and assemble the asset
    pub async fn parse(&self) -> Result<GltfAsset> {
        let document = self.document();

        let scenes = try_join_all((0..document.scenes.len()).map(|i| self.scene(i)));
        let animations = try_join_all((0..document.animations.len()).map(|i| self.animation(i)));
        let cameras = try_join_all((0..document.cameras.len()).map(|i| self.camera(i)));
        let (scenes, animations, cameras) = futures::try_join!(scenes, animations, cameras)?;

        let scene = scenes.get(document.scene.unwrap_or(0)).cloned();
        let metrics = self.metrics();
        log::debug!(
            "Parsed {} scenes, {} animations: {} decodes, {:.1}% cache hits",
            scenes.len(),
            animations.len(),
            metrics.total_decodes(),
            metrics.cache_hit_rate()
        );

        Ok(GltfAsset {
            scene,
            scenes,
            animations,
            cameras: cameras.into_iter().flatten().collect(),
            asset: document.asset.clone().unwrap_or_default(),
            user_data: self.user_data(document.extras.as_ref(), &document.extensions),
            metrics: metrics.clone(),
        })
    }

    async fn load_buffer(&self, index: usize) -> Result<BufferSlice> {
        let def = document::get(&self.document().buffers, index, "buffer")?;

        if let Some(kind) = def.kind.as_deref() {
            if kind != "arraybuffer" {
                return Err(DecodeError::format(format!(
                    "{kind} buffer type is not supported"
                )));
            }
        }

        match (&def.uri, index) {
            (None, 0) => {
                let body = self.state.body.as_ref().ok_or_else(|| {
                    DecodeError::format("Buffer 0 has no uri and there is no binary body")
                })?;
                Ok(BufferSlice::new(Arc::clone(body)))
            }
            (None, _) => Err(DecodeError::format(format!("Buffer {index} has no uri"))),
            (Some(uri), _) => {
                let url = resolve_url(uri, &self.state.options.path);
                let bytes = self.state.options.fetcher.fetch(&url).await?;
                Ok(BufferSlice::new(bytes))
            }
        }
    }

    async fn load_buffer_view(&self, index: usize) -> Result<BufferSlice> {
        let def = document::get(&self.document().buffer_views, index, "bufferView")?;
        let buffer = self.buffer(def.buffer).await?;
        buffer.slice(def.byte_offset.unwrap_or(0), def.byte_length)
    }

    /// User data for an object: its object `extras` plus unknown extensions
    /// under `gltfExtensions`
    fn user_data(&self, extras: Option<&Value>, extensions: &Extensions) -> Map<String, Value> {
        let mut data = Map::new();
        match extras {
            Some(Value::Object(extras)) => data.extend(extras.clone()),
            Some(other) => log::warn!("Ignoring primitive type .extras, {other}"),
            None => {}
        }
        let unknown = self.extensions().unknown(extensions);
        if !unknown.is_empty() {
            data.insert("gltfExtensions".to_string(), Value::Object(unknown));
        }
        data
    }
}

async fn decode_entry(state: Weak<ParserState>, key: DependencyKey) -> Result<Dependency> {
    let state = state.upgrade().ok_or_else(|| {
        DecodeError::format(format!("Parser dropped before {key} was decoded"))
    })?;
    let parser = GltfParser { state };
    log::debug!("Decoding {key}");
    parser.metrics().record_decode(key.kind.as_str());
    parser.decode(key.kind, key.index).await
}
