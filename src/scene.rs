//! Decoded scene objects: renderables, meshes, nodes, cameras, lights and
//! the per-scene node arena

use crate::animation::AnimationClip;
use crate::attribute::Attribute;
use crate::cache::ResolveMetricsHandle;
use crate::document::AssetInfo;
use crate::geometry::Geometry;
use crate::material::Material;
use glam::{Mat4, Quat, Vec3};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Make a node name safe for animation track binding
///
/// Whitespace becomes `_` and the characters `[ ] . : /` are dropped.
pub fn sanitize_node_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '[' | ']' | '.' | ':' | '/'))
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Local transform as translation, rotation (xyzw quaternion) and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0, 1.0, 1.0],
        }
    }
}

impl Transform {
    /// Decompose a column-major matrix
    pub fn from_matrix(matrix: &[f32; 16]) -> Self {
        let (scale, rotation, translation) =
            Mat4::from_cols_array(matrix).to_scale_rotation_translation();
        Self {
            translation: translation.to_array(),
            rotation: rotation.to_array(),
            scale: scale.to_array(),
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::from_array(self.scale),
            Quat::from_array(self.rotation),
            Vec3::from_array(self.translation),
        )
    }
}

/// How a renderable is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderableKind {
    Mesh,
    SkinnedMesh,
    LineSegments,
    Line,
    LineLoop,
    Points,
}

impl RenderableKind {
    pub fn is_line(self) -> bool {
        matches!(self, Self::LineSegments | Self::Line | Self::LineLoop)
    }
}

/// Triangle assembly for mesh renderables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// One drawable primitive: shared geometry plus its final material
#[derive(Debug, Clone)]
pub struct Renderable {
    pub uuid: Uuid,
    pub name: String,
    pub kind: RenderableKind,
    pub draw_mode: DrawMode,
    pub geometry: Arc<Geometry>,
    pub material: Arc<Material>,
    pub morph_target_influences: Vec<f32>,
    pub morph_target_dictionary: BTreeMap<String, usize>,
    pub user_data: Map<String, Value>,
}

impl Renderable {
    pub fn new(
        name: impl Into<String>,
        kind: RenderableKind,
        geometry: Arc<Geometry>,
        material: Arc<Material>,
    ) -> Self {
        let targets = geometry.morph_target_count();
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            kind,
            draw_mode: DrawMode::Triangles,
            geometry,
            material,
            morph_target_influences: vec![0.0; targets],
            morph_target_dictionary: BTreeMap::new(),
            user_data: Map::new(),
        }
    }

    pub fn is_skinned(&self) -> bool {
        self.kind == RenderableKind::SkinnedMesh
    }

    pub fn has_morph_targets(&self) -> bool {
        !self.morph_target_influences.is_empty()
    }

    /// Copy with its own identity and `suffix` appended to the name
    ///
    /// Geometry and material stay shared.
    pub fn instance(&self, suffix: &str) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: format!("{}{suffix}", self.name),
            ..self.clone()
        }
    }

    /// Overwrite morph influences with `weights`, keeping the target count
    pub fn set_influences(&mut self, weights: &[f32]) {
        for (slot, weight) in self.morph_target_influences.iter_mut().zip(weights) {
            *slot = *weight;
        }
    }
}

/// A decoded mesh: one renderable, or a group of them for several primitives
#[derive(Debug, Clone)]
pub struct Mesh {
    pub uuid: Uuid,
    pub index: usize,
    pub name: String,
    pub renderables: Vec<Renderable>,
    pub is_group: bool,
    pub user_data: Map<String, Value>,
}

/// A mesh as placed by one node
#[derive(Debug, Clone)]
pub struct MeshInstance {
    pub mesh: Arc<Mesh>,
    pub name: String,
    /// Rank of the node among the nodes sharing the mesh, when shared
    pub instance: Option<usize>,
    pub renderables: Vec<Renderable>,
}

impl MeshInstance {
    /// Place `mesh` for a node
    ///
    /// `instance` is `Some` only when several nodes reference the mesh. The
    /// node's `weights`, if any, override every renderable's influences.
    pub fn new(mesh: Arc<Mesh>, instance: Option<usize>, weights: Option<&[f32]>) -> Self {
        let suffix = instance.map(|n| format!("_instance_{n}"));
        let mut renderables: Vec<Renderable> = match &suffix {
            Some(suffix) => mesh.renderables.iter().map(|r| r.instance(suffix)).collect(),
            None => mesh.renderables.clone(),
        };
        if let Some(weights) = weights {
            for renderable in &mut renderables {
                renderable.set_influences(weights);
            }
        }
        let name = match &suffix {
            Some(suffix) => format!("{}{suffix}", mesh.name),
            None => mesh.name.clone(),
        };
        Self {
            mesh,
            name,
            instance,
            renderables,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in degrees
        fov: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub uuid: Uuid,
    pub name: Option<String>,
    pub projection: Projection,
    pub user_data: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Point,
    Spot { angle: f32, penumbra: f32 },
}

/// A punctual light
///
/// Directional and spot lights aim at `target`, one unit down the local -Z.
#[derive(Debug, Clone)]
pub struct Light {
    pub uuid: Uuid,
    pub name: String,
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
    pub distance: f32,
    pub decay: f32,
    pub target: Option<[f32; 3]>,
}

/// A skin as declared: joint node indices and inverse bind matrices
#[derive(Debug, Clone)]
pub struct Skin {
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Option<Arc<Attribute>>,
}

/// Resolved skin bound to the skinned renderables of a node
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub bones: Vec<Arc<Node>>,
    pub bone_inverses: Vec<Mat4>,
}

/// Classification of a node by what it carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Bone,
    /// Several payloads wrapped in a synthetic group
    Group,
    Mesh,
    Camera,
    Light,
    Object,
}

/// A decoded node without its children
#[derive(Debug, Clone)]
pub struct Node {
    pub uuid: Uuid,
    pub index: usize,
    /// Sanitized name; the raw name is kept in `user_data["name"]`
    pub name: Option<String>,
    pub is_bone: bool,
    pub transform: Transform,
    pub mesh: Option<MeshInstance>,
    pub camera: Option<Arc<Camera>>,
    pub light: Option<Arc<Light>>,
    pub user_data: Map<String, Value>,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        if self.is_bone {
            return NodeKind::Bone;
        }
        let payloads = [
            self.mesh.is_some(),
            self.camera.is_some(),
            self.light.is_some(),
        ];
        match payloads.iter().filter(|p| **p).count() {
            0 => NodeKind::Object,
            1 if self.mesh.is_some() => NodeKind::Mesh,
            1 if self.camera.is_some() => NodeKind::Camera,
            1 => NodeKind::Light,
            _ => NodeKind::Group,
        }
    }

    /// Renderables of the node's mesh, empty without one
    pub fn renderables(&self) -> &[Renderable] {
        self.mesh
            .as_ref()
            .map_or(&[][..], |mesh| mesh.renderables.as_slice())
    }

    /// Name used to bind animation tracks
    pub fn binding_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.uuid.to_string(),
        }
    }
}

/// A node placed in a scene
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub node: Arc<Node>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub skeleton: Option<Arc<Skeleton>>,
}

/// A scene as an arena of placed nodes
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub uuid: Uuid,
    pub name: Option<String>,
    pub nodes: Vec<SceneNode>,
    pub roots: Vec<usize>,
    pub user_data: Map<String, Value>,
}

impl Scene {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// First placed node with the given sanitized name
    pub fn find_by_name(&self, name: &str) -> Option<&SceneNode> {
        self.nodes
            .iter()
            .find(|entry| entry.node.name.as_deref() == Some(name))
    }

    /// Arena ids in depth-first order, roots first
    pub fn traverse(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(entry) = self.nodes.get(id) {
                stack.extend(entry.children.iter().rev().copied());
            }
        }
        order
    }

    /// Every renderable in the scene
    pub fn renderables(&self) -> impl Iterator<Item = &Renderable> {
        self.nodes.iter().flat_map(|entry| entry.node.renderables())
    }
}

/// Result of a load
#[derive(Debug, Clone)]
pub struct GltfAsset {
    /// The document's default scene, or the first one
    pub scene: Option<Arc<Scene>>,
    pub scenes: Vec<Arc<Scene>>,
    pub animations: Vec<Arc<AnimationClip>>,
    pub cameras: Vec<Arc<Camera>>,
    pub asset: AssetInfo,
    pub user_data: Map<String, Value>,
    pub metrics: ResolveMetricsHandle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::BufferAttribute;
    use crate::material::default_material;

    fn renderable(name: &str) -> Renderable {
        let mut geometry = Geometry::new();
        let target = Arc::new(Attribute::Buffer(BufferAttribute::from_f32(vec![0.0; 3], 3)));
        geometry.set_morph_attributes("position", vec![Arc::clone(&target), target]);
        Renderable::new(name, RenderableKind::Mesh, Arc::new(geometry), default_material())
    }

    #[test]
    fn test_sanitize_node_name() {
        assert_eq!(sanitize_node_name("Left Arm.001"), "Left_Arm001");
        assert_eq!(sanitize_node_name("a[0]:b/c"), "a0bc");
    }

    #[test]
    fn test_matrix_round_trip() {
        let transform = Transform {
            translation: [1.0, 2.0, 3.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [2.0, 2.0, 2.0],
        };
        let back = Transform::from_matrix(&transform.matrix().to_cols_array());
        for (a, b) in back.translation.iter().zip(transform.translation) {
            assert!((a - b).abs() < 1e-5);
        }
        for (a, b) in back.scale.iter().zip(transform.scale) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_instance_shares_handles() {
        let mesh = Arc::new(Mesh {
            uuid: Uuid::new_v4(),
            index: 0,
            name: "tree".into(),
            renderables: vec![renderable("tree")],
            is_group: false,
            user_data: Map::new(),
        });
        let a = MeshInstance::new(Arc::clone(&mesh), Some(0), None);
        let b = MeshInstance::new(Arc::clone(&mesh), Some(1), Some(&[0.5, 0.25]));
        assert_eq!(a.name, "tree_instance_0");
        assert_eq!(b.renderables[0].name, "tree_instance_1");
        assert!(Arc::ptr_eq(&a.renderables[0].geometry, &b.renderables[0].geometry));
        assert_ne!(a.renderables[0].uuid, b.renderables[0].uuid);
        assert_eq!(a.renderables[0].morph_target_influences, vec![0.0, 0.0]);
        assert_eq!(b.renderables[0].morph_target_influences, vec![0.5, 0.25]);
    }

    #[test]
    fn test_node_kind() {
        let mut node = Node {
            uuid: Uuid::new_v4(),
            index: 0,
            name: None,
            is_bone: false,
            transform: Transform::default(),
            mesh: None,
            camera: None,
            light: None,
            user_data: Map::new(),
        };
        assert_eq!(node.kind(), NodeKind::Object);
        node.camera = Some(Arc::new(Camera {
            uuid: Uuid::new_v4(),
            name: None,
            projection: Projection::Perspective {
                fov: 50.0,
                aspect: 1.0,
                near: 1.0,
                far: 2e6,
            },
            user_data: Map::new(),
        }));
        assert_eq!(node.kind(), NodeKind::Camera);
        node.light = Some(Arc::new(Light {
            uuid: Uuid::new_v4(),
            name: "light_0".into(),
            kind: LightKind::Point,
            color: [1.0; 3],
            intensity: 1.0,
            distance: 0.0,
            decay: 2.0,
            target: None,
        }));
        assert_eq!(node.kind(), NodeKind::Group);
        node.is_bone = true;
        assert_eq!(node.kind(), NodeKind::Bone);
    }
}
