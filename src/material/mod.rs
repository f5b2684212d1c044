//! Material model and per-mesh material variants
//!
//! Materials decoded from the document are immutable once cached. Meshes that
//! need different shading (points, lines, skinning, vertex colors, ...) get a
//! derived copy from a registry keyed by the source material and the flags.

pub mod shader;

pub use shader::{hex_color, ShaderProgram, Uniform};

use crate::texture::Texture;
use lazy_static::lazy_static;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

lazy_static! {
    static ref DEFAULT_MATERIAL: Arc<Material> = Arc::new(Material::new(MaterialKind::Standard));
    static ref SPECULAR_GLOSSINESS_PROGRAM: Arc<ShaderProgram> =
        Arc::new(ShaderProgram::specular_glossiness());
}

/// Material used by primitives that reference none
///
/// One instance per process; derived variants copy it instead of mutating.
pub fn default_material() -> Arc<Material> {
    Arc::clone(&DEFAULT_MATERIAL)
}

/// Shading model of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    /// Metal-roughness physically based shading
    Standard,
    /// Unlit (`KHR_materials_unlit`)
    Basic,
    /// `KHR_materials_pbrSpecularGlossiness`
    SpecularGlossiness,
    Points,
    LineBasic,
}

impl MaterialKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Standard => "MeshStandardMaterial",
            Self::Basic => "MeshBasicMaterial",
            Self::SpecularGlossiness => "GLTFSpecularGlossinessMaterial",
            Self::Points => "PointsMaterial",
            Self::LineBasic => "LineBasicMaterial",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

impl AlphaMode {
    /// Unknown modes fall back to opaque
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("BLEND") => Self::Blend,
            Some("MASK") => Self::Mask,
            _ => Self::Opaque,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    Front,
    Double,
}

/// Texture slots a material can bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureSlot {
    Map,
    NormalMap,
    AoMap,
    EmissiveMap,
    MetalnessMap,
    RoughnessMap,
    SpecularMap,
    GlossinessMap,
}

impl TextureSlot {
    pub fn name(self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::NormalMap => "normalMap",
            Self::AoMap => "aoMap",
            Self::EmissiveMap => "emissiveMap",
            Self::MetalnessMap => "metalnessMap",
            Self::RoughnessMap => "roughnessMap",
            Self::SpecularMap => "specularMap",
            Self::GlossinessMap => "glossinessMap",
        }
    }

    /// Slots that only read color channels and can drop alpha
    pub fn is_rgb_only(self) -> bool {
        matches!(
            self,
            Self::AoMap | Self::EmissiveMap | Self::MetalnessMap | Self::NormalMap | Self::RoughnessMap
        )
    }

    /// Slots holding color data, sampled as sRGB
    pub fn is_color(self) -> bool {
        matches!(self, Self::Map | Self::EmissiveMap | Self::SpecularMap)
    }
}

/// A decoded material
#[derive(Debug, Clone)]
pub struct Material {
    pub uuid: Uuid,
    pub name: Option<String>,
    pub kind: MaterialKind,
    pub color: [f32; 3],
    pub opacity: f32,
    pub textures: BTreeMap<TextureSlot, Arc<Texture>>,
    pub metalness: f32,
    pub roughness: f32,
    pub normal_scale: [f32; 2],
    pub ao_map_intensity: f32,
    pub emissive: [f32; 3],
    pub specular: [f32; 3],
    pub glossiness: f32,
    pub alpha_mode: AlphaMode,
    pub transparent: bool,
    pub alpha_test: f32,
    pub side: Side,
    pub lights: bool,
    pub size_attenuation: bool,
    pub skinning: bool,
    pub vertex_tangents: bool,
    pub vertex_colors: bool,
    pub flat_shading: bool,
    pub morph_targets: bool,
    pub morph_normals: bool,
    /// Custom program, set for specular-glossiness materials
    pub shader: Option<Arc<ShaderProgram>>,
    pub user_data: Map<String, Value>,
}

impl Material {
    pub fn new(kind: MaterialKind) -> Self {
        let shader = match kind {
            MaterialKind::SpecularGlossiness => Some(Arc::clone(&SPECULAR_GLOSSINESS_PROGRAM)),
            _ => None,
        };
        Self {
            uuid: Uuid::new_v4(),
            name: None,
            kind,
            color: [1.0, 1.0, 1.0],
            opacity: 1.0,
            textures: BTreeMap::new(),
            metalness: 1.0,
            roughness: 1.0,
            normal_scale: [1.0, 1.0],
            ao_map_intensity: 1.0,
            emissive: [0.0, 0.0, 0.0],
            specular: [1.0, 1.0, 1.0],
            glossiness: 1.0,
            alpha_mode: AlphaMode::Opaque,
            transparent: false,
            alpha_test: 0.0,
            side: Side::Front,
            lights: !matches!(kind, MaterialKind::Basic),
            size_attenuation: true,
            skinning: false,
            vertex_tangents: false,
            vertex_colors: false,
            flat_shading: false,
            morph_targets: false,
            morph_normals: false,
            shader,
            user_data: Map::new(),
        }
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<&Arc<Texture>> {
        self.textures.get(&slot)
    }

    pub fn map(&self) -> Option<&Arc<Texture>> {
        self.texture(TextureSlot::Map)
    }

    pub fn set_texture(&mut self, slot: TextureSlot, texture: Arc<Texture>) {
        self.textures.insert(slot, texture);
    }

    pub fn is_specular_glossiness(&self) -> bool {
        self.kind == MaterialKind::SpecularGlossiness
    }

    /// Copy with a fresh identity
    pub fn derive(&self) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            ..self.clone()
        }
    }

    /// Point-sprite material carrying this material's color and map
    pub fn to_points(&self) -> Self {
        let mut points = self.base_copy(MaterialKind::Points);
        if let Some(map) = self.map() {
            points.set_texture(TextureSlot::Map, Arc::clone(map));
        }
        points.lights = false;
        points.size_attenuation = false;
        points
    }

    /// Line material carrying this material's color
    pub fn to_line(&self) -> Self {
        let mut line = self.base_copy(MaterialKind::LineBasic);
        line.lights = false;
        line
    }

    /// New material of `kind` with the properties every material shares
    fn base_copy(&self, kind: MaterialKind) -> Self {
        let mut copy = Self::new(kind);
        copy.name = self.name.clone();
        copy.color = self.color;
        copy.opacity = self.opacity;
        copy.alpha_mode = self.alpha_mode;
        copy.transparent = self.transparent;
        copy.alpha_test = self.alpha_test;
        copy.side = self.side;
        copy.user_data = self.user_data.clone();
        copy
    }
}

/// Geometry-driven shading flags that require a material copy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialVariant {
    pub skinning: bool,
    pub vertex_tangents: bool,
    pub vertex_colors: bool,
    pub flat_shading: bool,
    pub morph_targets: bool,
    pub morph_normals: bool,
}

impl MaterialVariant {
    /// True when the source material can be used unchanged
    pub fn is_base(&self) -> bool {
        !(self.skinning
            || self.vertex_tangents
            || self.vertex_colors
            || self.flat_shading
            || self.morph_targets)
    }

    /// Registry key of the variant of `material`
    pub fn cache_key(&self, material: &Material) -> String {
        let mut key = format!("ClonedMaterial:{}:", material.uuid);
        let flags = [
            (material.is_specular_glossiness(), "specular-glossiness:"),
            (self.skinning, "skinning:"),
            (self.vertex_tangents, "vertex-tangents:"),
            (self.vertex_colors, "vertex-colors:"),
            (self.flat_shading, "flat-shading:"),
            (self.morph_targets, "morph-targets:"),
            (self.morph_normals, "morph-normals:"),
        ];
        for (set, part) in flags {
            if set {
                key.push_str(part);
            }
        }
        key
    }

    /// Copy of `material` with these flags switched on
    pub fn apply(&self, material: &Material) -> Material {
        let mut variant = material.derive();
        variant.skinning |= self.skinning;
        variant.vertex_tangents |= self.vertex_tangents;
        variant.vertex_colors |= self.vertex_colors;
        variant.flat_shading |= self.flat_shading;
        variant.morph_targets |= self.morph_targets;
        variant.morph_normals |= self.morph_normals;
        variant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_material_is_shared() {
        let a = default_material();
        let b = default_material();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.color, [1.0, 1.0, 1.0]);
        assert_eq!(a.emissive, [0.0, 0.0, 0.0]);
        assert_eq!(a.metalness, 1.0);
        assert_eq!(a.roughness, 1.0);
        assert_eq!(a.side, Side::Front);
    }

    #[test]
    fn test_variant_key_order() {
        let material = Material::new(MaterialKind::SpecularGlossiness);
        let variant = MaterialVariant {
            skinning: true,
            flat_shading: true,
            morph_targets: true,
            morph_normals: true,
            ..Default::default()
        };
        assert_eq!(
            variant.cache_key(&material),
            format!(
                "ClonedMaterial:{}:specular-glossiness:skinning:flat-shading:morph-targets:morph-normals:",
                material.uuid
            )
        );
    }

    #[test]
    fn test_variant_copies_instead_of_mutating() {
        let source = Material::new(MaterialKind::Standard);
        let variant = MaterialVariant {
            vertex_colors: true,
            ..Default::default()
        };
        assert!(!variant.is_base());
        let copy = variant.apply(&source);
        assert!(copy.vertex_colors);
        assert!(!source.vertex_colors);
        assert_ne!(copy.uuid, source.uuid);
    }

    #[test]
    fn test_morph_normals_alone_is_base() {
        let variant = MaterialVariant {
            morph_normals: true,
            ..Default::default()
        };
        assert!(variant.is_base());
    }

    #[test]
    fn test_points_and_lines() {
        let mut source = Material::new(MaterialKind::Standard);
        source.color = [0.2, 0.4, 0.6];
        source.side = Side::Double;

        let points = source.to_points();
        assert_eq!(points.kind, MaterialKind::Points);
        assert_eq!(points.color, source.color);
        assert_eq!(points.side, Side::Double);
        assert!(!points.lights);
        assert!(!points.size_attenuation);

        let line = source.to_line();
        assert_eq!(line.kind, MaterialKind::LineBasic);
        assert!(!line.lights);
    }

    #[test]
    fn test_specular_glossiness_shares_program() {
        let a = Material::new(MaterialKind::SpecularGlossiness);
        let b = Material::new(MaterialKind::SpecularGlossiness);
        assert!(Arc::ptr_eq(a.shader.as_ref().unwrap(), b.shader.as_ref().unwrap()));
        assert!(Material::new(MaterialKind::Standard).shader.is_none());
    }

    #[test]
    fn test_alpha_mode() {
        assert_eq!(AlphaMode::from_name(Some("BLEND")), AlphaMode::Blend);
        assert_eq!(AlphaMode::from_name(Some("weird")), AlphaMode::Opaque);
        assert_eq!(AlphaMode::from_name(None), AlphaMode::Opaque);
    }
}
