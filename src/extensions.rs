//! Known glTF extensions and their per-object payloads
//!
//! The set of extensions the decoder understands is closed. Which of them are
//! active for a given asset is decided once, from `extensionsUsed`, when the
//! parser is created.

use crate::document::{Document, Extensions, MaterialDef, NodeDef, TextureInfo};
use crate::error::{DecodeError, Result};
use crate::material::MaterialKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Extensions with built-in support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KnownExtension {
    DracoMeshCompression,
    LightsPunctual,
    MaterialsPbrSpecularGlossiness,
    MaterialsUnlit,
    TextureDds,
    TextureTransform,
}

impl KnownExtension {
    pub const ALL: [KnownExtension; 6] = [
        Self::DracoMeshCompression,
        Self::LightsPunctual,
        Self::MaterialsPbrSpecularGlossiness,
        Self::MaterialsUnlit,
        Self::TextureDds,
        Self::TextureTransform,
    ];

    /// The registered extension name
    pub fn name(self) -> &'static str {
        match self {
            Self::DracoMeshCompression => "KHR_draco_mesh_compression",
            Self::LightsPunctual => "KHR_lights_punctual",
            Self::MaterialsPbrSpecularGlossiness => "KHR_materials_pbrSpecularGlossiness",
            Self::MaterialsUnlit => "KHR_materials_unlit",
            Self::TextureDds => "MSFT_texture_dds",
            Self::TextureTransform => "KHR_texture_transform",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ext| ext.name() == name)
    }
}

/// Which collaborators the loader was configured with
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionSupport {
    pub geometry_decompressor: bool,
    pub dds_loader: bool,
    /// Fail on unknown entries of `extensionsRequired` instead of warning
    pub strict: bool,
}

/// Extensions active for one asset
#[derive(Debug, Clone, Default)]
pub struct ExtensionSet {
    enabled: BTreeSet<KnownExtension>,
    required: BTreeSet<KnownExtension>,
}

impl ExtensionSet {
    /// Activate every known extension listed in `extensionsUsed`
    ///
    /// Extensions that need a collaborator fail with
    /// [`DecodeError::MissingDependencyExtension`] when it is missing.
    pub fn configure(document: &Document, support: ExtensionSupport) -> Result<Self> {
        let mut enabled = BTreeSet::new();
        let mut required = BTreeSet::new();

        for name in &document.extensions_used {
            let Some(extension) = KnownExtension::from_name(name) else {
                if document.extensions_required.iter().any(|r| r == name) {
                    if support.strict {
                        return Err(DecodeError::format(format!(
                            "Unknown required extension \"{name}\""
                        )));
                    }
                    log::warn!("Unknown extension \"{name}\" is required but not supported");
                }
                continue;
            };

            match extension {
                KnownExtension::DracoMeshCompression if !support.geometry_decompressor => {
                    return Err(DecodeError::MissingDependencyExtension {
                        extension: name.clone(),
                        requirement: "a geometry decompressor".to_string(),
                    });
                }
                KnownExtension::TextureDds if !support.dds_loader => {
                    return Err(DecodeError::MissingDependencyExtension {
                        extension: name.clone(),
                        requirement: "a DDS texture loader".to_string(),
                    });
                }
                _ => {}
            }
            if document.extensions_required.iter().any(|r| r == name) {
                required.insert(extension);
            }
            enabled.insert(extension);
        }

        Ok(Self { enabled, required })
    }

    pub fn with(extensions: impl IntoIterator<Item = KnownExtension>) -> Self {
        Self {
            enabled: extensions.into_iter().collect(),
            required: BTreeSet::new(),
        }
    }

    pub fn is_enabled(&self, extension: KnownExtension) -> bool {
        self.enabled.contains(&extension)
    }

    /// True for active extensions also listed in `extensionsRequired`
    pub fn is_required(&self, extension: KnownExtension) -> bool {
        self.required.contains(&extension)
    }

    pub fn iter(&self) -> impl Iterator<Item = KnownExtension> + '_ {
        self.enabled.iter().copied()
    }

    /// The entries of `extensions` that are not handled, keyed by name
    pub fn unknown(&self, extensions: &Extensions) -> Map<String, Value> {
        extensions
            .iter()
            .filter(|(name, _)| {
                KnownExtension::from_name(name).map_or(true, |ext| !self.is_enabled(ext))
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// Deserialize the payload of `extension` from an extension map
pub fn parse_extension<T: DeserializeOwned>(
    extensions: &Extensions,
    extension: KnownExtension,
) -> Result<Option<T>> {
    extensions
        .get(extension.name())
        .map(|value| {
            serde_json::from_value(value.clone()).map_err(|err| {
                DecodeError::format(format!("Invalid {} payload: {err}", extension.name()))
            })
        })
        .transpose()
}

/// Material extension that replaces the default metal-roughness model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialExtension {
    Unlit,
    SpecularGlossiness,
}

impl MaterialExtension {
    /// Specular-glossiness wins over unlit when both are present
    pub fn for_material(material: &MaterialDef) -> Option<Self> {
        let has = |ext: KnownExtension| material.extensions.contains_key(ext.name());
        if has(KnownExtension::MaterialsPbrSpecularGlossiness) {
            Some(Self::SpecularGlossiness)
        } else if has(KnownExtension::MaterialsUnlit) {
            Some(Self::Unlit)
        } else {
            None
        }
    }

    pub fn extension(self) -> KnownExtension {
        match self {
            Self::Unlit => KnownExtension::MaterialsUnlit,
            Self::SpecularGlossiness => KnownExtension::MaterialsPbrSpecularGlossiness,
        }
    }

    /// Kind of material this extension produces
    pub fn material_kind(self) -> MaterialKind {
        match self {
            Self::Unlit => MaterialKind::Basic,
            Self::SpecularGlossiness => MaterialKind::SpecularGlossiness,
        }
    }
}

/// `KHR_materials_pbrSpecularGlossiness` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecularGlossinessDef {
    #[serde(default)]
    pub diffuse_factor: Option<[f32; 4]>,
    #[serde(default)]
    pub diffuse_texture: Option<TextureInfo>,
    #[serde(default)]
    pub specular_factor: Option<[f32; 3]>,
    #[serde(default)]
    pub glossiness_factor: Option<f32>,
    #[serde(default)]
    pub specular_glossiness_texture: Option<TextureInfo>,
}

/// `KHR_texture_transform` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureTransformDef {
    #[serde(default)]
    pub offset: Option<[f32; 2]>,
    #[serde(default)]
    pub rotation: Option<f32>,
    #[serde(default)]
    pub scale: Option<[f32; 2]>,
    #[serde(default)]
    pub tex_coord: Option<u32>,
}

/// `KHR_draco_mesh_compression` primitive payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DracoPrimitive {
    pub buffer_view: usize,
    #[serde(default)]
    pub attributes: BTreeMap<String, u32>,
}

impl DracoPrimitive {
    /// Payload of a primitive's extension map, if present
    pub fn from_extensions(extensions: &Extensions) -> Result<Option<Self>> {
        parse_extension(extensions, KnownExtension::DracoMeshCompression)
    }
}

/// `MSFT_texture_dds` texture payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextureDdsDef {
    #[serde(default)]
    pub source: Option<usize>,
}

/// One entry of the root `KHR_lights_punctual.lights` array
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightDef {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub color: Option<[f32; 3]>,
    #[serde(default)]
    pub intensity: Option<f32>,
    #[serde(default)]
    pub range: Option<f32>,
    #[serde(default)]
    pub spot: Option<SpotDef>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotDef {
    #[serde(default)]
    pub inner_cone_angle: Option<f32>,
    #[serde(default)]
    pub outer_cone_angle: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LightsRoot {
    #[serde(default)]
    lights: Vec<LightDef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NodeLight {
    light: Option<usize>,
}

/// Light definitions declared at the document root
pub fn document_lights(document: &Document) -> Result<Vec<LightDef>> {
    Ok(
        parse_extension::<LightsRoot>(&document.extensions, KnownExtension::LightsPunctual)?
            .unwrap_or_default()
            .lights,
    )
}

/// Light index referenced by a node
pub fn node_light(node: &NodeDef) -> Result<Option<usize>> {
    Ok(
        parse_extension::<NodeLight>(&node.extensions, KnownExtension::LightsPunctual)?
            .and_then(|ext| ext.light),
    )
}
