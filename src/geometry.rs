//! Decoded primitive geometry
//!
//! A geometry is shared by every mesh whose primitive has the same cache key.
//! Attributes sit behind a lock because final material assignment may add a
//! `uv2` alias and skinned meshes normalize their weights in place.

use crate::attribute::{Attribute, BufferAttribute};
use crate::document::ComponentType;
use crate::error::Result;
use crate::runtime::BoxFuture;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Renderer-facing name for a glTF attribute semantic
pub fn attribute_name(semantic: &str) -> String {
    match semantic {
        "POSITION" => "position".to_string(),
        "NORMAL" => "normal".to_string(),
        "TANGENT" => "tangent".to_string(),
        "TEXCOORD_0" => "uv".to_string(),
        "TEXCOORD_1" => "uv2".to_string(),
        "COLOR_0" => "color".to_string(),
        "WEIGHTS_0" => "skinWeight".to_string(),
        "JOINTS_0" => "skinIndex".to_string(),
        other => other.to_lowercase(),
    }
}

/// Vertex attributes, optional index and morph targets of one primitive
pub struct Geometry {
    pub uuid: Uuid,
    attributes: RwLock<BTreeMap<String, Arc<Attribute>>>,
    index: Option<Arc<Attribute>>,
    morph_attributes: BTreeMap<String, Vec<Arc<Attribute>>>,
    pub user_data: Map<String, Value>,
}

impl Geometry {
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            attributes: RwLock::new(BTreeMap::new()),
            index: None,
            morph_attributes: BTreeMap::new(),
            user_data: Map::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<Arc<Attribute>> {
        self.attributes.read().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.read().contains_key(name)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.read().keys().cloned().collect()
    }

    /// Add or replace an attribute
    pub fn set_attribute(&self, name: impl Into<String>, attribute: Arc<Attribute>) {
        self.attributes.write().insert(name.into(), attribute);
    }

    /// Number of vertices, from the `position` attribute
    pub fn vertex_count(&self) -> usize {
        self.attributes
            .read()
            .get("position")
            .map_or(0, |position| position.count())
    }

    pub fn index(&self) -> Option<&Arc<Attribute>> {
        self.index.as_ref()
    }

    pub fn set_index(&mut self, index: Arc<Attribute>) {
        self.index = Some(index);
    }

    /// Morph target attributes by base attribute name (`position`, `normal`)
    pub fn morph_attributes(&self, name: &str) -> &[Arc<Attribute>] {
        self.morph_attributes
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn set_morph_attributes(&mut self, name: impl Into<String>, targets: Vec<Arc<Attribute>>) {
        self.morph_attributes.insert(name.into(), targets);
    }

    pub fn has_morph_targets(&self) -> bool {
        !self.morph_attributes.is_empty()
    }

    /// Number of morph targets, taken from the first morph attribute
    pub fn morph_target_count(&self) -> usize {
        self.morph_attributes.values().next().map_or(0, Vec::len)
    }

    /// Scale every skin weight so each vertex sums to one
    ///
    /// Vertices whose weights sum to zero get `(1, 0, 0, 0)`.
    pub fn normalize_skin_weights(&self) {
        let Some(weights) = self.attribute("skinWeight") else {
            return;
        };

        let item_size = weights.item_size();
        let mut values = Vec::with_capacity(weights.count() * item_size);
        for i in 0..weights.count() {
            let vertex: Vec<f64> = (0..item_size).map(|c| weights.get(i, c)).collect();
            let sum: f64 = vertex.iter().map(|w| w.abs()).sum();
            if sum == 0.0 {
                values.extend((0..item_size).map(|c| if c == 0 { 1.0 } else { 0.0 }));
            } else {
                values.extend(vertex.iter().map(|w| (w / sum) as f32));
            }
        }
        let normalized = BufferAttribute::from_f32(values, item_size);
        self.set_attribute("skinWeight", Arc::new(Attribute::Buffer(normalized)));
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Geometry")
            .field("uuid", &self.uuid)
            .field("attributes", &self.attribute_names())
            .field("indexed", &self.index.is_some())
            .field("morph_targets", &self.morph_target_count())
            .finish()
    }
}

/// Collaborator for compressed primitives (`KHR_draco_mesh_compression`)
///
/// `attribute_ids` maps renderer attribute names to ids inside the compressed
/// stream and `attribute_types` gives the component type each attribute
/// should decode to.
pub trait GeometryDecompressor: Send + Sync + fmt::Debug {
    fn decode<'a>(
        &'a self,
        data: &'a [u8],
        attribute_ids: &'a BTreeMap<String, u32>,
        attribute_types: &'a BTreeMap<String, ComponentType>,
    ) -> BoxFuture<'a, Result<Geometry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_names() {
        assert_eq!(attribute_name("TEXCOORD_0"), "uv");
        assert_eq!(attribute_name("TEXCOORD_1"), "uv2");
        assert_eq!(attribute_name("JOINTS_0"), "skinIndex");
        assert_eq!(attribute_name("_CUSTOM_DATA"), "_custom_data");
    }

    #[test]
    fn test_set_attribute_visible_through_shared_geometry() {
        let geometry = Arc::new(Geometry::new());
        let other = Arc::clone(&geometry);
        geometry.set_attribute(
            "uv",
            Arc::new(Attribute::Buffer(BufferAttribute::from_f32(vec![0.0; 4], 2))),
        );
        assert!(other.has_attribute("uv"));
    }

    #[test]
    fn test_normalize_skin_weights() {
        let geometry = Geometry::new();
        geometry.set_attribute(
            "skinWeight",
            Arc::new(Attribute::Buffer(BufferAttribute::from_f32(
                vec![2.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                4,
            ))),
        );
        geometry.normalize_skin_weights();
        let weights = geometry.attribute("skinWeight").unwrap().to_f32_vec();
        assert_eq!(weights, vec![0.5, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_morph_target_count() {
        let mut geometry = Geometry::new();
        assert!(!geometry.has_morph_targets());
        let target = Arc::new(Attribute::Buffer(BufferAttribute::from_f32(vec![0.0; 3], 3)));
        geometry.set_morph_attributes("position", vec![Arc::clone(&target), target]);
        assert_eq!(geometry.morph_target_count(), 2);
        assert_eq!(geometry.morph_attributes("position").len(), 2);
        assert!(geometry.morph_attributes("normal").is_empty());
    }
}
