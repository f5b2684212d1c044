//! Canonical keys for the primitive geometry cache
//!
//! Two primitives with the same key decode to the same geometry, which is
//! then shared by every mesh that uses it.

use crate::document::PrimitiveDef;
use crate::extensions::DracoPrimitive;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Key for a primitive's geometry
///
/// Compressed primitives are keyed by their compressed buffer view and
/// attribute ids; others by index accessor, attribute set and draw mode.
pub fn primitive_key(primitive: &PrimitiveDef) -> String {
    // a malformed payload is reported when the primitive is decoded
    if let Ok(Some(draco)) = DracoPrimitive::from_extensions(&primitive.extensions) {
        return format!(
            "draco:{}:{}",
            draco.buffer_view,
            attributes_key(&draco.attributes)
        );
    }

    format!(
        "{}:{}:{}",
        optional(primitive.indices),
        attributes_key(&primitive.attributes),
        optional(primitive.mode)
    )
}

/// Sorted `name:index;` list
pub fn attributes_key<V: std::fmt::Display>(attributes: &BTreeMap<String, V>) -> String {
    attributes.iter().fold(String::new(), |mut key, (name, index)| {
        let _ = write!(key, "{name}:{index};");
        key
    })
}

fn optional<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primitive(json: &str) -> PrimitiveDef {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_key_ignores_attribute_order() {
        let a = primitive(r#"{"attributes":{"POSITION":0,"NORMAL":1},"indices":2}"#);
        let b = primitive(r#"{"attributes":{"NORMAL":1,"POSITION":0},"indices":2}"#);
        assert_eq!(primitive_key(&a), primitive_key(&b));
        assert_eq!(primitive_key(&a), "2:NORMAL:1;POSITION:0;:-");
    }

    #[test]
    fn test_key_includes_mode_and_material_is_ignored() {
        let tris = primitive(r#"{"attributes":{"POSITION":0},"material":0}"#);
        let other_material = primitive(r#"{"attributes":{"POSITION":0},"material":3}"#);
        let points = primitive(r#"{"attributes":{"POSITION":0},"mode":0}"#);
        assert_eq!(primitive_key(&tris), primitive_key(&other_material));
        assert_ne!(primitive_key(&tris), primitive_key(&points));
    }

    #[test]
    fn test_draco_key() {
        let prim = primitive(
            r#"{"attributes":{"POSITION":0},"extensions":{"KHR_draco_mesh_compression":{"bufferView":4,"attributes":{"POSITION":1}}}}"#,
        );
        assert_eq!(primitive_key(&prim), "draco:4:POSITION:1;");
    }
}
