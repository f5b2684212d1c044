//! Integration tests for material decoding and assignment

mod common;

use archetype_gltf::material::default_material;
use archetype_gltf::{AlphaMode, GltfLoader, MaterialKind};
use futures::executor::block_on;
use std::sync::Arc;

#[test]
fn test_mask_without_cutoff_defaults_to_half() {
    let json = r#"{"asset":{"version":"2.0"},"materials":[{"alphaMode":"MASK"}]}"#;
    let parser = GltfLoader::new().parser(json, "").unwrap();
    let material = block_on(parser.material(0)).unwrap();
    assert_eq!(material.alpha_mode, AlphaMode::Mask);
    assert_eq!(material.alpha_test, 0.5);
}

#[test]
fn test_explicit_cutoff() {
    let json = r#"{"asset":{"version":"2.0"},"materials":[{"alphaMode":"MASK","alphaCutoff":0.25}]}"#;
    let parser = GltfLoader::new().parser(json, "").unwrap();
    assert_eq!(block_on(parser.material(0)).unwrap().alpha_test, 0.25);
}

#[test]
fn test_primitives_without_material_use_default() {
    let (body, views) = common::triangle();
    let json = format!(
        r#"{{"asset":{{"version":"2.0"}},
            "buffers":[{{"byteLength":{len}}}],
            "bufferViews":[{views}],
            "accessors":[{accessors}],
            "meshes":[
                {{"primitives":[{{"attributes":{{"POSITION":0,"NORMAL":0}}}}]}},
                {{"primitives":[{{"attributes":{{"POSITION":0}},"indices":1}}]}},
                {{"primitives":[{{"attributes":{{"POSITION":0}},"indices":1}}]}}]}}"#,
        len = body.len(),
        accessors = common::TRIANGLE_ACCESSORS,
    );
    let parser = common::parser(&json, body.bytes);

    let default = default_material();
    let smooth = block_on(parser.mesh(0)).unwrap();
    assert!(Arc::ptr_eq(&smooth.renderables[0].material, &default));

    // no normals: a flat-shaded copy, shared by every such primitive
    let flat = block_on(parser.mesh(1)).unwrap();
    let again = block_on(parser.mesh(2)).unwrap();
    let flat_material = &flat.renderables[0].material;
    assert!(flat_material.flat_shading);
    assert!(!default.flat_shading);
    assert_eq!(flat_material.kind, MaterialKind::Standard);
    assert!(Arc::ptr_eq(flat_material, &again.renderables[0].material));
    assert!(!Arc::ptr_eq(
        &smooth.renderables[0].geometry,
        &flat.renderables[0].geometry
    ));
}

#[test]
fn test_point_primitives_get_point_material() {
    let (body, views) = common::triangle();
    let json = format!(
        r#"{{"asset":{{"version":"2.0"}},
            "buffers":[{{"byteLength":{len}}}],
            "bufferViews":[{views}],
            "accessors":[{accessors}],
            "materials":[{{"pbrMetallicRoughness":{{"baseColorFactor":[1,0,0,1]}}}}],
            "meshes":[{{"primitives":[
                {{"attributes":{{"POSITION":0}},"material":0,"mode":0}},
                {{"attributes":{{"POSITION":0}},"material":0,"mode":0}}]}}]}}"#,
        len = body.len(),
        accessors = common::TRIANGLE_ACCESSORS,
    );
    let parser = common::parser(&json, body.bytes);
    let mesh = block_on(parser.mesh(0)).unwrap();

    let points = &mesh.renderables[0].material;
    assert_eq!(points.kind, MaterialKind::Points);
    assert_eq!(points.color, [1.0, 0.0, 0.0]);
    assert!(Arc::ptr_eq(points, &mesh.renderables[1].material));

    let base = block_on(parser.material(0)).unwrap();
    assert_eq!(base.kind, MaterialKind::Standard);
}
