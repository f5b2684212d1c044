//! Fixture helpers shared by the integration tests

#![allow(dead_code)]

use archetype_gltf::loader::GlbContainer;
use archetype_gltf::{GltfLoader, GltfParser};

/// Little-endian binary body assembled view by view
#[derive(Default)]
pub struct Body {
    pub bytes: Vec<u8>,
}

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `f32` data, returning its `(byteOffset, byteLength)`
    pub fn f32s(&mut self, values: &[f32]) -> (usize, usize) {
        self.push(values.iter().flat_map(|v| v.to_le_bytes()).collect())
    }

    pub fn u16s(&mut self, values: &[u16]) -> (usize, usize) {
        self.push(values.iter().flat_map(|v| v.to_le_bytes()).collect())
    }

    pub fn u8s(&mut self, values: &[u8]) -> (usize, usize) {
        self.push(values.to_vec())
    }

    fn push(&mut self, data: Vec<u8>) -> (usize, usize) {
        while self.bytes.len() % 4 != 0 {
            self.bytes.push(0);
        }
        let offset = self.bytes.len();
        let length = data.len();
        self.bytes.extend(data);
        (offset, length)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// Binary container around `json` and an optional body
pub fn glb(json: &str, body: Option<Vec<u8>>) -> Vec<u8> {
    GlbContainer::new(json, body).to_vec()
}

/// Parser for a binary container built from `json` and `body`
pub fn parser(json: &str, body: Vec<u8>) -> GltfParser {
    GltfLoader::new()
        .parser(glb(json, Some(body)), "")
        .expect("fixture document is valid")
}

/// A triangle: positions at view 0, u16 indices at view 1
pub fn triangle() -> (Body, String) {
    let mut body = Body::new();
    let (pos_offset, pos_len) = body.f32s(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    let (idx_offset, idx_len) = body.u16s(&[0, 1, 2]);
    let views = format!(
        r#"{{"buffer":0,"byteOffset":{pos_offset},"byteLength":{pos_len}}},
           {{"buffer":0,"byteOffset":{idx_offset},"byteLength":{idx_len}}}"#
    );
    (body, views)
}

pub const TRIANGLE_ACCESSORS: &str = r#"
    {"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0,0,0],"max":[1,1,0]},
    {"bufferView":1,"componentType":5123,"count":3,"type":"SCALAR"}"#;
