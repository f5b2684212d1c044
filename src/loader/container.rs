//! Binary glTF (`.glb`) container splitting
//!
//! Layout: a 12 byte header (magic, version, total length) followed by
//! chunks of `[length u32][type u32][payload]`, all little-endian and padded
//! to 4 bytes.

use crate::error::{DecodeError, Result};
use bytemuck::pod_read_unaligned;
use std::sync::Arc;

/// `glTF` as a little-endian u32
pub const GLB_MAGIC: u32 = 0x4654_6C67;
pub const GLB_HEADER_LENGTH: usize = 12;
pub const CHUNK_HEADER_LENGTH: usize = 8;
pub const CHUNK_TYPE_JSON: u32 = 0x4E4F_534A;
pub const CHUNK_TYPE_BIN: u32 = 0x004E_4942;

/// Parsed 12 byte GLB header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlbHeader {
    pub magic: u32,
    pub version: u32,
    pub length: u32,
}

/// A split binary container
#[derive(Debug, Clone)]
pub struct GlbContainer {
    pub header: GlbHeader,
    pub json: String,
    /// Payload of the BIN chunk, the default body of buffer 0
    pub body: Option<Arc<[u8]>>,
}

/// True when `data` starts with the GLB magic
pub fn is_glb(data: &[u8]) -> bool {
    data.len() >= 4 && read_u32(data, 0) == GLB_MAGIC
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le(pod_read_unaligned(&data[offset..offset + 4]))
}

impl GlbContainer {
    /// Split a binary container into its JSON text and binary body
    pub fn split(data: &[u8]) -> Result<Self> {
        if data.len() < GLB_HEADER_LENGTH {
            return Err(DecodeError::format("Binary glTF header is truncated"));
        }

        let header = GlbHeader {
            magic: read_u32(data, 0),
            version: read_u32(data, 4),
            length: read_u32(data, 8),
        };

        if header.magic != GLB_MAGIC {
            return Err(DecodeError::format("Unsupported binary glTF header"));
        }
        if header.version < 2 {
            return Err(DecodeError::format(format!(
                "Legacy binary file detected (version {})",
                header.version
            )));
        }

        let end = (header.length as usize).min(data.len());
        if (header.length as usize) > data.len() {
            log::warn!(
                "Binary glTF declares {} bytes but only {} are present",
                header.length,
                data.len()
            );
        }

        let mut json = None;
        let mut body = None;
        let mut offset = GLB_HEADER_LENGTH;

        while offset + CHUNK_HEADER_LENGTH <= end {
            let chunk_length = read_u32(data, offset) as usize;
            let chunk_type = read_u32(data, offset + 4);
            offset += CHUNK_HEADER_LENGTH;

            let chunk_end = offset
                .checked_add(chunk_length)
                .filter(|e| *e <= end)
                .ok_or_else(|| DecodeError::format("Binary glTF chunk exceeds file length"))?;
            let payload = &data[offset..chunk_end];

            match chunk_type {
                CHUNK_TYPE_JSON => {
                    let text = std::str::from_utf8(payload).map_err(|err| {
                        DecodeError::format(format!("JSON chunk is not UTF-8: {err}"))
                    })?;
                    json = Some(text.to_string());
                }
                CHUNK_TYPE_BIN => body = Some(Arc::from(payload)),
                other => log::debug!("Skipping unknown GLB chunk type {other:#010x}"),
            }

            offset = chunk_end;
        }

        let json = json.ok_or_else(|| DecodeError::format("JSON content not found"))?;

        Ok(Self { header, json, body })
    }

    /// Serialize back to a binary container
    ///
    /// The JSON chunk is padded with spaces and the BIN chunk with zeros.
    pub fn to_vec(&self) -> Vec<u8> {
        let json = padded(self.json.as_bytes(), b' ');
        let body = self.body.as_deref().map(|b| padded(b, 0));

        let mut length = GLB_HEADER_LENGTH + CHUNK_HEADER_LENGTH + json.len();
        if let Some(body) = &body {
            length += CHUNK_HEADER_LENGTH + body.len();
        }

        let mut out = Vec::with_capacity(length);
        out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
        out.extend_from_slice(&self.header.version.max(2).to_le_bytes());
        out.extend_from_slice(&(length as u32).to_le_bytes());

        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_TYPE_JSON.to_le_bytes());
        out.extend_from_slice(&json);

        if let Some(body) = body {
            out.extend_from_slice(&(body.len() as u32).to_le_bytes());
            out.extend_from_slice(&CHUNK_TYPE_BIN.to_le_bytes());
            out.extend_from_slice(&body);
        }

        out
    }

    /// Build a container from JSON text and an optional body
    pub fn new(json: impl Into<String>, body: Option<Vec<u8>>) -> Self {
        let mut container = Self {
            header: GlbHeader {
                magic: GLB_MAGIC,
                version: 2,
                length: 0,
            },
            json: json.into(),
            body: body.map(Arc::from),
        };
        container.header.length = container.to_vec().len() as u32;
        container
    }
}

fn padded(data: &[u8], fill: u8) -> Vec<u8> {
    let mut out = data.to_vec();
    while out.len() % 4 != 0 {
        out.push(fill);
    }
    out
}
