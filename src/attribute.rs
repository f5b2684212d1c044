//! Typed vertex data: buffer slices, typed arrays and (interleaved) attributes

use crate::document::ComponentType;
use crate::error::{DecodeError, Result};
use bytemuck::pod_read_unaligned;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;

/// A byte range over shared buffer storage
///
/// Buffer views slice their buffer without copying.
#[derive(Clone)]
pub struct BufferSlice {
    data: Arc<[u8]>,
    start: usize,
    end: usize,
}

impl BufferSlice {
    /// Wrap a whole buffer
    pub fn new(data: Arc<[u8]>) -> Self {
        let end = data.len();
        Self {
            data,
            start: 0,
            end,
        }
    }

    /// Sub-slice relative to this slice, bounds-checked
    pub fn slice(&self, offset: usize, length: usize) -> Result<Self> {
        let end = self
            .start
            .checked_add(offset)
            .and_then(|start| start.checked_add(length))
            .filter(|end| *end <= self.end)
            .ok_or_else(|| {
                DecodeError::format(format!(
                    "Range {offset}..{} exceeds buffer of {} bytes",
                    offset.saturating_add(length),
                    self.len()
                ))
            })?;
        Ok(Self {
            data: Arc::clone(&self.data),
            start: end - length,
            end,
        })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when both slices view the same underlying buffer
    pub fn shares_storage(&self, other: &BufferSlice) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Deref for BufferSlice {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }
}

impl fmt::Debug for BufferSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferSlice")
            .field("start", &self.start)
            .field("len", &self.len())
            .finish()
    }
}

/// Component storage, one variant per glTF component type
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

impl TypedArray {
    /// Decode little-endian components; trailing partial components are ignored
    pub fn from_le_bytes(component_type: ComponentType, bytes: &[u8]) -> Self {
        match component_type {
            ComponentType::I8 => Self::I8(bytes.iter().map(|b| *b as i8).collect()),
            ComponentType::U8 => Self::U8(bytes.to_vec()),
            ComponentType::I16 => Self::I16(
                bytes
                    .chunks_exact(2)
                    .map(|c| i16::from_le(pod_read_unaligned(c)))
                    .collect(),
            ),
            ComponentType::U16 => Self::U16(
                bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le(pod_read_unaligned(c)))
                    .collect(),
            ),
            ComponentType::U32 => Self::U32(
                bytes
                    .chunks_exact(4)
                    .map(|c| u32::from_le(pod_read_unaligned(c)))
                    .collect(),
            ),
            ComponentType::F32 => Self::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_bits(u32::from_le(pod_read_unaligned(c))))
                    .collect(),
            ),
        }
    }

    /// A zero-filled array of `len` components
    pub fn zeroed(component_type: ComponentType, len: usize) -> Self {
        match component_type {
            ComponentType::I8 => Self::I8(vec![0; len]),
            ComponentType::U8 => Self::U8(vec![0; len]),
            ComponentType::I16 => Self::I16(vec![0; len]),
            ComponentType::U16 => Self::U16(vec![0; len]),
            ComponentType::U32 => Self::U32(vec![0; len]),
            ComponentType::F32 => Self::F32(vec![0.0; len]),
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            Self::I8(_) => ComponentType::I8,
            Self::U8(_) => ComponentType::U8,
            Self::I16(_) => ComponentType::I16,
            Self::U16(_) => ComponentType::U16,
            Self::U32(_) => ComponentType::U32,
            Self::F32(_) => ComponentType::F32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::I8(v) => v.len(),
            Self::U8(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw component value; out-of-range reads yield 0
    pub fn get(&self, index: usize) -> f64 {
        match self {
            Self::I8(v) => v.get(index).map_or(0.0, |x| *x as f64),
            Self::U8(v) => v.get(index).map_or(0.0, |x| *x as f64),
            Self::I16(v) => v.get(index).map_or(0.0, |x| *x as f64),
            Self::U16(v) => v.get(index).map_or(0.0, |x| *x as f64),
            Self::U32(v) => v.get(index).map_or(0.0, |x| *x as f64),
            Self::F32(v) => v.get(index).map_or(0.0, |x| *x as f64),
        }
    }

    /// Store a component, converting with saturation; out-of-range writes are ignored
    pub fn set(&mut self, index: usize, value: f64) {
        match self {
            Self::I8(v) => store(v, index, value as i8),
            Self::U8(v) => store(v, index, value as u8),
            Self::I16(v) => store(v, index, value as i16),
            Self::U16(v) => store(v, index, value as u16),
            Self::U32(v) => store(v, index, value as u32),
            Self::F32(v) => store(v, index, value as f32),
        }
    }

    /// Components widened to f32
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            Self::F32(v) => v.clone(),
            _ => (0..self.len()).map(|i| self.get(i) as f32).collect(),
        }
    }

    /// Borrow the components when they are already f32
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::F32(v) => Some(v),
            _ => None,
        }
    }
}

fn store<T>(items: &mut [T], index: usize, value: T) {
    if let Some(slot) = items.get_mut(index) {
        *slot = value;
    }
}

/// Tightly packed vertex attribute
#[derive(Debug, Clone, PartialEq)]
pub struct BufferAttribute {
    pub array: TypedArray,
    pub item_size: usize,
    pub normalized: bool,
    pub name: Option<String>,
}

impl BufferAttribute {
    pub fn new(array: TypedArray, item_size: usize, normalized: bool) -> Self {
        Self {
            array,
            item_size: item_size.max(1),
            normalized,
            name: None,
        }
    }

    pub fn from_f32(values: Vec<f32>, item_size: usize) -> Self {
        Self::new(TypedArray::F32(values), item_size, false)
    }

    pub fn count(&self) -> usize {
        self.array.len() / self.item_size
    }

    pub fn get(&self, index: usize, component: usize) -> f64 {
        self.array.get(index * self.item_size + component)
    }

    pub fn set(&mut self, index: usize, component: usize, value: f64) {
        self.array.set(index * self.item_size + component, value);
    }
}

/// Vertex data shared by several interleaved attributes
///
/// `stride` is measured in components, not bytes.
#[derive(Debug)]
pub struct InterleavedBuffer {
    pub uuid: Uuid,
    pub array: TypedArray,
    pub stride: usize,
}

impl InterleavedBuffer {
    pub fn new(array: TypedArray, stride: usize) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            array,
            stride: stride.max(1),
        }
    }
}

/// Attribute reading every `stride` components of an [`InterleavedBuffer`]
#[derive(Debug, Clone)]
pub struct InterleavedBufferAttribute {
    pub data: Arc<InterleavedBuffer>,
    pub item_size: usize,
    /// Offset of the first component inside each stride
    pub offset: usize,
    pub normalized: bool,
    pub count: usize,
}

impl InterleavedBufferAttribute {
    pub fn get(&self, index: usize, component: usize) -> f64 {
        self.data
            .array
            .get(index * self.data.stride + self.offset + component)
    }
}

/// Decoded accessor data
#[derive(Debug, Clone)]
pub enum Attribute {
    Buffer(BufferAttribute),
    Interleaved(InterleavedBufferAttribute),
}

impl Attribute {
    pub fn item_size(&self) -> usize {
        match self {
            Self::Buffer(attr) => attr.item_size,
            Self::Interleaved(attr) => attr.item_size,
        }
    }

    /// Number of elements
    pub fn count(&self) -> usize {
        match self {
            Self::Buffer(attr) => attr.count(),
            Self::Interleaved(attr) => attr.count,
        }
    }

    pub fn normalized(&self) -> bool {
        match self {
            Self::Buffer(attr) => attr.normalized,
            Self::Interleaved(attr) => attr.normalized,
        }
    }

    pub fn set_normalized(&mut self, normalized: bool) {
        match self {
            Self::Buffer(attr) => attr.normalized = normalized,
            Self::Interleaved(attr) => attr.normalized = normalized,
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            Self::Buffer(attr) => attr.array.component_type(),
            Self::Interleaved(attr) => attr.data.array.component_type(),
        }
    }

    pub fn is_interleaved(&self) -> bool {
        matches!(self, Self::Interleaved(_))
    }

    /// Raw component `component` of element `index`
    pub fn get(&self, index: usize, component: usize) -> f64 {
        match self {
            Self::Buffer(attr) => attr.get(index, component),
            Self::Interleaved(attr) => attr.get(index, component),
        }
    }

    /// All logical components in element order, widened to f32
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            Self::Buffer(attr) => attr.array.to_f32_vec(),
            Self::Interleaved(attr) => (0..attr.count)
                .flat_map(|i| (0..attr.item_size).map(move |c| (i, c)))
                .map(|(i, c)| attr.get(i, c) as f32)
                .collect(),
        }
    }

    /// Dense copy of this attribute; interleaved data is de-interleaved
    pub fn to_buffer_attribute(&self) -> BufferAttribute {
        match self {
            Self::Buffer(attr) => attr.clone(),
            Self::Interleaved(attr) => {
                let mut array = TypedArray::zeroed(
                    attr.data.array.component_type(),
                    attr.count * attr.item_size,
                );
                for i in 0..attr.count {
                    for c in 0..attr.item_size {
                        array.set(i * attr.item_size + c, attr.get(i, c));
                    }
                }
                BufferAttribute::new(array, attr.item_size, attr.normalized)
            }
        }
    }
}
