use super::GltfParser;
use crate::attribute::{
    Attribute, BufferAttribute, BufferSlice, InterleavedBuffer, InterleavedBufferAttribute,
    TypedArray,
};
use crate::document::{self, AccessorDef, ComponentType, SparseDef};
use crate::error::{DecodeError, Result};
use std::sync::Arc;

impl GltfParser {
    pub(super) async fn load_accessor(&self, index: usize) -> Result<Option<Arc<Attribute>>> {
        let def = document::get(&self.document().accessors, index, "accessor")?;

        if def.buffer_view.is_none() && def.sparse.is_none() {
            return Ok(None);
        }

        let item_size = def.kind.item_size();
        let element_bytes = def.component_type.size();
        let byte_offset = def.byte_offset.unwrap_or(0);

        let mut attribute = match def.buffer_view {
            None => Attribute::Buffer(BufferAttribute::new(
                TypedArray::zeroed(def.component_type, checked_size(def.count, item_size)?),
                item_size,
                def.normalized,
            )),
            Some(view_index) => {
                let view = self.buffer_view(view_index).await?;
                let byte_stride =
                    document::get(&self.document().buffer_views, view_index, "bufferView")?
                        .byte_stride;
                match byte_stride {
                    Some(stride) if stride != element_bytes * item_size && stride > 0 => {
                        self.interleaved_attribute(def, view_index, &view, stride)?
                    }
                    _ => {
                        let length = checked_size(def.count, item_size * element_bytes)?;
                        let bytes = view.slice(byte_offset, length)?;
                        Attribute::Buffer(BufferAttribute::new(
                            TypedArray::from_le_bytes(def.component_type, &bytes),
                            item_size,
                            def.normalized,
                        ))
                    }
                }
            }
        };

        if let Some(sparse) = &def.sparse {
            attribute = self.apply_sparse(attribute, def, sparse).await?;
        }

        Ok(Some(Arc::new(attribute)))
    }

    /// Attribute reading a strided view through a shared interleaved buffer
    ///
    /// Accessors over the same stride slice of a view share one buffer.
    fn interleaved_attribute(
        &self,
        def: &AccessorDef,
        view_index: usize,
        view: &BufferSlice,
        byte_stride: usize,
    ) -> Result<Attribute> {
        let element_bytes = def.component_type.size();
        let byte_offset = def.byte_offset.unwrap_or(0);
        let slice = byte_offset / byte_stride;
        let key = format!(
            "InterleavedBuffer:{view_index}:{}:{slice}:{}",
            def.component_type.gl_enum(),
            def.count
        );

        let start = slice * byte_stride;
        let Some(available) = view.len().checked_sub(start) else {
            return Err(DecodeError::format(format!(
                "Accessor offset {byte_offset} exceeds bufferView {view_index}"
            )));
        };
        // the last element need not span a whole stride
        let needed = match def.count.checked_sub(1) {
            None => 0,
            Some(last) => checked_size(last, byte_stride)?
                .checked_add(byte_offset % byte_stride + def.kind.item_size() * element_bytes)
                .ok_or_else(|| overflow(def.count, byte_stride))?,
        };
        if needed > available {
            return Err(DecodeError::format(format!(
                "Accessor needs {needed} bytes of bufferView {view_index}, {available} available"
            )));
        }

        let buffer = self.state.interleaved.get_or_try_insert_with(key, || {
            let length = checked_size(def.count, byte_stride)?.min(available);
            let bytes = view.slice(start, length)?;
            Ok(InterleavedBuffer::new(
                TypedArray::from_le_bytes(def.component_type, &bytes),
                byte_stride / element_bytes,
            ))
        })?;

        Ok(Attribute::Interleaved(InterleavedBufferAttribute {
            data: buffer,
            item_size: def.kind.item_size(),
            offset: (byte_offset % byte_stride) / element_bytes,
            normalized: def.normalized,
            count: def.count,
        }))
    }

    /// Overlay sparse index/value pairs onto a dense copy of `base`
    async fn apply_sparse(
        &self,
        base: Attribute,
        def: &AccessorDef,
        sparse: &SparseDef,
    ) -> Result<Attribute> {
        let item_size = def.kind.item_size();

        let (indices_view, values_view) = futures::try_join!(
            self.buffer_view(sparse.indices.buffer_view),
            self.buffer_view(sparse.values.buffer_view)
        )?;

        let indices = read_components(
            &indices_view,
            sparse.indices.byte_offset.unwrap_or(0),
            sparse.indices.component_type,
            sparse.count,
        )?;
        let values = read_components(
            &values_view,
            sparse.values.byte_offset.unwrap_or(0),
            def.component_type,
            checked_size(sparse.count, item_size)?,
        )?;

        let mut dense = base.to_buffer_attribute();
        for i in 0..sparse.count {
            let target = indices.get(i) as usize;
            if target >= def.count {
                log::warn!("Sparse index {target} exceeds accessor count {}", def.count);
                continue;
            }
            for c in 0..item_size {
                dense.set(target, c, values.get(i * item_size + c));
            }
        }

        Ok(Attribute::Buffer(dense))
    }
}

fn read_components(
    view: &BufferSlice,
    byte_offset: usize,
    component_type: ComponentType,
    count: usize,
) -> Result<TypedArray> {
    let bytes = view.slice(byte_offset, checked_size(count, component_type.size())?)?;
    Ok(TypedArray::from_le_bytes(component_type, &bytes))
}

/// `count * width` for sizes taken from the document
fn checked_size(count: usize, width: usize) -> Result<usize> {
    count
        .checked_mul(width)
        .ok_or_else(|| overflow(count, width))
}

fn overflow(count: usize, width: usize) -> DecodeError {
    DecodeError::format(format!("Accessor size {count} x {width} overflows"))
}

#[cfg(test)]
mod tests {
    use crate::attribute::Attribute;
    use crate::parser::tests::parser_for;
    use futures::executor::block_on;
    use std::sync::Arc;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_packed_accessor() {
        let body = f32_bytes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":24}],
                "bufferViews":[{"buffer":0,"byteLength":24}],
                "accessors":[{"bufferView":0,"byteOffset":12,"componentType":5126,"count":1,"type":"VEC3"}]}"#,
            Some(body),
        );
        let attribute = block_on(parser.accessor(0)).unwrap().unwrap();
        assert_eq!(attribute.to_f32_vec(), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_accessor_without_data_is_absent() {
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},
                "accessors":[{"componentType":5126,"count":3,"type":"VEC3"}]}"#,
            None,
        );
        assert!(block_on(parser.accessor(0)).unwrap().is_none());
    }

    #[test]
    fn test_out_of_bounds_accessor() {
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":8}],
                "bufferViews":[{"buffer":0,"byteLength":8}],
                "accessors":[{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3"}]}"#,
            Some(vec![0; 8]),
        );
        assert!(block_on(parser.accessor(0)).unwrap_err().is_format());
    }

    #[test]
    fn test_overflowing_accessor_geometry() {
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":16}],
                "bufferViews":[{"buffer":0,"byteOffset":4,"byteLength":12}],
                "accessors":[
                    {"bufferView":0,"byteOffset":18446744073709551615,"componentType":5121,"count":1,"type":"SCALAR"},
                    {"bufferView":0,"componentType":5126,"count":4611686018427387904,"type":"VEC4"}
                ]}"#,
            Some(vec![0; 16]),
        );
        assert!(block_on(parser.accessor(0)).unwrap_err().is_format());
        assert!(block_on(parser.accessor(1)).unwrap_err().is_format());
    }

    #[test]
    fn test_interleaved_accessor_past_view_end() {
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":32}],
                "bufferViews":[{"buffer":0,"byteLength":32,"byteStride":16}],
                "accessors":[
                    {"bufferView":0,"byteOffset":8,"componentType":5126,"count":3,"type":"VEC2"},
                    {"bufferView":0,"byteOffset":8,"componentType":5126,"count":2,"type":"VEC2"},
                    {"bufferView":0,"byteOffset":12,"componentType":5126,"count":2,"type":"VEC2"}
                ]}"#,
            Some(vec![0; 32]),
        );
        assert!(block_on(parser.accessor(0)).unwrap_err().is_format());
        let last_fits = block_on(parser.accessor(1)).unwrap().unwrap();
        assert_eq!(last_fits.count(), 2);
        // same stride slice as the accessor above, but its last element overruns
        assert!(block_on(parser.accessor(2)).unwrap_err().is_format());
    }

    #[test]
    fn test_interleaved_accessors_share_buffer() {
        // two vertices of [x, y, u, v]
        let body = f32_bytes(&[1.0, 2.0, 0.1, 0.2, 3.0, 4.0, 0.3, 0.4]);
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":32}],
                "bufferViews":[{"buffer":0,"byteLength":32,"byteStride":16}],
                "accessors":[
                    {"bufferView":0,"componentType":5126,"count":2,"type":"VEC2"},
                    {"bufferView":0,"byteOffset":8,"componentType":5126,"count":2,"type":"VEC2"}
                ]}"#,
            Some(body),
        );
        let position = block_on(parser.accessor(0)).unwrap().unwrap();
        let uv = block_on(parser.accessor(1)).unwrap().unwrap();
        assert_eq!(position.to_f32_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(uv.to_f32_vec(), vec![0.1, 0.2, 0.3, 0.4]);
        match (&*position, &*uv) {
            (Attribute::Interleaved(a), Attribute::Interleaved(b)) => {
                assert!(Arc::ptr_eq(&a.data, &b.data));
                assert_eq!(b.offset, 2);
            }
            _ => panic!("expected interleaved attributes"),
        }
    }

    #[test]
    fn test_sparse_without_buffer_view() {
        let mut body = Vec::new();
        body.extend_from_slice(&2u16.to_le_bytes());
        body.extend_from_slice(&[0, 0]);
        body.extend_from_slice(&f32_bytes(&[7.0]));
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":8}],
                "bufferViews":[{"buffer":0,"byteLength":2},{"buffer":0,"byteOffset":4,"byteLength":4}],
                "accessors":[{"componentType":5126,"count":3,"type":"SCALAR",
                    "sparse":{"count":1,
                        "indices":{"bufferView":0,"componentType":5123},
                        "values":{"bufferView":1}}}]}"#,
            Some(body),
        );
        let attribute = block_on(parser.accessor(0)).unwrap().unwrap();
        assert_eq!(attribute.to_f32_vec(), vec![0.0, 0.0, 7.0]);
    }

    #[test]
    fn test_normalized_flag_kept_raw() {
        let parser = parser_for(
            r#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":2}],
                "bufferViews":[{"buffer":0,"byteLength":2}],
                "accessors":[{"bufferView":0,"componentType":5121,"normalized":true,"count":2,"type":"SCALAR"}]}"#,
            Some(vec![255, 0]),
        );
        let attribute = block_on(parser.accessor(0)).unwrap().unwrap();
        assert!(attribute.normalized());
        assert_eq!(attribute.get(0, 0), 255.0);
    }
}
