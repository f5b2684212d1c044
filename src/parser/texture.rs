use super::GltfParser;
use crate::document::{self, TextureInfo};
use crate::error::{DecodeError, Result};
use crate::extensions::{parse_extension, KnownExtension, TextureDdsDef, TextureTransformDef};
use crate::loader::resolve_url;
use crate::material::TextureSlot;
use crate::texture::{Texture, TextureEncoding, TextureFormat, TextureSource};
use std::sync::Arc;

impl GltfParser {
    pub(super) async fn load_texture(&self, index: usize) -> Result<Arc<Texture>> {
        let document = self.document();
        let def = document::get(&document.textures, index, "texture")?;

        let dds = if self.extensions().is_enabled(KnownExtension::TextureDds) {
            parse_extension::<TextureDdsDef>(&def.extensions, KnownExtension::TextureDds)?
        } else {
            None
        };
        let source_index = match &dds {
            Some(dds) => dds.source,
            None => def.source,
        }
        .ok_or_else(|| DecodeError::format(format!("Texture {index} has no image source")))?;
        let image = document::get(&document.images, source_index, "image")?;

        let source = match (image.buffer_view, &image.uri) {
            (Some(view), _) => TextureSource::Bytes {
                data: self.buffer_view(view).await?,
                mime_type: image.mime_type.clone(),
            },
            (None, Some(uri)) => TextureSource::Uri(resolve_url(uri, &self.state.options.path)),
            (None, None) => {
                return Err(DecodeError::format(format!(
                    "Image {source_index} has neither uri nor bufferView"
                )))
            }
        };

        let loader = match &dds {
            Some(_) => self.state.options.dds_loader.clone().ok_or_else(|| {
                DecodeError::MissingDependencyExtension {
                    extension: KnownExtension::TextureDds.name().to_string(),
                    requirement: "a DDS texture loader".to_string(),
                }
            })?,
            None => Arc::clone(&self.state.options.texture_loader),
        };
        let pixels = loader.load(source).await?;

        let mut texture = Texture::new(Arc::new(pixels));
        texture.flip_y = false;
        texture.name = def.name.clone();
        if let Some(format) = image
            .mime_type
            .as_deref()
            .and_then(TextureFormat::for_mime_type)
        {
            texture.format = format;
        }
        let sampler = def
            .sampler
            .map(|i| document::get(&document.samplers, i, "sampler"))
            .transpose()?;
        texture.apply_sampler(sampler);

        log::debug!(
            "Texture {index}: {}x{} from image {source_index}",
            texture.image.width,
            texture.image.height
        );
        Ok(Arc::new(texture))
    }

    /// The texture to bind in `slot` for `info`
    ///
    /// Slot-specific format, encoding and UV transform are applied to a copy
    /// kept in the texture registry; the cached texture is never changed.
    pub(super) async fn slot_texture(
        &self,
        slot: TextureSlot,
        info: &TextureInfo,
    ) -> Result<Arc<Texture>> {
        let base = self.texture(info.index).await?;

        let transform = if self.extensions().is_enabled(KnownExtension::TextureTransform) {
            parse_extension::<TextureTransformDef>(&info.extensions, KnownExtension::TextureTransform)?
        } else {
            None
        };
        let format = if slot.is_rgb_only() && !base.compressed {
            TextureFormat::Rgb
        } else {
            base.format
        };
        let encoding = if slot.is_color() {
            TextureEncoding::Srgb
        } else {
            base.encoding
        };

        if transform.is_none() && format == base.format && encoding == base.encoding {
            return Ok(base);
        }

        let key = format!(
            "{}:{format:?}:{encoding:?}:{}",
            base.uuid,
            transform
                .as_ref()
                .and_then(|t| serde_json::to_string(t).ok())
                .unwrap_or_default()
        );
        let variant = self.state.textures.get_or_insert_with(key, || {
            let mut variant = base.derive();
            variant.format = format;
            variant.encoding = encoding;
            if let Some(transform) = &transform {
                apply_transform(&mut variant, transform);
            }
            variant
        });
        Ok(variant)
    }
}

fn apply_transform(texture: &mut Texture, transform: &TextureTransformDef) {
    if transform.tex_coord.is_some() {
        log::warn!(
            "Custom UV sets in \"{}\" extension not yet supported",
            KnownExtension::TextureTransform.name()
        );
    }
    if let Some(offset) = transform.offset {
        texture.offset = offset;
    }
    if let Some(rotation) = transform.rotation {
        texture.rotation = rotation;
    }
    if let Some(scale) = transform.scale {
        texture.repeat = scale;
    }
}

#[cfg(test)]
mod tests {
    use crate::material::TextureSlot;
    use crate::parser::tests::parser_for;
    use crate::texture::{TextureEncoding, TextureFormat, Wrapping};
    use futures::executor::block_on;
    use std::sync::Arc;

    fn png() -> Vec<u8> {
        let img = image::RgbaImage::new(2, 2);
        let mut data = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut data),
            image::ImageOutputFormat::Png,
        )
        .unwrap();
        data
    }

    fn textured(extensions_used: &str, transform: &str) -> crate::parser::GltfParser {
        let body = png();
        let json = format!(
            r#"{{"asset":{{"version":"2.0"}},"extensionsUsed":[{extensions_used}],
                "buffers":[{{"byteLength":{len}}}],
                "bufferViews":[{{"buffer":0,"byteLength":{len}}}],
                "images":[{{"bufferView":0,"mimeType":"image/png"}}],
                "samplers":[{{"wrapS":33071}}],
                "textures":[{{"source":0,"sampler":0,"name":"albedo"}}],
                "materials":[{{"pbrMetallicRoughness":{{"baseColorTexture":{{"index":0{transform}}}}}}}]}}"#,
            len = body.len()
        );
        parser_for(&json, Some(body))
    }

    #[test]
    fn test_texture_from_buffer_view() {
        let parser = textured("", "");
        let texture = block_on(parser.texture(0)).unwrap();
        assert_eq!(texture.name.as_deref(), Some("albedo"));
        assert!(!texture.flip_y);
        assert_eq!(texture.format, TextureFormat::Rgba);
        assert_eq!(texture.wrap_s, Wrapping::ClampToEdge);
        assert_eq!(texture.wrap_t, Wrapping::Repeat);
        assert_eq!(texture.image.width, 2);
    }

    #[test]
    fn test_slot_variants_do_not_touch_cached_texture() {
        let parser = textured("", "");
        let info = parser.document().materials[0]
            .pbr_metallic_roughness
            .as_ref()
            .unwrap()
            .base_color_texture
            .clone()
            .unwrap();

        let color = block_on(parser.slot_texture(TextureSlot::Map, &info)).unwrap();
        let normal = block_on(parser.slot_texture(TextureSlot::NormalMap, &info)).unwrap();
        let base = block_on(parser.texture(0)).unwrap();

        assert_eq!(color.encoding, TextureEncoding::Srgb);
        assert_eq!(normal.format, TextureFormat::Rgb);
        assert_eq!(base.encoding, TextureEncoding::Linear);
        assert_eq!(base.format, TextureFormat::Rgba);
        assert!(Arc::ptr_eq(&color.image, &base.image));

        let again = block_on(parser.slot_texture(TextureSlot::Map, &info)).unwrap();
        assert!(Arc::ptr_eq(&color, &again));
    }

    #[test]
    fn test_texture_transform() {
        let transform = r#","extensions":{"KHR_texture_transform":{"offset":[0.5,0.0],"scale":[2.0,2.0],"rotation":1.0}}"#;
        let parser = textured(r#""KHR_texture_transform""#, transform);
        let info = parser.document().materials[0]
            .pbr_metallic_roughness
            .as_ref()
            .unwrap()
            .base_color_texture
            .clone()
            .unwrap();
        let texture = block_on(parser.slot_texture(TextureSlot::MetalnessMap, &info)).unwrap();
        assert_eq!(texture.offset, [0.5, 0.0]);
        assert_eq!(texture.repeat, [2.0, 2.0]);
        assert_eq!(texture.rotation, 1.0);
        assert_eq!(block_on(parser.texture(0)).unwrap().repeat, [1.0, 1.0]);
    }

    #[test]
    fn test_transform_ignored_when_not_used() {
        let transform = r#","extensions":{"KHR_texture_transform":{"scale":[2.0,2.0]}}"#;
        let parser = textured("", transform);
        let info = parser.document().materials[0]
            .pbr_metallic_roughness
            .as_ref()
            .unwrap()
            .base_color_texture
            .clone()
            .unwrap();
        let texture = block_on(parser.slot_texture(TextureSlot::MetalnessMap, &info)).unwrap();
        assert_eq!(texture.repeat, [1.0, 1.0]);
    }
}
