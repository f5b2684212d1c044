//! Texture model, sampler state and image decoding

use crate::attribute::BufferSlice;
use crate::document::SamplerDef;
use crate::error::Result;
use crate::loader::Fetcher;
use crate::runtime::BoxFuture;
use image::io::Reader as ImageReader;
use image::ImageFormat;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Error type for texture loading operations
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Image decoding error: {0}")]
    DecodeError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decoded pixel data
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub pixel_format: PixelFormat,
}

/// Layout of [`TextureImage::data`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Rgb8,
    /// Opaque block-compressed payload, passed through untouched
    Compressed,
}

/// Channel layout the renderer should upload the texture as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba,
    Rgb,
}

impl TextureFormat {
    /// Format implied by an image MIME type
    pub fn for_mime_type(mime_type: &str) -> Option<Self> {
        match mime_type {
            "image/png" => Some(Self::Rgba),
            "image/jpeg" => Some(Self::Rgb),
            _ => None,
        }
    }
}

/// Color space of the texel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureEncoding {
    Linear,
    Srgb,
}

/// Sampler filter, mapped from the GL enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl Filter {
    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            9728 => Some(Self::Nearest),
            9729 => Some(Self::Linear),
            9984 => Some(Self::NearestMipmapNearest),
            9985 => Some(Self::LinearMipmapNearest),
            9986 => Some(Self::NearestMipmapLinear),
            9987 => Some(Self::LinearMipmapLinear),
            _ => None,
        }
    }
}

/// Sampler wrap mode, mapped from the GL enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wrapping {
    ClampToEdge,
    MirroredRepeat,
    Repeat,
}

impl Wrapping {
    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            33071 => Some(Self::ClampToEdge),
            33648 => Some(Self::MirroredRepeat),
            10497 => Some(Self::Repeat),
            _ => None,
        }
    }
}

/// A texture: shared image data plus per-use sampling state
///
/// Variants (different format, encoding or UV transform) are separate
/// `Texture` values sharing the same [`TextureImage`].
#[derive(Debug, Clone)]
pub struct Texture {
    pub uuid: Uuid,
    pub name: Option<String>,
    pub image: Arc<TextureImage>,
    pub flip_y: bool,
    pub format: TextureFormat,
    pub encoding: TextureEncoding,
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub wrap_s: Wrapping,
    pub wrap_t: Wrapping,
    pub offset: [f32; 2],
    pub repeat: [f32; 2],
    pub rotation: f32,
    pub compressed: bool,
}

impl Texture {
    pub fn new(image: Arc<TextureImage>) -> Self {
        let compressed = image.pixel_format == PixelFormat::Compressed;
        Self {
            uuid: Uuid::new_v4(),
            name: None,
            image,
            flip_y: true,
            format: TextureFormat::Rgba,
            encoding: TextureEncoding::Linear,
            mag_filter: Filter::Linear,
            min_filter: Filter::LinearMipmapLinear,
            wrap_s: Wrapping::ClampToEdge,
            wrap_t: Wrapping::ClampToEdge,
            offset: [0.0, 0.0],
            repeat: [1.0, 1.0],
            rotation: 0.0,
            compressed,
        }
    }

    /// Copy with a fresh identity, sharing the image
    pub fn derive(&self) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            ..self.clone()
        }
    }

    /// Apply glTF sampler state; a missing sampler means repeat wrapping
    pub fn apply_sampler(&mut self, sampler: Option<&SamplerDef>) {
        let sampler = sampler.cloned().unwrap_or_default();
        self.mag_filter = sampler
            .mag_filter
            .and_then(Filter::from_gl)
            .unwrap_or(Filter::Linear);
        self.min_filter = sampler
            .min_filter
            .and_then(Filter::from_gl)
            .unwrap_or(Filter::LinearMipmapLinear);
        self.wrap_s = sampler
            .wrap_s
            .and_then(Wrapping::from_gl)
            .unwrap_or(Wrapping::Repeat);
        self.wrap_t = sampler
            .wrap_t
            .and_then(Wrapping::from_gl)
            .unwrap_or(Wrapping::Repeat);
    }
}

/// Where a texture's image comes from
#[derive(Debug, Clone)]
pub enum TextureSource {
    /// Resolved URI, including `data:` URIs
    Uri(String),
    /// Image embedded in a buffer view
    Bytes {
        data: BufferSlice,
        mime_type: Option<String>,
    },
}

/// Collaborator turning an image source into pixels
pub trait TextureLoader: Send + Sync + fmt::Debug {
    fn load(&self, source: TextureSource) -> BoxFuture<'_, Result<TextureImage>>;
}

/// Default loader: fetches the bytes and decodes PNG or JPEG
#[derive(Clone)]
pub struct ImageTextureLoader {
    fetcher: Arc<dyn Fetcher>,
}

impl ImageTextureLoader {
    /// Create a new texture loader fetching URIs through `fetcher`
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Decode a texture from binary data
    pub fn decode(&self, data: &[u8]) -> std::result::Result<TextureImage, TextureError> {
        let format =
            image::guess_format(data).map_err(|e| TextureError::DecodeError(e.to_string()))?;

        match format {
            ImageFormat::Jpeg | ImageFormat::Png => {}
            _ => {
                return Err(TextureError::UnsupportedFormat(format!(
                    "Only JPG/JPEG and PNG formats are supported, got {:?}",
                    format.extensions_str()
                )))
            }
        }

        let img = ImageReader::with_format(std::io::Cursor::new(data), format)
            .decode()
            .map_err(|e| TextureError::DecodeError(e.to_string()))?;

        let rgba_img = img.into_rgba8();
        let (width, height) = rgba_img.dimensions();

        Ok(TextureImage {
            width,
            height,
            data: rgba_img.into_raw(),
            pixel_format: PixelFormat::Rgba8,
        })
    }
}

impl TextureLoader for ImageTextureLoader {
    fn load(&self, source: TextureSource) -> BoxFuture<'_, Result<TextureImage>> {
        Box::pin(async move {
            match source {
                TextureSource::Bytes { data, .. } => Ok(self.decode(&data)?),
                TextureSource::Uri(uri) => {
                    let bytes = self.fetcher.fetch(&uri).await?;
                    Ok(self.decode(&bytes)?)
                }
            }
        })
    }
}

impl fmt::Debug for ImageTextureLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageTextureLoader")
            .field("fetcher", &self.fetcher)
            .finish()
    }
}
