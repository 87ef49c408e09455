//! Turning raw bytes into the values handed out by the loader.

use std::fmt;

use bytes::Bytes;

use crate::error::LoadError;

/// Transforms the raw bytes of a resource into its decoded representation.
///
/// Decoding is expected to be pure: the loader may decode the same bytes more than once, and
/// never caches the decoded value itself.
pub trait Decoder: Send + Sync {
    type Output: Send;

    /// Decodes `bytes`, failing with [`LoadError::Malformed`] if they are not a valid resource.
    fn decode(&self, bytes: Bytes) -> Result<Self::Output, LoadError>;
}

impl<F, T> Decoder for F
where
    F: Fn(Bytes) -> Result<T, LoadError> + Send + Sync,
    T: Send,
{
    type Output = T;

    fn decode(&self, bytes: Bytes) -> Result<T, LoadError> {
        self(bytes)
    }
}

/// Hands out the raw bytes unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawDecoder;

impl Decoder for RawDecoder {
    type Output = Bytes;

    fn decode(&self, bytes: Bytes) -> Result<Bytes, LoadError> {
        Ok(bytes)
    }
}

/// Image formats recognized by [`SniffDecoder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Bmp,
}

impl ImageFormat {
    /// Detects the format from the leading magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if data.starts_with(&[0xff, 0xd8, 0xff]) {
            Some(Self::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else if data.starts_with(b"BM") && data.len() >= 14 {
            Some(Self::Bmp)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::WebP => "webp",
            Self::Bmp => "bmp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An image whose container format was identified but whose pixels were not decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SniffedImage {
    pub format: ImageFormat,
    pub data: Bytes,
}

/// Accepts only data that looks like a well-known image format.
///
/// Pixel decoding is left to the consumer; this only guarantees that the loader never hands out
/// something that is obviously not an image, such as an HTML error page.
#[derive(Clone, Copy, Debug, Default)]
pub struct SniffDecoder;

impl Decoder for SniffDecoder {
    type Output = SniffedImage;

    fn decode(&self, data: Bytes) -> Result<SniffedImage, LoadError> {
        match ImageFormat::sniff(&data) {
            Some(format) => Ok(SniffedImage { format, data }),
            None if data.is_empty() => Err(LoadError::Malformed("empty resource".into())),
            None => Err(LoadError::Malformed("unrecognized image format".into())),
        }
    }
}
