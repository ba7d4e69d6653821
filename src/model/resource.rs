//! Image resources referenced from markup.

use crate::error::{Error, Result};
use std::path::Path;

/// An image loaded from disk for embedding.
#[derive(Debug, Clone)]
pub struct ImageResource {
    /// Raw binary data
    pub data: Vec<u8>,

    /// MIME type (e.g., "image/png")
    pub mime_type: &'static str,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,
}

impl ImageResource {
    /// Load an image and read its pixel dimensions.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            Error::render_unit(
                format!("image {}", path.display()),
                format!("cannot read image: {}", e),
            )
        })?;
        Self::from_bytes(data).map_err(|e| match e {
            Error::RenderUnit { message, .. } => {
                Error::render_unit(format!("image {}", path.display()), message)
            }
            other => other,
        })
    }

    /// Build a resource from raw bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mime_type = Self::detect_mime_type(&data)
            .ok_or_else(|| Error::render_unit("image", "unsupported image format"))?;
        let (width, height) = image_dimensions(&data)
            .filter(|(w, h)| *w > 0 && *h > 0)
            .ok_or_else(|| Error::render_unit("image", "cannot read image dimensions"))?;
        Ok(Self {
            data,
            mime_type,
            width,
            height,
        })
    }

    /// File extension for the package media part.
    pub fn extension(&self) -> &'static str {
        match self.mime_type {
            "image/jpeg" => "jpeg",
            "image/png" => "png",
            "image/gif" => "gif",
            _ => "bin",
        }
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Detect MIME type from data magic bytes.
    pub fn detect_mime_type(data: &[u8]) -> Option<&'static str> {
        if data.len() < 8 {
            return None;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some("image/jpeg");
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some("image/png");
        }

        // GIF: GIF87a or GIF89a
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some("image/gif");
        }

        None
    }
}

/// Read pixel dimensions from PNG, JPEG or GIF headers.
pub fn image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 24 {
        return None;
    }

    // PNG: width/height at bytes 16-23 in IHDR chunk
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
        let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
        return Some((width, height));
    }

    if data.starts_with(&[0xFF, 0xD8]) {
        return jpeg_dimensions(data);
    }

    // GIF: little-endian width/height at bytes 6-9
    if data.starts_with(b"GIF") {
        let width = u16::from_le_bytes([data[6], data[7]]) as u32;
        let height = u16::from_le_bytes([data[8], data[9]]) as u32;
        return Some((width, height));
    }

    None
}

fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2;
    while i + 4 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }

        let marker = data[i + 1];
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof && i + 9 < data.len() {
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
            return Some((width, height));
        }

        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + length;
    }
    None
}
