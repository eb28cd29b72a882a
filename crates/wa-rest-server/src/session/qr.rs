// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! PNG rendering of pairing codes

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

/// Minimum edge length of the rendered image, in pixels
pub const QR_IMAGE_SIZE: u32 = 256;

#[derive(Debug, thiserror::Error)]
pub enum QrRenderError {
    #[error("cannot encode QR code: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("cannot write PNG: {0}")]
    Png(#[from] image::ImageError),
}

/// Render `code` as a `data:image/png;base64,...` URI
pub fn render_png_data_uri(code: &str) -> Result<String, QrRenderError> {
    let qr = QrCode::with_error_correction_level(code.as_bytes(), EcLevel::M)?;
    let img = qr
        .render::<Luma<u8>>()
        .min_dimensions(QR_IMAGE_SIZE, QR_IMAGE_SIZE)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(img).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_png_data_uri() {
        let uri = render_png_data_uri("2@abcdef,ghijkl,mnopqr==").unwrap();
        let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = STANDARD.decode(payload).unwrap();

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert!(decoded.width() >= QR_IMAGE_SIZE);
        assert!(decoded.height() >= QR_IMAGE_SIZE);
    }

    #[test]
    fn oversized_code_is_an_encode_error() {
        let code = "x".repeat(4000);
        assert!(matches!(render_png_data_uri(&code), Err(QrRenderError::Encode(_))));
    }
}
