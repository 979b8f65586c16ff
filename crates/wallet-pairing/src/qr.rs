use std::io::Cursor;

use image::ImageFormat;
use qr_code::QrCode;
use thiserror::Error;
use wallet_pairing_transport::{
    QrPayloadV1, TransportError, encode_qr_payload, encode_qr_payload_pretty,
};

#[derive(Debug, Error)]
pub enum QrRenderError {
    #[error("pixel_per_module must be >= 1")]
    InvalidPixelPerModule,

    #[error("failed to encode qr content: {0}")]
    Qr(#[from] qr_code::types::QrError),

    #[error("failed to render qr bitmap: {0}")]
    Bmp(#[from] qr_code::bmp_monochrome::BmpError),

    #[error("failed to write qr bitmap: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode qr image: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Payload(#[from] TransportError),
}

/// Everything the presentation layer needs to show one pairing payload.
#[derive(Debug, Clone)]
pub struct QrArtifacts {
    /// Compact JSON, exactly what the QR code encodes.
    pub payload_json: String,
    /// Indented JSON for the "copy session payload" action.
    pub payload_json_pretty: String,
    pub qr_text: String,
    pub qr_png: Vec<u8>,
}

pub fn render_payload_artifacts(
    payload: &QrPayloadV1,
    pixel_per_module: u8,
) -> Result<QrArtifacts, QrRenderError> {
    let payload_json = encode_qr_payload(payload)?;
    let payload_json_pretty = encode_qr_payload_pretty(payload)?;
    let qr_text = render_text_qr(&payload_json)?;
    let qr_png = render_png_qr(&payload_json, pixel_per_module)?;

    Ok(QrArtifacts {
        payload_json,
        payload_json_pretty,
        qr_text,
        qr_png,
    })
}

pub fn render_text_qr(content: &str) -> Result<String, QrRenderError> {
    let qr = QrCode::new(content)?;
    Ok(qr.to_string(true, 3))
}

pub fn render_png_qr(content: &str, pixel_per_module: u8) -> Result<Vec<u8>, QrRenderError> {
    if pixel_per_module == 0 {
        return Err(QrRenderError::InvalidPixelPerModule);
    }

    let qr = QrCode::new(content)?;
    let mut bmp = qr.to_bmp().add_white_border(2)?;
    if pixel_per_module > 1 {
        bmp = bmp.mul(pixel_per_module)?;
    }

    let mut bmp_bytes = Vec::new();
    bmp.write(&mut bmp_bytes)?;

    let image = image::load_from_memory_with_format(&bmp_bytes, ImageFormat::Bmp)?;

    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;

    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use wallet_pairing_transport::{AuthorityUrls, QrPayloadInput, build_qr_payload};

    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    fn payload() -> QrPayloadV1 {
        let urls = AuthorityUrls::parse("https://api.karmacall.com/api").expect("urls");
        build_qr_payload(QrPayloadInput {
            session_id: "abc123",
            expires_at_ms: 1_700_000_120_000,
            challenge: Some("sign-me"),
            user_id: Some("user-42"),
            origin: "https://www.karmacall.com",
            urls: &urls,
        })
        .expect("payload")
    }

    #[test]
    fn artifacts_encode_the_compact_payload() {
        let artifacts = render_payload_artifacts(&payload(), 4).expect("artifacts");

        assert!(artifacts.payload_json.contains(r#""sessionId":"abc123""#));
        assert!(artifacts.payload_json_pretty.contains('\n'));
        assert!(!artifacts.qr_text.is_empty());
        assert!(artifacts.qr_png.starts_with(PNG_MAGIC));
    }

    #[test]
    fn rendering_is_deterministic() {
        let first = render_payload_artifacts(&payload(), 2).expect("first");
        let second = render_payload_artifacts(&payload(), 2).expect("second");

        assert_eq!(first.payload_json, second.payload_json);
        assert_eq!(first.qr_text, second.qr_text);
        assert_eq!(first.qr_png, second.qr_png);
    }

    #[test]
    fn zero_pixel_per_module_is_rejected() {
        let err = render_png_qr("abc", 0).expect_err("must fail");
        assert!(matches!(err, QrRenderError::InvalidPixelPerModule));
    }
}
