use base64::engine::general_purpose;
use base64::write::EncoderWriter;
use image::{DynamicImage, ImageError, ImageOutputFormat, Luma};
use qrcode::types::QrError;
use qrcode::QrCode;
use thiserror::Error;

/// An error rendering a QR code.
#[derive(Error, Debug)]
pub enum QrCodeError {
    /// Content does not fit in a QR code.
    #[error("QR code encoding error: {0}")]
    Encoding(#[from] QrError),
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
}

pub fn image_to_base64_string(image: &DynamicImage) -> Result<String, QrCodeError> {
    let mut buf = Vec::new();
    {
        let mut writer = EncoderWriter::new(&mut buf, &general_purpose::STANDARD);
        image.write_to(&mut writer, ImageOutputFormat::Png)?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Renders `content` as a PNG QR code data URI.
pub fn str_to_qr_code_data_uri(content: &str) -> Result<String, QrCodeError> {
    let code = QrCode::new(content.as_bytes())?;

    // Render the bits into an image.
    let image = DynamicImage::ImageLuma8(code.render::<Luma<u8>>().build());
    Ok(format!(
        "data:image/png;base64,{}",
        image_to_base64_string(&image)?
    ))
}
