use image::RgbImage;

/// A captured frame could not be parsed as an image.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("failed to decode frame: {_0}")]
pub struct DecodeError(image::ImageError);

/// Decodes compressed frame bytes into 8-bit RGB.
///
/// The container format is sniffed from the leading bytes, so both the JPEG
/// snapshots produced by the capture pipeline and PNG files from recorded laps
/// are accepted.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    let image = image::load_from_memory(bytes).map_err(DecodeError)?;
    Ok(image.into_rgb8())
}

#[cfg(test)]
pub(crate) fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    image.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn test_decode_png_roundtrip() {
        let image = RgbImage::from_pixel(3, 2, Rgb([10, 20, 30]));
        let decoded = decode_rgb(&encode_png(&image)).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_rgb(b"definitely not an image").is_err());
        assert!(decode_rgb(&[]).is_err());
    }
}
