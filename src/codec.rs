//! Conversions between wire payloads (base64 strings, encoded image bytes) and
//! in-memory RGB images, plus the crop applied before inference.

use crate::error::RestoreError;
use base64::{Engine, engine::general_purpose::STANDARD};
use kornia_image::{Image, ImageSize, allocator::CpuAllocator};
use std::io::Cursor;

/// 8-bit RGB image, the unit the restoration pipeline works on.
pub type Rgb8Image = Image<u8, 3, CpuAllocator>;

/// Builds an image from interleaved RGB bytes.
pub fn rgb8_image(width: usize, height: usize, data: Vec<u8>) -> Result<Rgb8Image, RestoreError> {
    Image::new(ImageSize { width, height }, data, CpuAllocator)
        .map_err(|e| RestoreError::Tensor(e.to_string()))
}

/// Decodes a base64 string holding an encoded image (PNG, JPEG, ...).
///
/// A `data:image/...;base64,` prefix is stripped if present.
pub fn decode_base64(payload: &str) -> Result<Rgb8Image, RestoreError> {
    let payload = payload.trim();
    let payload = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    if payload.is_empty() {
        return Err(RestoreError::EmptyPayload);
    }
    let bytes = STANDARD.decode(payload)?;
    decode_bytes(&bytes)
}

/// Decodes encoded image bytes, converting any color layout to RGB.
pub fn decode_bytes(bytes: &[u8]) -> Result<Rgb8Image, RestoreError> {
    if bytes.is_empty() {
        return Err(RestoreError::EmptyPayload);
    }
    let decoded =
        image::load_from_memory(bytes).map_err(|e| RestoreError::Decode(e.to_string()))?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    rgb8_image(width as usize, height as usize, rgb.into_raw())
}

/// Encodes an image as PNG.
pub fn encode_png(image: &Rgb8Image) -> Result<Vec<u8>, RestoreError> {
    let buffer = image::RgbImage::from_raw(
        image.width() as u32,
        image.height() as u32,
        image.as_slice().to_vec(),
    )
    .ok_or_else(|| RestoreError::Encode("pixel buffer does not match image size".to_string()))?;

    let mut png = Vec::new();
    buffer
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| RestoreError::Encode(e.to_string()))?;
    Ok(png)
}

/// Encodes an image as PNG and wraps it in base64.
pub fn encode_base64_png(image: &Rgb8Image) -> Result<String, RestoreError> {
    Ok(STANDARD.encode(encode_png(image)?))
}

/// Crops the bottom/right edges so both sides are multiples of `multiple`.
///
/// An image that already satisfies the constraint is returned unchanged.
pub fn crop_to_multiple(image: &Rgb8Image, multiple: usize) -> Result<Rgb8Image, RestoreError> {
    let (width, height) = (image.width(), image.height());
    let cropped_width = width - width % multiple;
    let cropped_height = height - height % multiple;

    if cropped_width == 0 || cropped_height == 0 {
        return Err(RestoreError::ImageTooSmall {
            width,
            height,
            multiple,
        });
    }

    let row_len = width * 3;
    let cropped_row_len = cropped_width * 3;
    let mut data = Vec::with_capacity(cropped_row_len * cropped_height);
    for row in image.as_slice().chunks_exact(row_len).take(cropped_height) {
        data.extend_from_slice(&row[..cropped_row_len]);
    }

    rgb8_image(cropped_width, cropped_height, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> Rgb8Image {
        let data = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
        rgb8_image(width, height, data).unwrap()
    }

    #[test]
    fn crop_truncates_to_lower_multiple() {
        let cropped = crop_to_multiple(&gradient(17, 33), 8).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (16, 32));
    }

    #[test]
    fn crop_keeps_top_left_pixels() {
        let image = gradient(10, 9);
        let cropped = crop_to_multiple(&image, 8).unwrap();
        let src = image.as_slice();
        let dst = cropped.as_slice();
        // second row starts at x = 0, y = 1 in both images
        assert_eq!(&dst[8 * 3..8 * 3 + 3], &src[10 * 3..10 * 3 + 3]);
        assert_eq!(&dst[..8 * 3], &src[..8 * 3]);
    }

    #[test]
    fn crop_is_idempotent() {
        let once = crop_to_multiple(&gradient(41, 23), 8).unwrap();
        let twice = crop_to_multiple(&once, 8).unwrap();
        assert_eq!(once.size(), twice.size());
        assert_eq!(once.as_slice(), twice.as_slice());
    }

    #[test]
    fn crop_rejects_images_smaller_than_the_multiple() {
        let Err(err) = crop_to_multiple(&gradient(7, 64), 8) else {
            panic!("a 7 pixel wide image cannot be cropped to a multiple of 8");
        };
        assert!(matches!(
            err,
            RestoreError::ImageTooSmall {
                width: 7,
                height: 64,
                multiple: 8
            }
        ));
    }

    #[test]
    fn base64_roundtrip_preserves_dimensions_and_pixels() {
        let image = gradient(12, 5);
        let payload = encode_base64_png(&image).unwrap();
        let decoded = decode_base64(&payload).unwrap();
        assert_eq!(decoded.size(), image.size());
        assert_eq!(decoded.as_slice(), image.as_slice());
    }

    #[test]
    fn base64_accepts_data_url_prefix() {
        let payload = format!(
            "data:image/png;base64,{}",
            encode_base64_png(&gradient(3, 4)).unwrap()
        );
        let decoded = decode_base64(&payload).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 4));
    }

    #[test]
    fn decode_converts_grayscale_to_rgb() {
        let gray = image::GrayImage::from_pixel(4, 2, image::Luma([200]));
        let mut png = Vec::new();
        gray.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let decoded = decode_bytes(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 2));
        assert!(decoded.as_slice().iter().all(|&v| v == 200));
    }

    #[test]
    fn empty_payloads_are_rejected() {
        assert!(matches!(decode_base64(""), Err(RestoreError::EmptyPayload)));
        assert!(matches!(decode_base64("   "), Err(RestoreError::EmptyPayload)));
        assert!(matches!(decode_bytes(&[]), Err(RestoreError::EmptyPayload)));
    }

    #[test]
    fn malformed_payloads_are_client_errors() {
        let Err(err) = decode_base64("not base64 at all!") else {
            panic!("invalid base64 was accepted");
        };
        assert!(matches!(err, RestoreError::InvalidBase64(_)));
        assert!(err.is_client_error());

        let Err(err) = decode_bytes(b"definitely not an image") else {
            panic!("garbage bytes were decoded");
        };
        assert!(matches!(err, RestoreError::Decode(_)));
        assert!(err.is_client_error());
    }
}
