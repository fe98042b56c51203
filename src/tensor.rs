//! Image <-> NCHW tensor conversion for the restoration network.

use crate::{
    codec::{Rgb8Image, rgb8_image},
    error::RestoreError,
};
use ndarray::Array4;

/// Converts an RGB image to a `[1, 3, H, W]` tensor with values in [0, 1].
pub fn image_to_tensor(image: &Rgb8Image) -> Result<Array4<f32>, RestoreError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(RestoreError::Tensor(format!(
            "cannot build a tensor from a {width}x{height} image"
        )));
    }

    let mut tensor = Array4::<f32>::zeros((1, 3, height, width));
    for (idx, pixel) in image.as_slice().chunks_exact(3).enumerate() {
        let (y, x) = (idx / width, idx % width);
        for (c, &value) in pixel.iter().enumerate() {
            tensor[[0, c, y, x]] = f32::from(value) / 255.0;
        }
    }

    Ok(tensor)
}

/// Clamps every value to [0, 1]. NaN becomes 0.
pub fn clamp_unit(tensor: &mut Array4<f32>) {
    tensor.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) });
}

/// Converts a `[1, 3, H, W]` tensor back to an RGB image, clamping first.
pub fn tensor_to_image(mut tensor: Array4<f32>) -> Result<Rgb8Image, RestoreError> {
    let (batch, channels, height, width) = tensor.dim();
    if batch != 1 || channels != 3 {
        return Err(RestoreError::Tensor(format!(
            "expected a [1, 3, H, W] tensor, got {:?}",
            tensor.shape()
        )));
    }
    if height == 0 || width == 0 {
        return Err(RestoreError::Tensor("model returned an empty tensor".to_string()));
    }

    clamp_unit(&mut tensor);

    let mut pixels = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            for c in 0..3 {
                pixels.push((tensor[[0, c, y, x]] * 255.0).round() as u8);
            }
        }
    }

    rgb8_image(width, height, pixels)
}
