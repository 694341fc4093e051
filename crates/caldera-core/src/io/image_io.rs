use std::path::Path;

use image::{ColorType, GrayImage, ImageFormat, Luma};
use ndarray::Array2;

use crate::error::Result;

/// Load a TIFF/PNG frame as grayscale ADU values.
///
/// 8-bit sources keep their 0-255 range; anything deeper is read as 16-bit.
/// Returns the pixels and the native bit depth.
pub fn load_raster(path: &Path) -> Result<(Array2<f32>, u8)> {
    let img = image::open(path)?;
    let (w, h) = (img.width() as usize, img.height() as usize);

    let (pixels, depth): (Vec<f32>, u8) = match img.color() {
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => (
            img.to_luma8().into_raw().into_iter().map(f32::from).collect(),
            8,
        ),
        _ => (
            img.to_luma16().into_raw().into_iter().map(f32::from).collect(),
            16,
        ),
    };

    let data = Array2::from_shape_vec((h, w), pixels)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok((data, depth))
}

/// Save a linear min/max-stretched 8-bit PNG preview of a frame.
pub fn save_preview_png(data: &Array2<f32>, path: &Path) -> Result<()> {
    let (h, w) = data.dim();
    let (lo, hi) = data
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = if hi > lo { hi - lo } else { 1.0 };

    let mut img = GrayImage::new(w as u32, h as u32);
    for row in 0..h {
        for col in 0..w {
            let val = ((data[[row, col]] - lo) / range).clamp(0.0, 1.0) * 255.0;
            img.put_pixel(col as u32, row as u32, Luma([val as u8]));
        }
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
