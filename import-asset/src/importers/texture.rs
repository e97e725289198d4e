// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{fs, io::Cursor, path::Path};

use anyhow::Context;
use image::{imageops::FilterType, load_from_memory, ImageFormat};
use tracing::debug;

/// Conditions a texture: decodes whatever format `file` is in, optionally
/// downscales it to fit within `max_dimension` on its longest side (keeping
/// aspect ratio), and re-encodes it as PNG so the asset pack only ever needs
/// to carry one image format at runtime.
pub fn import(file: &Path, max_dimension: Option<u32>) -> anyhow::Result<Vec<u8>> {
    let image_bytes = fs::read(file).context("Failed to open texture file for importing")?;
    let mut image = load_from_memory(&image_bytes)
        .context("Failed to read image file as an image (unsupported format?)")?;

    if image.width() == 0 || image.height() == 0 {
        return Err(anyhow::anyhow!("Texture must have at least one pixel"));
    }

    if let Some(max_dimension) = max_dimension {
        let longest_side = image.width().max(image.height());
        if longest_side > max_dimension {
            let scale = max_dimension as f64 / longest_side as f64;
            let width = ((image.width() as f64 * scale).round() as u32).max(1);
            let height = ((image.height() as f64 * scale).round() as u32).max(1);
            debug!(
                "Downscaling texture from {}x{} to {}x{}.",
                image.width(),
                image.height(),
                width,
                height,
            );
            image = image.resize(width, height, FilterType::CatmullRom);
        }
    }

    let mut png_bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut png_bytes, ImageFormat::Png)
        .context("Failed to re-encode texture as PNG")?;
    Ok(png_bytes.into_inner())
}
