use crate::codec::{ImageCodec, RasterBuffer};
use image::imageops::FilterType;

/// Select appropriate filter type based on resize ratio
pub fn select_filter(orig_width: u32, orig_height: u32, new_width: u32, new_height: u32) -> FilterType {
    let width_ratio = orig_width as f32 / new_width.max(1) as f32;
    let height_ratio = orig_height as f32 / new_height.max(1) as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

/// Largest size that fits inside `max_width` x `max_height`. Never upscales.
///
/// With `maintain_aspect_ratio` the source ratio is kept (rounded to whole
/// pixels); otherwise each axis is clamped independently.
pub fn fit_within(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
    maintain_aspect_ratio: bool,
) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    if !maintain_aspect_ratio {
        return (width.min(max_width).max(1), height.min(max_height).max(1));
    }

    let scale = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    let new_width = ((width as f64 * scale).round() as u32).clamp(1, max_width.max(1));
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, max_height.max(1));
    (new_width, new_height)
}

/// Intermediate sizes for a high-quality downscale.
///
/// While either axis is more than twice its target, both axes are halved
/// (rounding up, and never below the target). The last entry is always the
/// exact target. No step shrinks an axis by more than half.
pub fn step_down_plan(source: (u32, u32), target: (u32, u32)) -> Vec<(u32, u32)> {
    let (target_w, target_h) = (target.0.max(1), target.1.max(1));
    let (mut w, mut h) = source;
    let mut steps = Vec::new();

    while w > target_w.saturating_mul(2) || h > target_h.saturating_mul(2) {
        w = w.div_ceil(2).max(target_w);
        h = h.div_ceil(2).max(target_h);
        steps.push((w, h));
    }

    if steps.last() != Some(&(target_w, target_h)) && source != (target_w, target_h) {
        steps.push((target_w, target_h));
    }

    steps
}

/// Resize through [`step_down_plan`]. Returns the result and the number of passes.
pub fn step_down_resize(
    codec: &dyn ImageCodec,
    raster: &RasterBuffer,
    target: (u32, u32),
) -> (RasterBuffer, usize) {
    let plan = step_down_plan(raster.dimensions(), target);
    if plan.is_empty() {
        return (raster.clone(), 0);
    }

    let mut current = codec.resize(raster, plan[0].0, plan[0].1);
    for &(w, h) in &plan[1..] {
        current = codec.resize(&current, w, h);
    }

    (current, plan.len())
}
