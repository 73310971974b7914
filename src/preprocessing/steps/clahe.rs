use crate::error::PlateError;
use image::{GrayImage, Luma};

const BINS: usize = 256;

/// Contrast limited adaptive histogram equalization
///
/// The image is split into `grid x grid` tiles, each tile gets its own
/// equalization lookup table built from a clipped histogram, and every pixel
/// is mapped through a bilinear blend of the four nearest tile tables.
pub fn apply(gray: &GrayImage, clip_limit: f32, grid: u32) -> Result<GrayImage, PlateError> {
    if grid == 0 {
        return Err(PlateError::Preprocessing(
            "CLAHE tile grid must be at least 1x1".to_string(),
        ));
    }

    let (width, height) = gray.dimensions();
    let tile_w = width.div_ceil(grid).max(1);
    let tile_h = height.div_ceil(grid).max(1);
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(gray, x0, y0, x1, y1, clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    let enhanced = GrayImage::from_fn(width, height, |x, y| {
        let v = gray.get_pixel(x, y).0[0] as usize;

        let (tx1, tx2, xa) = neighbours(x, tile_w, tiles_x);
        let (ty1, ty2, ya) = neighbours(y, tile_h, tiles_y);

        let top = lut_at(tx1, ty1)[v] as f32 * (1.0 - xa) + lut_at(tx2, ty1)[v] as f32 * xa;
        let bottom = lut_at(tx1, ty2)[v] as f32 * (1.0 - xa) + lut_at(tx2, ty2)[v] as f32 * xa;
        let value = top * (1.0 - ya) + bottom * ya;

        Luma([value.round().clamp(0.0, 255.0) as u8])
    });

    Ok(enhanced)
}

/// Indices of the two tiles whose centres bracket `pos`, and the blend factor
fn neighbours(pos: u32, tile_size: u32, tiles: u32) -> (u32, u32, f32) {
    let t = (pos as f32 + 0.5) / tile_size as f32 - 0.5;
    let t1 = t.floor();
    let frac = t - t1;
    let last = tiles as i64 - 1;
    let i1 = (t1 as i64).clamp(0, last) as u32;
    let i2 = (t1 as i64 + 1).clamp(0, last) as u32;
    (i1, i2, frac)
}

/// Equalization lookup table for one tile with clipped histogram
fn tile_lut(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; BINS] {
    let mut hist = [0u32; BINS];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y).0[0] as usize] += 1;
        }
    }

    let area = ((x1 - x0) * (y1 - y0)).max(1);

    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);
        clip_histogram(&mut hist, clip);
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; BINS];
    let mut sum = 0u32;
    for (bin, count) in hist.iter().enumerate() {
        sum += count;
        lut[bin] = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Clip every bin at `clip` and spread the excess evenly over all bins
fn clip_histogram(hist: &mut [u32; BINS], clip: u32) {
    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }

    let batch = excess / BINS as u32;
    let mut residual = excess - batch * BINS as u32;
    for count in hist.iter_mut() {
        *count += batch;
    }

    if residual > 0 {
        let step = (BINS as u32 / residual).max(1) as usize;
        let mut bin = 0;
        while bin < BINS && residual > 0 {
            hist[bin] += 1;
            residual -= 1;
            bin += step;
        }
    }
}
