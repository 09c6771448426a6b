//! Contrast-limited adaptive histogram equalization (CLAHE).
//!
//! Applied to the luma channel only so colours are preserved. Retained frames
//! are enhanced before they are written out for text recognition.

use image::RgbImage;

/// CLAHE parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaheConfig {
    /// Relative clip limit; a tile's bins are capped at `clip_limit * area / 256`
    pub clip_limit: f64,
    /// Tile grid as (columns, rows)
    pub tiles: (u32, u32),
}

impl Default for ClaheConfig {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tiles: (8, 8),
        }
    }
}

/// Equalize the luma of `frame` tile by tile, keeping chroma.
pub fn clahe_luma(frame: &RgbImage, config: &ClaheConfig) -> RgbImage {
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 {
        return frame.clone();
    }

    let mut ycc: Vec<[f64; 3]> = frame.pixels().map(|p| rgb_to_ycbcr(p.0)).collect();
    let luma: Vec<u8> = ycc.iter().map(|p| p[0].round().clamp(0.0, 255.0) as u8).collect();

    let tiles_x = config.tiles.0.clamp(1, w);
    let tiles_y = config.tiles.1.clamp(1, h);
    let tile_w = w.div_ceil(tiles_x);
    let tile_h = h.div_ceil(tiles_y);

    let luts = build_luts(&luma, w, h, tiles_x, tiles_y, tile_w, tile_h, config.clip_limit);

    let inv_tw = 1.0 / tile_w as f64;
    let inv_th = 1.0 / tile_h as f64;
    for y in 0..h {
        let tyf = y as f64 * inv_th - 0.5;
        let ty1 = tyf.floor() as i64;
        let ya = tyf - ty1 as f64;
        let ty2 = (ty1 + 1).min(tiles_y as i64 - 1) as usize;
        let ty1 = ty1.max(0) as usize;

        for x in 0..w {
            let txf = x as f64 * inv_tw - 0.5;
            let tx1 = txf.floor() as i64;
            let xa = txf - tx1 as f64;
            let tx2 = (tx1 + 1).min(tiles_x as i64 - 1) as usize;
            let tx1 = tx1.max(0) as usize;

            let idx = (y * w + x) as usize;
            let v = luma[idx] as usize;
            let lut = |tx: usize, ty: usize| luts[ty * tiles_x as usize + tx][v] as f64;

            let top = lut(tx1, ty1) * (1.0 - xa) + lut(tx2, ty1) * xa;
            let bottom = lut(tx1, ty2) * (1.0 - xa) + lut(tx2, ty2) * xa;
            ycc[idx][0] = top * (1.0 - ya) + bottom * ya;
        }
    }

    RgbImage::from_fn(w, h, |x, y| image::Rgb(ycbcr_to_rgb(ycc[(y * w + x) as usize])))
}

#[allow(clippy::too_many_arguments)]
fn build_luts(
    luma: &[u8],
    w: u32,
    h: u32,
    tiles_x: u32,
    tiles_y: u32,
    tile_w: u32,
    tile_h: u32,
    clip_limit: f64,
) -> Vec<[u8; 256]> {
    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[luma[(y * w + x) as usize] as usize] += 1;
                }
            }
            let area = (x1.saturating_sub(x0) * y1.saturating_sub(y0)).max(1);

            if clip_limit > 0.0 {
                let limit = ((clip_limit * area as f64 / 256.0) as u32).max(1);
                clip_histogram(&mut hist, limit);
            }

            let scale = 255.0 / area as f64;
            let mut lut = [0u8; 256];
            let mut cdf = 0u32;
            for (bin, count) in hist.iter().enumerate() {
                cdf += count;
                lut[bin] = (cdf as f64 * scale).round().clamp(0.0, 255.0) as u8;
            }
            luts.push(lut);
        }
    }
    luts
}

/// Cap every bin at `limit` and spread the excess evenly.
fn clip_histogram(hist: &mut [u32; 256], limit: u32) {
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let per_bin = excess / 256;
    let residual = (excess % 256) as usize;
    for bin in hist.iter_mut() {
        *bin += per_bin;
    }
    if residual > 0 {
        let step = (256 / residual).max(1);
        for bin in hist.iter_mut().step_by(step).take(residual) {
            *bin += 1;
        }
    }
}

fn rgb_to_ycbcr([r, g, b]: [u8; 3]) -> [f64; 3] {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    [
        0.299 * r + 0.587 * g + 0.114 * b,
        128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b,
        128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b,
    ]
}

fn ycbcr_to_rgb([y, cb, cr]: [f64; 3]) -> [u8; 3] {
    let to_u8 = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    [
        to_u8(y + 1.402 * (cr - 128.0)),
        to_u8(y - 0.344_136 * (cb - 128.0) - 0.714_136 * (cr - 128.0)),
        to_u8(y + 1.772 * (cb - 128.0)),
    ]
}
