//! Focus scoring.
//!
//! The score is the variance of the 4-neighbour Laplacian
//! (`[0 1 0; 1 -4 1; 0 1 0]`) over the BT.601 luma plane. Flat or
//! motion-blurred frames have little high-frequency energy and score low.

use image::{GrayImage, RgbImage};

/// BT.601 luma of an RGB frame.
pub fn luma(frame: &RgbImage) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        let y = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
        image::Luma([y.round().clamp(0.0, 255.0) as u8])
    })
}

/// Variance of the Laplacian response. Always non-negative.
///
/// Borders are handled by reflecting the image (`dcb|abcd|cba` excluding the
/// edge pixel), so a uniform image scores exactly zero.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }

    let at = |x: i64, y: i64| -> f64 {
        let x = reflect(x, w as i64);
        let y = reflect(y, h as i64);
        gray.get_pixel(x as u32, y as u32).0[0] as f64
    };

    let n = (w as f64) * (h as f64);
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let v = at(x, y - 1) + at(x - 1, y) + at(x + 1, y) + at(x, y + 1) - 4.0 * at(x, y);
            sum += v;
            sum_sq += v * v;
        }
    }

    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Reflect an out-of-range coordinate back into `[0, len)`.
fn reflect(i: i64, len: i64) -> i64 {
    if len == 1 {
        return 0;
    }
    let mut i = i;
    while i < 0 || i >= len {
        i = if i < 0 { -i } else { 2 * (len - 1) - i };
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            image::Luma([if (x + y) % 2 == 0 { 255 } else { 0 }])
        })
    }

    #[test]
    fn test_uniform_image_scores_zero() {
        let flat = GrayImage::from_pixel(16, 16, image::Luma([128]));
        assert_eq!(laplacian_variance(&flat), 0.0);
    }

    #[test]
    fn test_checkerboard_scores_high() {
        let score = laplacian_variance(&checkerboard(16));
        assert!(score > 1000.0, "score was {score}");
    }

    #[test]
    fn test_gentle_gradient_scores_below_edges() {
        let gradient = GrayImage::from_fn(32, 32, |x, _| image::Luma([(x * 4) as u8]));
        assert!(laplacian_variance(&gradient) < laplacian_variance(&checkerboard(32)));
    }

    #[test]
    fn test_luma_weights() {
        let frame = RgbImage::from_pixel(1, 1, image::Rgb([255, 0, 0]));
        assert_eq!(luma(&frame).get_pixel(0, 0).0[0], 76);
    }

    #[test]
    fn test_reflect() {
        assert_eq!(reflect(-1, 5), 1);
        assert_eq!(reflect(5, 5), 3);
        assert_eq!(reflect(2, 5), 2);
        assert_eq!(reflect(-1, 1), 0);
    }
}
