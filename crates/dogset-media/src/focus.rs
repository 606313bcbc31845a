//! Focus quality metric.
//!
//! Sharpness is scored as the variance of the Laplacian response: blurred
//! frames have weak second derivatives and a low variance, sharp frames a
//! high one.

use image::RgbImage;

/// Variance of the 3x3 Laplacian (`[0 1 0; 1 -4 1; 0 1 0]`) over all three
/// channels, with reflect-101 border handling.
pub fn laplacian_variance(image: &RgbImage) -> f64 {
    let (w, h) = image.dimensions();
    let (w, h) = (w as usize, h as usize);
    if w == 0 || h == 0 {
        return 0.0;
    }

    let raw = image.as_raw();
    let at = |x: usize, y: usize, c: usize| raw[(y * w + x) * 3 + c] as f64;

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;

    for y in 0..h {
        let up = reflect101(y as isize - 1, h);
        let down = reflect101(y as isize + 1, h);
        for x in 0..w {
            let left = reflect101(x as isize - 1, w);
            let right = reflect101(x as isize + 1, w);
            for c in 0..3 {
                let response = at(x, up, c) + at(x, down, c) + at(left, y, c) + at(right, y, c)
                    - 4.0 * at(x, y, c);
                sum += response;
                sum_sq += response * response;
            }
        }
    }

    let n = (w * h * 3) as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Mirror an out-of-range index without repeating the edge pixel.
fn reflect101(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    let reflected = if i < 0 {
        -i
    } else if i > last {
        2 * last - i
    } else {
        i
    };
    reflected.clamp(0, last) as usize
}
