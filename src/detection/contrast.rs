//! Local contrast enhancement of the display region
//!
//! The region is moved into 8-bit CIE Lab, the lightness channel goes
//! through contrast-limited adaptive histogram equalization (CLAHE) and the
//! result is converted back. The a/b channels are never touched, so hue and
//! chroma survive up to 8-bit rounding.

use image::{GrayImage, Luma, Rgb, RgbImage};

#[derive(Debug, Clone, Copy)]
pub struct ClaheParams {
    /// Histogram clip limit, relative to a uniform distribution; <= 0 disables clipping
    pub clip_limit: f32,
    /// Number of tiles across and down
    pub tile_grid: (u32, u32),
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 3.0,
            tile_grid: (8, 8),
        }
    }
}

/// Boost local contrast of the lightness channel only
pub fn enhance_contrast(img: &RgbImage, params: &ClaheParams) -> RgbImage {
    let (width, height) = img.dimensions();
    let mut lightness = GrayImage::new(width, height);
    let mut chroma = Vec::with_capacity((width * height) as usize);

    for (x, y, px) in img.enumerate_pixels() {
        let [l, a, b] = rgb_to_lab8(px.0);
        lightness.put_pixel(x, y, Luma([l]));
        chroma.push((a, b));
    }

    let equalized = clahe(&lightness, params.clip_limit, params.tile_grid);

    RgbImage::from_fn(width, height, |x, y| {
        let (a, b) = chroma[(y * width + x) as usize];
        Rgb(lab8_to_rgb([equalized.get_pixel(x, y)[0], a, b]))
    })
}

/// Contrast-limited adaptive histogram equalization.
///
/// Tiles are `ceil(w / tiles_x)` by `ceil(h / tiles_y)` pixels; images
/// narrower than the grid get fewer tiles. Each pixel is mapped through the
/// bilinear blend of its four nearest tile lookup tables.
pub fn clahe(img: &GrayImage, clip_limit: f32, tile_grid: (u32, u32)) -> GrayImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }

    let tile_w = w.div_ceil(tile_grid.0.clamp(1, w));
    let tile_h = h.div_ceil(tile_grid.1.clamp(1, h));
    let tiles_x = w.div_ceil(tile_w);
    let tiles_y = h.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let (x0, y0) = (tx * tile_w, ty * tile_h);
            let (x1, y1) = ((x0 + tile_w).min(w), (y0 + tile_h).min(h));

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[img.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            luts.push(tile_lut(hist, (x1 - x0) * (y1 - y0), clip_limit));
        }
    }

    let neighbours = |pos: u32, tile: u32, count: u32| -> (usize, usize, f32) {
        let f = pos as f32 / tile as f32 - 0.5;
        let lo = f.floor();
        let weight = f - lo;
        let last = count as i64 - 1;
        let first = (lo as i64).clamp(0, last) as usize;
        let second = (lo as i64 + 1).clamp(0, last) as usize;
        (first, second, weight)
    };

    GrayImage::from_fn(w, h, |x, y| {
        let (tx1, tx2, xa) = neighbours(x, tile_w, tiles_x);
        let (ty1, ty2, ya) = neighbours(y, tile_h, tiles_y);
        let v = img.get_pixel(x, y)[0] as usize;
        let lut = |tx: usize, ty: usize| luts[ty * tiles_x as usize + tx][v] as f32;

        let top = lut(tx1, ty1) * (1.0 - xa) + lut(tx2, ty1) * xa;
        let bottom = lut(tx1, ty2) * (1.0 - xa) + lut(tx2, ty2) * xa;
        let out = top * (1.0 - ya) + bottom * ya;
        Luma([out.round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_lut(mut hist: [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);

        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }

        let batch = excess / 256;
        let residual = excess % 256;
        for bin in hist.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let stride = (256 / residual).max(1) as usize;
            for bin in hist.iter_mut().step_by(stride).take(residual as usize) {
                *bin += 1;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (slot, bin) in lut.iter_mut().zip(hist.iter()) {
        cumulative += bin;
        *slot = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

// D65 reference white
const WHITE_X: f32 = 0.950456;
const WHITE_Z: f32 = 1.088754;
const EPSILON: f32 = 0.008856;

fn srgb_to_linear(c: u8) -> f32 {
    let c = c as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> u8 {
    let c = if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(t: f32) -> f32 {
    let cube = t * t * t;
    if cube > EPSILON {
        cube
    } else {
        (t - 16.0 / 116.0) / 7.787
    }
}

/// sRGB → Lab with L scaled to 0..=255 and a/b offset by 128
pub fn rgb_to_lab8([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b));

    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / WHITE_X;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / WHITE_Z;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let l = if y > EPSILON { 116.0 * fy - 16.0 } else { 903.3 * y };
    let a = 500.0 * (fx - fy);
    let bb = 200.0 * (fy - fz);

    [
        (l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8,
        (a + 128.0).round().clamp(0.0, 255.0) as u8,
        (bb + 128.0).round().clamp(0.0, 255.0) as u8,
    ]
}

/// Inverse of [`rgb_to_lab8`], clamping out-of-gamut results
pub fn lab8_to_rgb([l, a, b]: [u8; 3]) -> [u8; 3] {
    let l = l as f32 * 100.0 / 255.0;
    let a = a as f32 - 128.0;
    let b = b as f32 - 128.0;

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let x = lab_f_inv(fx) * WHITE_X;
    let y = lab_f_inv(fy);
    let z = lab_f_inv(fz) * WHITE_Z;

    let r = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
    let g = -0.969_256 * x + 1.875_991 * y + 0.041_556 * z;
    let bl = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;

    [linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(bl)]
}
