//! Screen matching for image and color targets.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};

/// Screens wider than this are downscaled before matching.
const MATCH_WIDTH: u32 = 480;

/// Finds text on a captured screen. There is no built-in implementation;
/// text targets fail unless one is supplied.
pub trait TextLocator: Send + Sync {
    /// Center of the first occurrence of `text`, in screen pixels.
    fn locate(&self, screen: &RgbaImage, text: &str, partial_match: bool) -> Option<(u32, u32)>;
}

fn mean_and_energy(values: impl Iterator<Item = f64>) -> (f64, f64, usize) {
    let mut sum = 0.0;
    let mut sq = 0.0;
    let mut n = 0;
    for v in values {
        sum += v;
        sq += v * v;
        n += 1;
    }
    if n == 0 {
        return (0.0, 0.0, 0);
    }
    let mean = sum / n as f64;
    (mean, sq - sum * mean, n)
}

fn score_at(screen: &GrayImage, template: &GrayImage, t_mean: f64, t_energy: f64, ox: u32, oy: u32) -> f64 {
    let (w, h) = template.dimensions();
    let window = (0..h).flat_map(|y| (0..w).map(move |x| (x, y)));
    let (s_mean, s_energy, _) =
        mean_and_energy(window.clone().map(|(x, y)| screen.get_pixel(ox + x, oy + y)[0] as f64));

    if t_energy <= f64::EPSILON || s_energy <= f64::EPSILON {
        // Flat patches: compare brightness only.
        if t_energy <= f64::EPSILON && s_energy <= f64::EPSILON {
            return 1.0 - (s_mean - t_mean).abs() / 255.0;
        }
        return 0.0;
    }

    let cross: f64 = window
        .map(|(x, y)| {
            let s = screen.get_pixel(ox + x, oy + y)[0] as f64 - s_mean;
            let t = template.get_pixel(x, y)[0] as f64 - t_mean;
            s * t
        })
        .sum();
    cross / (s_energy * t_energy).sqrt()
}

/// Best match of `template` on `screen` by normalized cross-correlation of
/// the grayscale images. Returns the match center in screen pixels when the
/// score reaches `confidence`.
pub fn locate_template(screen: &RgbaImage, template: &RgbaImage, confidence: f32) -> Option<(u32, u32)> {
    let (sw, sh) = screen.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > sw || th > sh {
        return None;
    }

    let factor = (sw / MATCH_WIDTH).max(1);
    let (screen, template) = if factor > 1 {
        let (ttw, tth) = ((tw / factor).max(1), (th / factor).max(1));
        (
            imageops::grayscale(&imageops::resize(screen, sw / factor, sh / factor, FilterType::Triangle)),
            imageops::grayscale(&imageops::resize(template, ttw, tth, FilterType::Triangle)),
        )
    } else {
        (imageops::grayscale(screen), imageops::grayscale(template))
    };

    let (sw, sh) = screen.dimensions();
    let (tw, th) = template.dimensions();
    if tw > sw || th > sh {
        return None;
    }

    let (t_mean, t_energy, _) = mean_and_energy(template.pixels().map(|p| p[0] as f64));

    let mut best: Option<(f64, u32, u32)> = None;
    for oy in 0..=(sh - th) {
        for ox in 0..=(sw - tw) {
            let score = score_at(&screen, &template, t_mean, t_energy, ox, oy);
            if best.map_or(true, |(b, _, _)| score > b) {
                best = Some((score, ox, oy));
            }
        }
    }

    let (score, ox, oy) = best?;
    if score < confidence as f64 {
        return None;
    }
    Some(((ox + tw / 2) * factor, (oy + th / 2) * factor))
}

/// Whether the pixel at `(x, y)` is within `tolerance` of `color` on every channel.
pub fn color_matches(screen: &RgbaImage, x: u32, y: u32, color: [u8; 3], tolerance: u8) -> bool {
    if x >= screen.width() || y >= screen.height() {
        return false;
    }
    let pixel = screen.get_pixel(x, y);
    pixel.0[..3]
        .iter()
        .zip(color)
        .all(|(have, want)| have.abs_diff(want) <= tolerance)
}
