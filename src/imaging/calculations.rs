//! Pure calculation functions for crop geometry and output dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::PixelRect;

/// Rectangle in percent of the displayed image (`0.0..=100.0` on both axes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PercentRect {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Calculate output dimensions bounded by `max`, preserving aspect ratio.
///
/// Scales down, never up. Dimensions already inside the box are returned
/// unchanged. Results are floored, with a floor of 1px per axis.
///
/// # Examples
/// ```
/// # use famille_photo::imaging::calculate_bounded_dimensions;
/// assert_eq!(calculate_bounded_dimensions((1000, 1000), (512, 512)), (512, 512));
/// assert_eq!(calculate_bounded_dimensions((2000, 1000), (512, 512)), (512, 256));
/// assert_eq!(calculate_bounded_dimensions((300, 200), (512, 512)), (300, 200));
/// ```
pub fn calculate_bounded_dimensions(source: (u32, u32), max: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = max;

    if src_w <= max_w && src_h <= max_h {
        return (src_w, src_h);
    }

    // Integer math: the limiting axis lands exactly on its bound.
    let (src_w, src_h, max_w, max_h) = (src_w as u64, src_h as u64, max_w as u64, max_h as u64);
    let (w, h) = if src_w * max_h >= src_h * max_w {
        (max_w, src_h * max_w / src_w)
    } else {
        (src_w * max_h / src_h, max_h)
    };
    (w.max(1) as u32, h.max(1) as u32)
}

/// Initial centered crop for an image shown at `media` pixels.
///
/// Takes `coverage` percent of the width, derives the height from `aspect`
/// (width / height), and falls back to `coverage` percent of the height when
/// that would overflow. For a square aspect this is `coverage` percent of the
/// shorter side.
pub fn center_aspect_rect(media: (u32, u32), aspect: f64, coverage: f64) -> PercentRect {
    let (media_w, media_h) = (media.0 as f64, media.1 as f64);
    let share = coverage.clamp(1.0, 100.0) / 100.0;

    let mut w_px = media_w * share;
    let mut h_px = w_px / aspect;
    if h_px > media_h * share {
        h_px = media_h * share;
        w_px = h_px * aspect;
    }

    let width = w_px / media_w * 100.0;
    let height = h_px / media_h * 100.0;
    PercentRect {
        x: (100.0 - width) / 2.0,
        y: (100.0 - height) / 2.0,
        width,
        height,
    }
}

/// Scale a rectangle about its center by `factor`.
pub fn scale_about_center(rect: PercentRect, factor: f64) -> PercentRect {
    let (cx, cy) = rect.center();
    let width = rect.width * factor;
    let height = rect.height * factor;
    PercentRect {
        x: cx - width / 2.0,
        y: cy - height / 2.0,
        width,
        height,
    }
}

/// Force a rectangle inside `[0, 100]` on both axes.
///
/// An oversized rectangle is shrunk by a single factor on both axes, so the
/// pixel aspect ratio survives; then it is shifted back inside the bounds.
/// The shrunk sides are capped at 100 since `w * (100 / w)` can round above it.
pub fn clamp_rect(rect: PercentRect) -> PercentRect {
    let overflow = (100.0 / rect.width).min(100.0 / rect.height);
    let (width, height) = if overflow < 1.0 {
        (
            (rect.width * overflow).min(100.0),
            (rect.height * overflow).min(100.0),
        )
    } else {
        (rect.width, rect.height)
    };
    PercentRect {
        x: rect.x.clamp(0.0, (100.0 - width).max(0.0)),
        y: rect.y.clamp(0.0, (100.0 - height).max(0.0)),
        width,
        height,
    }
}

/// Convert a percent rectangle to displayed pixels.
///
/// The height is derived from the rounded width and `aspect` so that the
/// pixel crop honors the aspect ratio exactly wherever rounding allows.
pub fn percent_to_pixels(rect: PercentRect, display: (u32, u32), aspect: f64) -> PixelRect {
    let (disp_w, disp_h) = display;
    let mut width = ((rect.width * disp_w as f64 / 100.0).round() as u32).min(disp_w);
    let mut height = ((width as f64 / aspect).round() as u32).min(disp_h);
    if height == disp_h {
        width = ((height as f64 * aspect).round() as u32).min(disp_w);
    }
    if width == 0 || height == 0 {
        width = 0;
        height = 0;
    }

    let x = ((rect.x * disp_w as f64 / 100.0).round() as u32).min(disp_w - width);
    let y = ((rect.y * disp_h as f64 / 100.0).round() as u32).min(disp_h - height);
    PixelRect {
        x,
        y,
        width,
        height,
    }
}

/// Map a crop from displayed pixels back to the image's natural pixels.
///
/// Uses `natural / displayed` per axis and clamps the result to the natural
/// bounds. A non-degenerate input never maps to a degenerate region.
pub fn scale_crop_to_natural(
    crop: PixelRect,
    display: (u32, u32),
    natural: (u32, u32),
) -> PixelRect {
    let scale_x = natural.0 as f64 / display.0 as f64;
    let scale_y = natural.1 as f64 / display.1 as f64;

    let x = ((crop.x as f64 * scale_x).floor() as u32).min(natural.0.saturating_sub(1));
    let y = ((crop.y as f64 * scale_y).floor() as u32).min(natural.1.saturating_sub(1));
    let width = ((crop.width as f64 * scale_x).round() as u32).clamp(1, natural.0 - x);
    let height = ((crop.height as f64 * scale_y).round() as u32).clamp(1, natural.1 - y);

    PixelRect {
        x,
        y,
        width,
        height,
    }
}
