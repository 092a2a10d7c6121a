//! Alpha flattening onto an opaque white background.
//!
//! JPEG has no alpha channel, so transparent sources are composited with
//! standard "over" blending (`out = fg * a + bg * (1 - a)` per channel)
//! before encoding. A damaged alpha plane degrades to the unblended color
//! buffer instead of failing the transcode.

use image::{DynamicImage, Rgb, RgbImage};

/// Background every transparent pixel is composited onto.
pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Outcome of alpha flattening. Every variant carries a usable RGB buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Flattened {
    /// The source had no alpha channel; pixels are unchanged.
    Opaque(RgbImage),
    /// Alpha was composited onto the background.
    Composited(RgbImage),
    /// Compositing was impossible; the color channels are used as-is.
    Degraded { image: RgbImage, reason: String },
}

impl Flattened {
    pub fn image(&self) -> &RgbImage {
        match self {
            Flattened::Opaque(image) | Flattened::Composited(image) => image,
            Flattened::Degraded { image, .. } => image,
        }
    }

    pub fn into_image(self) -> RgbImage {
        match self {
            Flattened::Opaque(image) | Flattened::Composited(image) => image,
            Flattened::Degraded { image, .. } => image,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Flattened::Degraded { .. })
    }
}

/// Flatten any decoded image to 3-channel RGB8 with no alpha.
///
/// Alpha is composited before the channel conversion; converting first
/// would drop the alpha plane and turn transparent areas black.
///
/// The plane built here always matches the pixel count, so this path never
/// yields [`Flattened::Degraded`]; that arm is kept for codecs that hand over
/// a separate alpha plane to [`composite_over_background`].
pub fn flatten(image: DynamicImage) -> Flattened {
    if !image.color().has_alpha() {
        return Flattened::Opaque(image.into_rgb8());
    }

    let rgba = image.into_rgba8();
    let (width, height) = rgba.dimensions();
    let mut color = RgbImage::new(width, height);
    let mut alpha = Vec::with_capacity(width as usize * height as usize);
    for (src, dst) in rgba.pixels().zip(color.pixels_mut()) {
        let [r, g, b, a] = src.0;
        *dst = Rgb([r, g, b]);
        alpha.push(a);
    }

    composite_over_background(color, &alpha)
}

/// Composite `color` onto [`BACKGROUND`] using a row-major alpha plane.
///
/// The plane must hold exactly one byte per pixel; any other length is
/// treated as malformed and yields [`Flattened::Degraded`].
pub fn composite_over_background(mut color: RgbImage, alpha: &[u8]) -> Flattened {
    let (width, height) = color.dimensions();
    let expected = width as usize * height as usize;
    if alpha.len() != expected {
        return Flattened::Degraded {
            image: color,
            reason: format!(
                "alpha plane has {} bytes, expected {} for {}x{}",
                alpha.len(),
                expected,
                width,
                height
            ),
        };
    }

    for (pixel, &a) in color.pixels_mut().zip(alpha) {
        for (channel, bg) in pixel.0.iter_mut().zip(BACKGROUND.0) {
            *channel = blend(*channel, bg, a);
        }
    }

    Flattened::Composited(color)
}

/// `fg * a + bg * (1 - a)` in 8-bit fixed point, rounded to nearest.
fn blend(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    let value = u32::from(fg) * a + u32::from(bg) * (255 - a);
    ((value + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, LumaA, Rgba, RgbaImage};

    #[test]
    fn opaque_rgb_is_unchanged() {
        let image = RgbImage::from_fn(4, 3, |x, y| Rgb([x as u8 * 10, y as u8 * 20, 7]));
        let flattened = flatten(DynamicImage::ImageRgb8(image.clone()));

        assert_eq!(flattened, Flattened::Opaque(image));
    }

    #[test]
    fn rgba_matches_over_formula() {
        let mut rgba = RgbaImage::new(3, 1);
        rgba.put_pixel(0, 0, Rgba([200, 100, 0, 255])); // opaque
        rgba.put_pixel(1, 0, Rgba([200, 100, 0, 0])); // transparent
        rgba.put_pixel(2, 0, Rgba([200, 100, 0, 128])); // half

        let flattened = flatten(DynamicImage::ImageRgba8(rgba));
        assert!(matches!(flattened, Flattened::Composited(_)));

        let out = flattened.into_image();
        assert_eq!(out.get_pixel(0, 0), &Rgb([200, 100, 0]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([255, 255, 255]));

        let a = 128.0 / 255.0;
        let expected = |fg: f64| fg * a + 255.0 * (1.0 - a);
        let px = out.get_pixel(2, 0).0;
        for (got, fg) in px.iter().zip([200.0, 100.0, 0.0]) {
            assert!((f64::from(*got) - expected(fg)).abs() <= 1.0, "{got} vs {}", expected(fg));
        }
    }

    #[test]
    fn grey_alpha_is_flattened_to_rgb() {
        let image = GrayAlphaImage::from_pixel(2, 2, LumaA([0, 0]));
        let out = flatten(DynamicImage::ImageLumaA8(image)).into_image();

        assert_eq!(out.dimensions(), (2, 2));
        assert!(out.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn decoded_alpha_never_degrades() {
        let rgba = RgbaImage::from_fn(7, 5, |x, y| Rgba([x as u8, y as u8, 0, (x * y) as u8]));
        let la = GrayAlphaImage::from_pixel(3, 9, LumaA([40, 90]));

        assert!(!flatten(DynamicImage::ImageRgba8(rgba)).is_degraded());
        assert!(!flatten(DynamicImage::ImageLumaA8(la)).is_degraded());
    }

    #[test]
    fn malformed_alpha_plane_degrades() {
        let color = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        let flattened = composite_over_background(color.clone(), &[0u8; 5]);

        assert!(flattened.is_degraded());
        assert_eq!(flattened.image(), &color);
    }

    #[test]
    fn blend_endpoints() {
        assert_eq!(blend(0, 255, 0), 255);
        assert_eq!(blend(0, 255, 255), 0);
        assert_eq!(blend(77, 255, 255), 77);
    }
}
