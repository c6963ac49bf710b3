//! Pixel data (`Textures/*.png|jpg|tga`), decoded to RGBA8 on the CPU.
//!
//! Images never fail outward: a missing or corrupt file fills the instance
//! with its fill policy instead, so everything built on top (textures,
//! materials, cubemaps) keeps working with placeholder pixels.

use image::imageops::FilterType;

use crate::assets::{Asset, AssetIo, AssetKind, LoadContext};
use crate::errors::{CandelaError, Result};

/// Checker squares are 32 px on a side.
const CHECKER_SIZE: u32 = 32;
/// Fallback edge when a fill has no size to inherit.
const DEFAULT_FILL_EDGE: u32 = 256;

/// Placeholder pattern used for default instances and failed decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    Solid([u8; 4]),
    /// 32 px checkerboard of the two colors.
    Checkered([u8; 4], [u8; 4]),
}

impl FillPolicy {
    /// The classic placeholder: flat-normal blue checkered with black.
    #[must_use]
    pub fn checkered() -> Self {
        Self::Checkered([128, 128, 255, 255], [0, 0, 0, 255])
    }

    /// Flat-normal blue, the solid counterpart of [`Self::checkered`].
    #[must_use]
    pub fn solid() -> Self {
        Self::Solid([128, 128, 255, 255])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageParams {
    /// Forces the decoded image to this size.
    pub size: Option<(u32, u32)>,
    /// Linear (true) or nearest-neighbor resize when `size` forces a rescale.
    pub smooth_resize: bool,
    pub fill: FillPolicy,
}

impl Default for ImageParams {
    /// The shared default image: one opaque white pixel.
    fn default() -> Self {
        Self {
            size: None,
            smooth_resize: true,
            fill: FillPolicy::Solid([255, 255, 255, 255]),
        }
    }
}

impl ImageParams {
    #[must_use]
    pub fn sized(width: u32, height: u32, fill: FillPolicy) -> Self {
        Self {
            size: Some((width, height)),
            smooth_resize: true,
            fill,
        }
    }
}

/// CPU-side RGBA8 pixel rectangle, remembering the policies it was loaded
/// under so a failed reload can refill consistently.
#[derive(Clone)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    params: ImageParams,
}

impl Image {
    /// A `width`×`height` solid-color image.
    #[must_use]
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let mut image = Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
            params: ImageParams {
                size: Some((width, height)),
                smooth_resize: true,
                fill: FillPolicy::Solid(color),
            },
        };
        image.fill(width, height, FillPolicy::Solid(color));
        image
    }

    /// Replaces the content according to `policy`.
    pub fn fill(&mut self, width: u32, height: u32, policy: FillPolicy) {
        let (width, height) = (width.max(1), height.max(1));
        self.width = width;
        self.height = height;
        self.pixels = match policy {
            FillPolicy::Solid(color) => color.repeat((width * height) as usize),
            FillPolicy::Checkered(primary, secondary) => {
                let mut pixels = Vec::with_capacity((width * height * 4) as usize);
                for y in 0..height {
                    for x in 0..width {
                        let even = ((x / CHECKER_SIZE) + (y / CHECKER_SIZE)) % 2 == 0;
                        pixels.extend_from_slice(if even { &primary } else { &secondary });
                    }
                }
                pixels
            }
        };
    }

    /// Fills from the stored params: forced size when given, otherwise 1 px
    /// for solids and the standard placeholder edge for checkers.
    pub fn fill_from_params(&mut self) {
        let (width, height) = self.params.size.unwrap_or(match self.params.fill {
            FillPolicy::Solid(_) => (1, 1),
            FillPolicy::Checkered(..) => (DEFAULT_FILL_EDGE, DEFAULT_FILL_EDGE),
        });
        self.fill(width, height, self.params.fill);
    }

    /// Decodes `bytes` (PNG/JPEG/TGA) to RGBA8, rescaling per params.
    pub fn decode(bytes: &[u8], params: &ImageParams) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(CandelaError::ImageDecodeError(
                "decoded image has a zero dimension".to_owned(),
            ));
        }
        let decoded = match params.size {
            Some((w, h)) if (w, h) != (width, height) => {
                let filter = if params.smooth_resize {
                    FilterType::Triangle
                } else {
                    FilterType::Nearest
                };
                image::imageops::resize(&decoded, w.max(1), h.max(1), filter)
            }
            _ => decoded,
        };
        let (width, height) = decoded.dimensions();
        Ok(Self {
            width,
            height,
            pixels: decoded.into_raw(),
            params: params.clone(),
        })
    }

    /// A rescaled copy. Returns a plain clone when the size already matches.
    #[must_use]
    pub fn resized(&self, width: u32, height: u32, smooth: bool) -> Self {
        if (width, height) == (self.width, self.height) {
            return self.clone();
        }
        let buffer = image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| image::RgbaImage::new(1, 1));
        let filter = if smooth {
            FilterType::Triangle
        } else {
            FilterType::Nearest
        };
        let resized = image::imageops::resize(&buffer, width.max(1), height.max(1), filter);
        Self {
            width: resized.width(),
            height: resized.height(),
            pixels: resized.into_raw(),
            params: self.params.clone(),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Tightly packed RGBA8 rows.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA of one pixel. Panics outside the image in debug builds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * self.width + x) * 4) as usize;
        let mut color = [0; 4];
        color.copy_from_slice(&self.pixels[offset..offset + 4]);
        color
    }
}

impl Asset for Image {
    type Params = ImageParams;
    const KIND: AssetKind = AssetKind::Image;

    fn new(params: &ImageParams) -> Self {
        let mut image = Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
            params: params.clone(),
        };
        image.fill_from_params();
        image
    }

    /// Images never reroute to the shared default record; a bad source
    /// fills this record in place instead.
    fn source_exists(_io: &AssetIo, _name: &str, _params: &ImageParams) -> bool {
        true
    }

    fn load_default(&mut self, _ctx: &mut LoadContext<'_>) {
        // new() already applied the fill policy.
    }

    fn initialize(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let params = self.params.clone();
        let bytes = ctx.io().read_bytes(Self::KIND, ctx.name())?;
        *self = Self::decode(&bytes, &params)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_fill_is_uniform() {
        let image = Image::solid(4, 2, [10, 20, 30, 40]);
        assert_eq!(image.width(), 4);
        assert_eq!(image.height(), 2);
        assert!(image.pixels().chunks(4).all(|px| px == [10, 20, 30, 40]));
    }

    #[test]
    fn checker_squares_flip_every_32_pixels() {
        let mut image = Image::solid(1, 1, [0; 4]);
        image.fill(64, 64, FillPolicy::checkered());
        assert_eq!(image.pixel(0, 0), [128, 128, 255, 255]);
        assert_eq!(image.pixel(31, 31), [128, 128, 255, 255]);
        assert_eq!(image.pixel(32, 0), [0, 0, 0, 255]);
        assert_eq!(image.pixel(0, 32), [0, 0, 0, 255]);
        assert_eq!(image.pixel(32, 32), [128, 128, 255, 255]);
    }

    #[test]
    fn default_params_fill_one_white_pixel() {
        let image = Image::new(&ImageParams::default());
        assert_eq!((image.width(), image.height()), (1, 1));
        assert_eq!(image.pixel(0, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn checker_fill_without_size_uses_the_standard_edge() {
        let image = Image::new(&ImageParams {
            fill: FillPolicy::checkered(),
            ..ImageParams::default()
        });
        assert_eq!(image.width(), DEFAULT_FILL_EDGE);
    }

    #[test]
    fn decode_honors_a_forced_size() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(8, 8, image::Rgba([255, 0, 0, 255]))
            .write_to(
                &mut std::io::Cursor::new(&mut png),
                image::ImageFormat::Png,
            )
            .unwrap();
        let decoded = Image::decode(
            &png,
            &ImageParams::sized(4, 4, FillPolicy::Solid([0; 4])),
        )
        .unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
        assert_eq!(decoded.pixel(0, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        assert!(Image::decode(b"not an image", &ImageParams::default()).is_err());
    }

    #[test]
    fn resized_copy_keeps_solid_content() {
        let image = Image::solid(2, 2, [9, 9, 9, 255]);
        let grown = image.resized(8, 8, false);
        assert_eq!((grown.width(), grown.height()), (8, 8));
        assert_eq!(grown.pixel(7, 7), [9, 9, 9, 255]);
    }
}
