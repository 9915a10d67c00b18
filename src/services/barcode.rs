use image::{ImageBuffer, Luma};
use serde::Serialize;

pub const BAR_COUNT: usize = 80;
const FALLBACK_SEED: &str = "DEFAULT";
const FNV_OFFSET: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

#[derive(thiserror::Error, Debug)]
pub enum BarcodeError {
    #[error("Image encoding failed: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),
}

/// Decorative bar pattern derived from a coupon code.
///
/// Purely cosmetic: the same seed always yields the same bars, but nothing
/// about it is scannable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Barcode {
    pub seed: String,
    /// Bar widths in modules (1..=4), alternating dark and light, dark first
    pub widths: Vec<u8>,
}

impl Barcode {
    pub fn from_seed(seed: &str) -> Self {
        let seed = if seed.is_empty() { FALLBACK_SEED } else { seed };

        // FNV-1a over UTF-16 units
        let mut h = FNV_OFFSET;
        for unit in seed.encode_utf16() {
            h ^= u32::from(unit);
            h = h.wrapping_mul(FNV_PRIME);
        }

        let mut widths = Vec::with_capacity(BAR_COUNT);
        for _ in 0..BAR_COUNT {
            h ^= h << 13;
            h ^= h >> 17;
            h ^= h << 5;
            widths.push((h % 4 + 1) as u8);
        }

        Self {
            seed: seed.to_string(),
            widths,
        }
    }

    /// Width of the whole pattern in modules
    pub fn total_width(&self) -> u32 {
        self.widths.iter().map(|&w| u32::from(w)).sum()
    }

    /// Iterates `(offset, width)` of every dark bar
    pub fn dark_bars(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let mut offset = 0u32;
        self.widths.iter().enumerate().filter_map(move |(i, &w)| {
            let start = offset;
            offset += u32::from(w);
            (i % 2 == 0).then_some((start, u32::from(w)))
        })
    }

    pub fn render_svg(&self, height: u32) -> String {
        let width = self.total_width();
        let mut svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" shape-rendering="crispEdges"><rect width="{w}" height="{h}" fill="#fff"/>"##,
            w = width,
            h = height
        );
        for (x, w) in self.dark_bars() {
            svg.push_str(&format!(
                r##"<rect x="{}" y="0" width="{}" height="{}" fill="#000"/>"##,
                x, w, height
            ));
        }
        svg.push_str("</svg>");
        svg
    }

    /// Grayscale PNG with each module `module_px` pixels wide
    pub fn render_png(&self, module_px: u32, height: u32) -> Result<Vec<u8>, BarcodeError> {
        if module_px == 0 || height == 0 {
            return Err(BarcodeError::InvalidDimensions(format!(
                "module_px={} height={}",
                module_px, height
            )));
        }

        let mut columns = Vec::with_capacity(self.total_width() as usize);
        for (i, &w) in self.widths.iter().enumerate() {
            let shade = if i % 2 == 0 { 0u8 } else { 255u8 };
            columns.extend(std::iter::repeat(shade).take(w as usize));
        }

        let img = ImageBuffer::<Luma<u8>, Vec<u8>>::from_fn(
            columns.len() as u32 * module_px,
            height,
            |x, _| Luma([columns[(x / module_px) as usize]]),
        );

        let mut png_data = Vec::new();
        image::DynamicImage::ImageLuma8(img).write_to(
            &mut std::io::Cursor::new(&mut png_data),
            image::ImageFormat::Png,
        )?;

        Ok(png_data)
    }
}
