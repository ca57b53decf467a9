//! Synthetic document-page generator.
//!
//! Pages are partitioned at random into bands and columns, each leaf region
//! is filled with placeholder text or a flat debug color, and the result is
//! composited into an RGB page buffer and written out, optionally with a
//! label record describing every painted region.
//!
//! ```no_run
//! use docsynth::{GeneratorConfig, generate};
//!
//! let config = GeneratorConfig {
//!     amount: 4,
//!     seed: Some(7),
//!     ..Default::default()
//! };
//! let report = generate(config)?;
//! assert!(report.is_complete());
//! # Ok::<(), docsynth::SynthError>(())
//! ```

mod composite;
mod config;
mod emit;
mod error;
mod fill;
mod font;
mod labels;
mod layout;
mod metrics;
mod raster;
mod types;

pub use composite::{CompositeStats, Placement, compose_page, composite, new_page};
pub use config::{
    DEFAULT_PARAGRAPH_TEXT, DEFAULT_SUBTITLE_COLOR, DEFAULT_SUBTITLE_TEXT, DEFAULT_TITLE_COLOR,
    DEFAULT_TITLE_TEXT, DrawPolicy, FontConfig, GeneratorConfig, RasterOptions, RenderMode,
    TextRole,
};
pub use emit::{BatchReport, DirectorySink, PageFailure, PageSink, emit_batch, page_rng};
pub use error::{Result, SynthError};
pub use fill::{Filled, fill};
pub use font::{FONT_DIR_ENV, FontBook, FontWeight};
pub use labels::{LabelRecord, TextPos, write_label_record};
pub use layout::{Band, Column, PageLayout, Region, RegionRole, draw_page_size, partition};
pub use metrics::{BatchMetrics, PageMetrics};
pub use raster::{TextStyle, empty_bitmap, rasterize};
pub use types::{Color, Margin, Rect, Size};

use image::RgbImage;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GeneratedPage {
    pub index: usize,
    pub image: RgbImage,
    pub layout: PageLayout,
    /// Regions that reached the page, in paint order, with clipped boxes.
    pub placements: Vec<Placement>,
    pub metrics: PageMetrics,
}

impl GeneratedPage {
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.image)
    }
}

/// SHA-256 of the page dimensions and pixels, as lowercase hex.
pub fn fingerprint(image: &RgbImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.width().to_le_bytes());
    hasher.update(image.height().to_le_bytes());
    hasher.update(image.as_raw());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct Generator {
    config: GeneratorConfig,
    fonts: FontBook,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let fonts = FontBook::resolve(&config.fonts)?;
        Ok(Self { config, fonts })
    }

    pub fn with_fonts(config: GeneratorConfig, fonts: FontBook) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, fonts })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn generate_page<R: Rng>(&self, index: usize, rng: &mut R) -> GeneratedPage {
        let started = Instant::now();
        let size = draw_page_size(&self.config, rng);
        let layout = partition(size.width, size.height, &self.config, rng);
        let (image, stats) = compose_page(&layout, &self.config, &self.fonts);

        let metrics = PageMetrics {
            page_index: index,
            width: size.width,
            height: size.height,
            render_ms: started.elapsed().as_secs_f64() * 1000.0,
            region_count: stats.placements.len() + stats.skipped,
            composited_regions: stats.placements.len(),
            skipped_regions: stats.skipped,
            rasterization_failures: stats.rasterization_failures,
        };
        debug!(
            index,
            width = size.width,
            height = size.height,
            bands = layout.vertical_sections(),
            composited = metrics.composited_regions,
            skipped = metrics.skipped_regions,
            render_ms = metrics.render_ms,
            "page generated"
        );

        GeneratedPage {
            index,
            image,
            layout,
            placements: stats.placements,
            metrics,
        }
    }

    /// Page `index` exactly as a batch with base seed `seed` would build it.
    pub fn seeded_page(&self, seed: u64, index: usize) -> GeneratedPage {
        self.generate_page(index, &mut page_rng(seed, index))
    }

    pub fn emit_batch(&self, count: usize, sink: &dyn PageSink) -> BatchReport {
        emit_batch(self, count, sink)
    }
}

/// Batch entry point: validate `config`, then write `config.amount` pages to
/// `config.output_dir`.
///
/// Configuration problems fail before any page is produced; per-page write
/// failures are collected in the returned report.
pub fn generate(config: GeneratorConfig) -> Result<BatchReport> {
    let generator = Generator::new(config)?;
    let sink = DirectorySink::from_config(generator.config())?;
    Ok(generator.emit_batch(generator.config().amount, &sink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_fails_before_generation() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig {
            min_height: 900,
            max_height: 100,
            output_dir: dir.path().join("out"),
            ..Default::default()
        };
        assert!(matches!(
            generate(config),
            Err(SynthError::InvalidConfiguration(_))
        ));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn unwritable_extension_fails_before_any_page() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig {
            amount: 3,
            image_extension: "gif".to_string(),
            output_dir: dir.path().join("out"),
            fonts: FontConfig {
                search_system: false,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            generate(config),
            Err(SynthError::InvalidConfiguration(_))
        ));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn page_metrics_count_failed_text_regions() {
        let config = GeneratorConfig {
            min_width: 200,
            max_width: 240,
            min_height: 200,
            max_height: 240,
            title_draw: DrawPolicy::Always,
            ..Default::default()
        };
        let fonts = FontBook::from_unchecked(b"not a font".to_vec(), None);
        let generator = Generator::with_fonts(config, fonts).unwrap();
        let page = generator.seeded_page(2, 0);
        assert!(page.metrics.rasterization_failures >= page.layout.vertical_sections());
        assert_eq!(page.image.dimensions(), (page.metrics.width, page.metrics.height));
        assert!(page.placements.iter().all(|p| p.region.role == RegionRole::PlainColorBlock));
    }

    #[test]
    fn fingerprint_distinguishes_pixels_and_shape() {
        let a = RgbImage::from_pixel(2, 3, image::Rgb([1, 1, 1]));
        let b = RgbImage::from_pixel(3, 2, image::Rgb([1, 1, 1]));
        let mut c = a.clone();
        c.put_pixel(0, 0, image::Rgb([0, 1, 1]));
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));
        assert_eq!(fingerprint(&a), fingerprint(&a.clone()));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn page_dimensions_stay_within_bounds() {
        let config = GeneratorConfig {
            min_width: 50,
            max_width: 70,
            min_height: 40,
            max_height: 45,
            render_mode: RenderMode::FlatColor,
            ..Default::default()
        };
        let generator = Generator::with_fonts(config, FontBook::empty()).unwrap();
        for index in 0..40 {
            let page = generator.seeded_page(3, index);
            let (w, h) = page.image.dimensions();
            assert!((50..=70).contains(&w));
            assert!((40..=45).contains(&h));
            assert_eq!(page.layout.size, Size::new(w, h));
        }
    }
}
