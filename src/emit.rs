use crate::Generator;
use crate::config::{GeneratorConfig, writable_format};
use crate::error::{Result, SynthError};
use crate::labels::{LabelRecord, write_label_record};
use crate::metrics::{BatchMetrics, PageMetrics};
use image::{ImageFormat, RgbImage};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, error, info, info_span};

/// Destination for finished pages. Shared across rayon workers when the
/// batch runs in parallel.
pub trait PageSink: Sync {
    /// Persist page `index` and return where it went.
    fn write_page(&self, index: usize, page: &RgbImage) -> Result<PathBuf>;

    /// File name recorded in label records for page `index`.
    fn file_name(&self, index: usize) -> String;
}

/// Writes `<dir>/<index>.<extension>`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    extension: String,
    format: ImageFormat,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Result<Self> {
        let format = writable_format(extension)?;
        Ok(Self {
            dir: dir.into(),
            extension: extension.to_string(),
            format,
        })
    }

    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        Self::new(config.output_dir.clone(), &config.image_extension)
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(self.file_name(index))
    }
}

impl PageSink for DirectorySink {
    fn write_page(&self, index: usize, page: &RgbImage) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(index);
        page.save_with_format(&path, self.format)?;
        Ok(path)
    }

    fn file_name(&self, index: usize) -> String {
        format!("{index}.{}", self.extension)
    }
}

/// A page that could not be persisted. The rest of the batch is unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Base seed every page rng was derived from.
    pub seed: u64,
    pub requested: usize,
    /// Image paths in page order.
    pub written: Vec<PathBuf>,
    pub label_files: Vec<PathBuf>,
    pub failures: Vec<PageFailure>,
    pub metrics: BatchMetrics,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.written.len() == self.requested
    }
}

/// Random source for page `index` of a batch with `base_seed`.
///
/// Every page gets its own generator, so serial and parallel runs with the
/// same base seed produce the same pages.
pub fn page_rng(base_seed: u64, index: usize) -> SmallRng {
    SmallRng::seed_from_u64(base_seed.wrapping_add(index as u64))
}

/// Generate and persist `count` pages named by their zero-based index.
///
/// Failures to write a page (or its labels) are logged and collected in
/// the report; they never stop the batch.
pub fn emit_batch(generator: &Generator, count: usize, sink: &dyn PageSink) -> BatchReport {
    let config = generator.config();
    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    info!(count, seed, parallel = config.parallel, "starting batch");

    let outcomes: Vec<PageOutcome> = if config.parallel {
        (0..count)
            .into_par_iter()
            .map(|index| run_page(generator, seed, index, sink))
            .collect()
    } else {
        (0..count)
            .map(|index| run_page(generator, seed, index, sink))
            .collect()
    };

    let mut report = BatchReport {
        seed,
        requested: count,
        ..Default::default()
    };
    let mut page_metrics = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        page_metrics.push(outcome.metrics);
        if let Some(path) = outcome.image {
            report.written.push(path);
        }
        if let Some(path) = outcome.labels {
            report.label_files.push(path);
        }
        report.failures.extend(outcome.failures);
    }
    report.metrics = BatchMetrics::from_pages(page_metrics);

    info!(
        written = report.written.len(),
        failed = report.failures.len(),
        render_ms = report.metrics.total_render_ms,
        "batch finished"
    );
    report
}

struct PageOutcome {
    image: Option<PathBuf>,
    labels: Option<PathBuf>,
    failures: Vec<PageFailure>,
    metrics: PageMetrics,
}

fn run_page(generator: &Generator, seed: u64, index: usize, sink: &dyn PageSink) -> PageOutcome {
    let _span = info_span!("page", index).entered();
    let mut rng = page_rng(seed, index);
    let page = generator.generate_page(index, &mut rng);

    let mut outcome = PageOutcome {
        image: None,
        labels: None,
        failures: Vec::new(),
        metrics: page.metrics.clone(),
    };

    match sink.write_page(index, &page.image) {
        Ok(path) => {
            debug!(path = %path.display(), "page written");
            outcome.image = Some(path);
        }
        Err(err) => {
            let err = SynthError::page_write(index, err);
            error!(%err, "page not written");
            outcome.failures.push(PageFailure {
                index,
                message: err.to_string(),
            });
            return outcome;
        }
    }

    if let Some(dir) = generator.config().labels_dir.as_deref() {
        let record = LabelRecord::from_placements(sink.file_name(index), &page.placements);
        match write_label_record(dir, index, &record) {
            Ok(path) => outcome.labels = Some(path),
            Err(err) => {
                error!(%err, "labels not written");
                outcome.failures.push(PageFailure {
                    index,
                    message: format!("failed to write labels for page {index}: {err}"),
                });
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderMode;
    use crate::font::FontBook;
    use std::sync::Mutex;

    fn flat_generator(amount: usize, seed: u64, parallel: bool) -> Generator {
        let config = GeneratorConfig {
            min_width: 60,
            max_width: 90,
            min_height: 80,
            max_height: 120,
            amount,
            seed: Some(seed),
            parallel,
            render_mode: RenderMode::FlatColor,
            ..Default::default()
        };
        Generator::with_fonts(config, FontBook::empty()).unwrap()
    }

    /// Keeps page fingerprints in memory instead of touching the disk.
    #[derive(Default)]
    struct MemorySink {
        pages: Mutex<Vec<(usize, String)>>,
    }

    impl PageSink for MemorySink {
        fn write_page(&self, index: usize, page: &RgbImage) -> Result<PathBuf> {
            let digest = crate::fingerprint(page);
            self.pages.lock().unwrap().push((index, digest));
            Ok(PathBuf::from(self.file_name(index)))
        }

        fn file_name(&self, index: usize) -> String {
            format!("{index}.mem")
        }
    }

    #[test]
    fn directory_sink_names_pages_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("out"), "png").unwrap();
        let path = sink
            .write_page(4, &RgbImage::from_pixel(3, 2, image::Rgb([1, 2, 3])))
            .unwrap();
        assert_eq!(path, dir.path().join("out").join("4.png"));
        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back.dimensions(), (3, 2));
        assert_eq!(back.get_pixel(0, 0).0, [1, 2, 3]);
    }

    #[test]
    fn unknown_extension_is_a_configuration_error() {
        for ext in ["xyz", "gif", "bmp"] {
            assert!(
                matches!(
                    DirectorySink::new("out", ext),
                    Err(SynthError::InvalidConfiguration(_))
                ),
                "{ext}"
            );
        }
    }

    #[test]
    fn parallel_and_serial_batches_match() {
        let serial = MemorySink::default();
        let report = emit_batch(&flat_generator(6, 11, false), 6, &serial);
        assert!(report.is_complete());
        assert_eq!(report.seed, 11);

        let parallel = MemorySink::default();
        let report = emit_batch(&flat_generator(6, 11, true), 6, &parallel);
        assert!(report.is_complete());

        let mut a = serial.pages.into_inner().unwrap();
        let mut b = parallel.pages.into_inner().unwrap();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn report_metrics_cover_every_page() {
        let sink = MemorySink::default();
        let report = emit_batch(&flat_generator(3, 5, false), 3, &sink);
        assert_eq!(report.metrics.pages.len(), 3);
        for (i, page) in report.metrics.pages.iter().enumerate() {
            assert_eq!(page.page_index, i);
            assert!((60..=90).contains(&page.width));
            assert!((80..=120).contains(&page.height));
            assert_eq!(page.region_count, page.composited_regions + page.skipped_regions);
        }
    }

    #[test]
    fn page_rng_differs_per_index() {
        let a: u64 = page_rng(1, 0).random();
        let b: u64 = page_rng(1, 1).random();
        let again: u64 = page_rng(1, 0).random();
        assert_ne!(a, b);
        assert_eq!(a, again);
    }
}
