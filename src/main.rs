use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use docsynth::{DrawPolicy, GeneratorConfig, RenderMode};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Generate synthetic document pages for layout-classifier training.
#[derive(Parser, Debug)]
#[command(name = "docsynth", version, about)]
struct Cli {
    /// JSON config file; flags given here override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of pages to generate.
    #[arg(short = 'n', long)]
    amount: Option<usize>,

    #[arg(long)]
    min_width: Option<u32>,
    #[arg(long)]
    max_width: Option<u32>,
    #[arg(long)]
    min_height: Option<u32>,
    #[arg(long)]
    max_height: Option<u32>,
    #[arg(long)]
    min_margin: Option<u32>,
    #[arg(long)]
    max_margin: Option<u32>,

    /// Upper bound on bands per page.
    #[arg(long)]
    max_vertical_sections: Option<u32>,
    /// Upper bound on columns per band.
    #[arg(long)]
    max_horizontal_sections: Option<u32>,

    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Also write one JSON label record per page into this directory.
    #[arg(long)]
    labels_dir: Option<PathBuf>,
    /// Image file extension; selects the encoder.
    #[arg(long)]
    extension: Option<String>,

    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, value_enum)]
    render_mode: Option<CliRenderMode>,
    #[arg(long, value_enum)]
    title: Option<CliDraw>,
    #[arg(long, value_enum)]
    subtitle: Option<CliDraw>,
    /// Render pages on all cores.
    #[arg(long)]
    parallel: bool,

    /// Regular-weight TTF/OTF used for placeholder text.
    #[arg(long)]
    font: Option<PathBuf>,
    #[arg(long)]
    bold_font: Option<PathBuf>,
    /// Do not look for fonts in platform font directories.
    #[arg(long)]
    no_system_fonts: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliRenderMode {
    Text,
    Flat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDraw {
    Random,
    Always,
    Never,
}

impl From<CliRenderMode> for RenderMode {
    fn from(mode: CliRenderMode) -> Self {
        match mode {
            CliRenderMode::Text => RenderMode::RasterizedText,
            CliRenderMode::Flat => RenderMode::FlatColor,
        }
    }
}

impl From<CliDraw> for DrawPolicy {
    fn from(draw: CliDraw) -> Self {
        match draw {
            CliDraw::Random => DrawPolicy::Random,
            CliDraw::Always => DrawPolicy::Always,
            CliDraw::Never => DrawPolicy::Never,
        }
    }
}

impl Cli {
    fn into_config(self) -> Result<GeneratorConfig> {
        let mut config = match &self.config {
            Some(path) => GeneratorConfig::from_json_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => GeneratorConfig::default(),
        };

        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field { config.$field = value; })*
            };
        }
        set!(
            amount,
            min_width,
            max_width,
            min_height,
            max_height,
            min_margin,
            max_margin,
            max_vertical_sections,
            max_horizontal_sections,
            output_dir,
        );

        if let Some(dir) = self.labels_dir {
            config.labels_dir = Some(dir);
        }
        if let Some(ext) = self.extension {
            config.image_extension = ext;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(mode) = self.render_mode {
            config.render_mode = mode.into();
        }
        if let Some(draw) = self.title {
            config.title_draw = draw.into();
        }
        if let Some(draw) = self.subtitle {
            config.subtitle_draw = draw.into();
        }
        if self.parallel {
            config.parallel = true;
        }
        if let Some(path) = self.font {
            config.fonts.regular = Some(path);
        }
        if let Some(path) = self.bold_font {
            config.fonts.bold = Some(path);
        }
        if self.no_system_fonts {
            config.fonts.search_system = false;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}=info", env!("CARGO_PKG_NAME")))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Cli::parse().into_config()?;
    info!(
        amount = config.amount,
        output_dir = %config.output_dir.display(),
        "docsynth v{}",
        env!("CARGO_PKG_VERSION")
    );

    let report = docsynth::generate(config).context("cannot start generation")?;

    println!(
        "wrote {}/{} pages (seed {}) in {:.1} ms",
        report.written.len(),
        report.requested,
        report.seed,
        report.metrics.total_render_ms
    );
    if !report.label_files.is_empty() {
        println!("wrote {} label records", report.label_files.len());
    }
    if !report.failures.is_empty() {
        for failure in &report.failures {
            warn!(index = failure.index, "{}", failure.message);
        }
        eprintln!("{} page(s) failed", report.failures.len());
        std::process::exit(2);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{ "amount": 3, "max_width": 700, "seed": 1 }"#).unwrap();

        let cli = Cli::parse_from([
            "docsynth",
            "--config",
            path.to_str().unwrap(),
            "--amount",
            "9",
            "--render-mode",
            "flat",
            "--title",
            "never",
            "--no-system-fonts",
        ]);
        let config = cli.into_config().unwrap();
        assert_eq!(config.amount, 9);
        assert_eq!(config.max_width, 700);
        assert_eq!(config.seed, Some(1));
        assert_eq!(config.render_mode, RenderMode::FlatColor);
        assert_eq!(config.title_draw, DrawPolicy::Never);
        assert_eq!(config.subtitle_draw, DrawPolicy::Random);
        assert!(!config.fonts.search_system);
    }

    #[test]
    fn defaults_without_flags() {
        let config = Cli::parse_from(["docsynth"]).into_config().unwrap();
        assert_eq!(config, GeneratorConfig::default());
    }
}
