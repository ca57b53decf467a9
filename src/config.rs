use crate::error::{Result, SynthError};
use crate::types::Color;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_TITLE_TEXT: &str = "this is a title text*";
pub const DEFAULT_SUBTITLE_TEXT: &str = "this is a subtitle text*";
pub const DEFAULT_PARAGRAPH_TEXT: &str = "\
Brookesia thieli, commonly known as Domergue's leaf chameleon, is a species of lizard in the chameleon family, Chamaeleonidae.
The species is endemic to eastern Madagascar. It was first described in 1969 by Édouard-Raoul Brygoo and Charles Antoine Domergue.
This B. thieli lizard was photographed on a leaf in Andasibe, Madagascar.";

pub const DEFAULT_TITLE_COLOR: Color = Color::rgb(100, 40, 15);
pub const DEFAULT_SUBTITLE_COLOR: Color = Color::rgb(130, 140, 15);

/// Selects how the region filler paints text roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// Title, subtitle and paragraph regions carry rasterized placeholder text.
    #[default]
    RasterizedText,
    /// Every region is a flat block of its debug color.
    FlatColor,
}

/// Outcome of a per-band "has title" or per-column "has subtitle" draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrawPolicy {
    /// Fair coin flip from the page's random source.
    #[default]
    Random,
    Always,
    Never,
}

/// Placeholder text and styling for one text role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRole {
    pub text: String,
    /// Font size in output pixels (em height).
    pub font_size: f32,
    pub color: Color,
    pub bold: bool,
}

/// Supersampling controls for the text rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    /// Linear render scale relative to the target region.
    pub supersample: u32,
    /// Upper bound on rendered pixels per region; the scale shrinks to fit.
    pub max_render_pixels: u64,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            supersample: 2,
            max_render_pixels: 8_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub regular: Option<PathBuf>,
    pub bold: Option<PathBuf>,
    /// Search platform font directories when no explicit file is given.
    pub search_system: bool,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            regular: None,
            bold: None,
            search_system: true,
        }
    }
}

/// Everything a generation run needs. Defaults reproduce the historical
/// generator; every field can be overridden from JSON or the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub min_margin: u32,
    pub max_margin: u32,
    /// Number of pages in a batch.
    pub amount: usize,
    pub max_vertical_sections: u32,
    pub max_horizontal_sections: u32,
    pub render_mode: RenderMode,
    pub title_draw: DrawPolicy,
    pub subtitle_draw: DrawPolicy,
    pub title: TextRole,
    /// Offset from the top of a band at which its title region ends.
    pub title_height: u32,
    pub subtitle: TextRole,
    /// Fixed height of a column's subtitle strip.
    pub subtitle_height: u32,
    pub paragraph: TextRole,
    /// Colors drawn for plain-fill column bodies.
    pub section_palette: Vec<Color>,
    pub output_dir: PathBuf,
    /// When set, per-page label records are written here.
    pub labels_dir: Option<PathBuf>,
    pub image_extension: String,
    /// Base seed; unset draws one from the thread rng.
    pub seed: Option<u64>,
    /// Generate pages on the rayon pool.
    pub parallel: bool,
    pub raster: RasterOptions,
    pub fonts: FontConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_width: 600,
            max_width: 1000,
            min_height: 800,
            max_height: 1600,
            min_margin: 0,
            max_margin: 1,
            amount: 10,
            max_vertical_sections: 5,
            max_horizontal_sections: 5,
            render_mode: RenderMode::default(),
            title_draw: DrawPolicy::default(),
            subtitle_draw: DrawPolicy::default(),
            title: TextRole {
                text: DEFAULT_TITLE_TEXT.to_string(),
                font_size: 40.0,
                color: DEFAULT_TITLE_COLOR,
                bold: true,
            },
            title_height: 48,
            subtitle: TextRole {
                text: DEFAULT_SUBTITLE_TEXT.to_string(),
                font_size: 24.0,
                color: DEFAULT_SUBTITLE_COLOR,
                bold: true,
            },
            subtitle_height: 32,
            paragraph: TextRole {
                text: DEFAULT_PARAGRAPH_TEXT.to_string(),
                font_size: 14.0,
                color: Color::BLACK,
                bold: false,
            },
            section_palette: vec![Color::RED, Color::GREEN, Color::BLUE],
            output_dir: PathBuf::from("data/synthetic"),
            labels_dir: None,
            image_extension: "png".to_string(),
            seed: None,
            parallel: false,
            raster: RasterOptions::default(),
            fonts: FontConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Load a (possibly partial) JSON config; missing fields keep defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&data)?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a page. Called before any
    /// page of a batch is generated.
    pub fn validate(&self) -> Result<()> {
        check_range("width", self.min_width, self.max_width, false)?;
        check_range("height", self.min_height, self.max_height, false)?;
        check_range("margin", self.min_margin, self.max_margin, true)?;
        if self.amount == 0 {
            return Err(invalid("amount must be positive"));
        }
        if self.max_vertical_sections == 0 {
            return Err(invalid("max_vertical_sections must be positive"));
        }
        if self.max_horizontal_sections == 0 {
            return Err(invalid("max_horizontal_sections must be positive"));
        }
        if self.title_height == 0 {
            return Err(invalid("title_height must be positive"));
        }
        if self.subtitle_height == 0 {
            return Err(invalid("subtitle_height must be positive"));
        }
        for (name, role) in [
            ("title", &self.title),
            ("subtitle", &self.subtitle),
            ("paragraph", &self.paragraph),
        ] {
            if !(role.font_size.is_finite() && role.font_size > 0.0) {
                return Err(invalid(&format!(
                    "{name}.font_size must be a positive number, got {}",
                    role.font_size
                )));
            }
        }
        if self.section_palette.is_empty() {
            return Err(invalid("section_palette must contain at least one color"));
        }
        if self.raster.supersample == 0 {
            return Err(invalid("raster.supersample must be positive"));
        }
        if self.raster.max_render_pixels == 0 {
            return Err(invalid("raster.max_render_pixels must be positive"));
        }
        self.image_format()?;
        Ok(())
    }

    pub(crate) fn image_format(&self) -> Result<ImageFormat> {
        writable_format(&self.image_extension)
    }
}

/// Encoder for `extension`, if this build can write it.
pub(crate) fn writable_format(extension: &str) -> Result<ImageFormat> {
    match ImageFormat::from_extension(extension) {
        Some(format) if format.writing_enabled() => Ok(format),
        Some(format) => Err(invalid(&format!(
            "image extension '{extension}' ({format:?}) has no encoder in this build"
        ))),
        None => Err(invalid(&format!("unsupported image extension '{extension}'"))),
    }
}

fn check_range(name: &str, min: u32, max: u32, allow_zero: bool) -> Result<()> {
    if !allow_zero && min == 0 {
        return Err(invalid(&format!("min_{name} must be positive")));
    }
    if min > max {
        return Err(invalid(&format!(
            "min_{name} ({min}) exceeds max_{name} ({max})"
        )));
    }
    Ok(())
}

fn invalid(message: &str) -> SynthError {
    SynthError::InvalidConfiguration(message.to_string())
}
