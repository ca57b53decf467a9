//! Random page partitioning.
//!
//! A page is cut into `V` equal-height bands; each band optionally carries a
//! title strip and is cut into `H` equal-width columns, where `H` is drawn
//! independently per band. Each column optionally carries a subtitle strip
//! above its body.
//!
//! All arithmetic is integer and unclamped: remainders of the divisions are
//! dropped, titles taller than their band overlap the band's columns, and
//! margins wider than a column invert it. The resulting degenerate rectangles
//! are part of the output distribution and are left for the compositor to
//! skip.

use crate::config::{DrawPolicy, GeneratorConfig};
use crate::types::{Color, Margin, Rect, Size};
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RegionRole {
    Title,
    Subtitle,
    ParagraphPlaceholder,
    PlainColorBlock,
}

impl RegionRole {
    /// Class name shared with the annotation tool's label records.
    pub fn label(self) -> &'static str {
        match self {
            RegionRole::Title => "Title",
            RegionRole::Subtitle => "Subtitle",
            RegionRole::ParagraphPlaceholder => "Paragraph",
            RegionRole::PlainColorBlock => "Other",
        }
    }
}

/// A leaf region: what to paint and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub role: RegionRole,
    pub rect: Rect,
    /// Debug color of the region. Text roles use it as their flat fill in
    /// flat-color mode; plain blocks are filled with it.
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub index: usize,
    pub subtitle: Option<Region>,
    pub body: Region,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Band {
    pub index: usize,
    pub title: Option<Region>,
    pub section_width: i64,
    pub columns: Vec<Column>,
}

/// The region tree of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    pub size: Size,
    pub margin: Margin,
    pub section_height: i64,
    pub bands: Vec<Band>,
}

impl PageLayout {
    pub fn vertical_sections(&self) -> usize {
        self.bands.len()
    }

    /// Leaf regions in compositing order: per band top to bottom, the title
    /// first, then each column left to right with its subtitle before its
    /// body.
    pub fn regions(&self) -> impl Iterator<Item = &Region> + '_ {
        self.bands.iter().flat_map(|band| {
            band.title.iter().chain(
                band.columns
                    .iter()
                    .flat_map(|column| column.subtitle.iter().chain(std::iter::once(&column.body))),
            )
        })
    }

    pub fn region_count(&self) -> usize {
        self.regions().count()
    }
}

/// Draw a page size uniformly within the configured inclusive bounds.
pub fn draw_page_size<R: Rng>(config: &GeneratorConfig, rng: &mut R) -> Size {
    let width = rng.random_range(config.min_width..=config.max_width);
    let height = rng.random_range(config.min_height..=config.max_height);
    Size::new(width, height)
}

/// Build the region tree for a `width` x `height` page.
///
/// Draw order from `rng` is fixed (margin x, margin y, band count, then per
/// band: title coin, column count, then per column: subtitle coin, body
/// color), so a seeded generator reproduces a layout exactly. Forced draw
/// policies consume no randomness. `config` must have passed
/// [`GeneratorConfig::validate`].
pub fn partition<R: Rng>(
    width: u32,
    height: u32,
    config: &GeneratorConfig,
    rng: &mut R,
) -> PageLayout {
    let margin = Margin {
        x: rng.random_range(config.min_margin..=config.max_margin) as i64,
        y: rng.random_range(config.min_margin..=config.max_margin) as i64,
    };
    let page_w = width as i64;
    let page_h = height as i64;
    let title_height = config.title_height as i64;
    let subtitle_height = config.subtitle_height as i64;

    let vertical_sections = rng.random_range(1..=config.max_vertical_sections);
    let section_height = page_h / vertical_sections as i64;

    let mut bands = Vec::with_capacity(vertical_sections as usize);
    for j in 0..vertical_sections as usize {
        let band_top = j as i64 * section_height;

        let title = coin(config.title_draw, rng).then(|| Region {
            role: RegionRole::Title,
            rect: Rect::new(
                margin.x,
                band_top + margin.y,
                page_w,
                band_top + title_height,
            ),
            color: config.title.color,
        });
        let start_y = match title {
            Some(_) => band_top + margin.y / 2 + title_height,
            None => band_top + margin.y / 2,
        };
        let end_y = band_top + section_height - margin.y / 2;

        let horizontal_sections = rng.random_range(1..=config.max_horizontal_sections);
        let section_width = page_w / horizontal_sections as i64;

        let mut columns = Vec::with_capacity(horizontal_sections as usize);
        for k in 0..horizontal_sections as usize {
            let has_subtitle = coin(config.subtitle_draw, rng);
            let section_color =
                config.section_palette[rng.random_range(0..config.section_palette.len())];
            let start_x = k as i64 * section_width + margin.x / 2;
            let end_x = (k as i64 + 1) * section_width - margin.x / 2;

            let column = if has_subtitle {
                Column {
                    index: k,
                    subtitle: Some(Region {
                        role: RegionRole::Subtitle,
                        rect: Rect::new(start_x, start_y, end_x, start_y + subtitle_height),
                        color: config.subtitle.color,
                    }),
                    body: Region {
                        role: RegionRole::PlainColorBlock,
                        rect: Rect::new(start_x, start_y + subtitle_height, end_x, end_y),
                        color: section_color,
                    },
                }
            } else {
                Column {
                    index: k,
                    subtitle: None,
                    body: Region {
                        role: RegionRole::ParagraphPlaceholder,
                        rect: Rect::new(start_x, start_y, end_x, end_y),
                        color: section_color,
                    },
                }
            };
            columns.push(column);
        }

        bands.push(Band {
            index: j,
            title,
            section_width,
            columns,
        });
    }

    PageLayout {
        size: Size::new(width, height),
        margin,
        section_height,
        bands,
    }
}

fn coin<R: Rng>(policy: DrawPolicy, rng: &mut R) -> bool {
    match policy {
        DrawPolicy::Random => rng.random_bool(0.5),
        DrawPolicy::Always => true,
        DrawPolicy::Never => false,
    }
}
