use crate::config::{GeneratorConfig, RenderMode, TextRole};
use crate::font::FontBook;
use crate::layout::{Region, RegionRole};
use crate::raster::{TextStyle, empty_bitmap, rasterize};
use crate::types::Color;
use image::RgbImage;
use tracing::warn;

/// Pixel content produced for one region.
#[derive(Debug, Clone)]
pub struct Filled {
    /// Exactly the region's size, or 0x0 for degenerate regions and
    /// recovered rasterization failures.
    pub bitmap: RgbImage,
    pub rasterization_failed: bool,
}

/// Produce the bitmap for `region` according to its role and the
/// configured render mode.
pub fn fill(region: &Region, config: &GeneratorConfig, fonts: &FontBook) -> Filled {
    let rect = region.rect;
    if rect.is_degenerate() {
        return Filled {
            bitmap: empty_bitmap(),
            rasterization_failed: false,
        };
    }

    let role = match (config.render_mode, region.role) {
        (_, RegionRole::PlainColorBlock) | (RenderMode::FlatColor, _) => {
            return Filled {
                bitmap: solid(rect.width(), rect.height(), region.color),
                rasterization_failed: false,
            };
        }
        (RenderMode::RasterizedText, RegionRole::Title) => &config.title,
        (RenderMode::RasterizedText, RegionRole::Subtitle) => &config.subtitle,
        (RenderMode::RasterizedText, RegionRole::ParagraphPlaceholder) => &config.paragraph,
    };

    match rasterize(
        &role.text,
        rect.width(),
        rect.height(),
        &text_style(role),
        fonts,
        &config.raster,
    ) {
        Ok(bitmap) => Filled {
            bitmap,
            rasterization_failed: false,
        },
        Err(err) => {
            warn!(role = ?region.role, rect = ?rect, %err, "rasterization failed; region left blank");
            Filled {
                bitmap: empty_bitmap(),
                rasterization_failed: true,
            }
        }
    }
}

fn text_style(role: &TextRole) -> TextStyle {
    TextStyle {
        font_size: role.font_size,
        bold: role.bold,
        color: role.color,
    }
}

fn solid(width: i64, height: i64, color: Color) -> RgbImage {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => RgbImage::from_pixel(w, h, color.to_rgb()),
        _ => empty_bitmap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rect;

    fn region(role: RegionRole, rect: Rect, color: Color) -> Region {
        Region { role, rect, color }
    }

    #[test]
    fn plain_block_is_uniform() {
        let cfg = GeneratorConfig::default();
        let out = fill(
            &region(RegionRole::PlainColorBlock, Rect::new(10, 10, 40, 30), Color::GREEN),
            &cfg,
            &FontBook::empty(),
        );
        assert_eq!(out.bitmap.dimensions(), (30, 20));
        assert!(out.bitmap.pixels().all(|p| p.0 == [0, 255, 0]));
        assert!(!out.rasterization_failed);
    }

    #[test]
    fn flat_mode_fills_text_roles_with_their_color() {
        let cfg = GeneratorConfig {
            render_mode: RenderMode::FlatColor,
            ..Default::default()
        };
        for (role, color) in [
            (RegionRole::Title, cfg.title.color),
            (RegionRole::Subtitle, cfg.subtitle.color),
            (RegionRole::ParagraphPlaceholder, Color::BLUE),
        ] {
            let out = fill(&region(role, Rect::new(0, 0, 7, 3), color), &cfg, &FontBook::empty());
            assert_eq!(out.bitmap.dimensions(), (7, 3));
            assert!(out.bitmap.pixels().all(|p| p.0 == <[u8; 3]>::from(color)));
        }
    }

    #[test]
    fn rasterized_roles_match_region_size() {
        let cfg = GeneratorConfig::default();
        for role in [
            RegionRole::Title,
            RegionRole::Subtitle,
            RegionRole::ParagraphPlaceholder,
        ] {
            let out = fill(
                &region(role, Rect::new(5, 5, 205, 85), Color::RED),
                &cfg,
                &FontBook::empty(),
            );
            assert_eq!(out.bitmap.dimensions(), (200, 80), "{role:?}");
            assert!(out.bitmap.pixels().any(|p| p.0 != [255, 255, 255]), "{role:?}");
        }
    }

    #[test]
    fn unusable_font_leaves_region_blank() {
        let cfg = GeneratorConfig::default();
        let fonts = FontBook::from_unchecked(b"not a font".to_vec(), None);
        for role in [
            RegionRole::Title,
            RegionRole::Subtitle,
            RegionRole::ParagraphPlaceholder,
        ] {
            let out = fill(&region(role, Rect::new(0, 0, 120, 40), Color::RED), &cfg, &fonts);
            assert_eq!(out.bitmap.dimensions(), (0, 0), "{role:?}");
            assert!(out.rasterization_failed, "{role:?}");
        }

        // Plain blocks never touch the rasterizer.
        let out = fill(
            &region(RegionRole::PlainColorBlock, Rect::new(0, 0, 4, 4), Color::RED),
            &cfg,
            &fonts,
        );
        assert_eq!(out.bitmap.dimensions(), (4, 4));
        assert!(!out.rasterization_failed);
    }

    #[test]
    fn degenerate_region_yields_empty_bitmap() {
        let cfg = GeneratorConfig::default();
        for rect in [Rect::new(3, 0, 3, 10), Rect::new(0, 9, 10, 2), Rect::new(5, 5, -5, -5)] {
            let out = fill(
                &region(RegionRole::Title, rect, Color::RED),
                &cfg,
                &FontBook::empty(),
            );
            assert_eq!(out.bitmap.dimensions(), (0, 0));
        }
    }
}
