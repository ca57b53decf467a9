use crate::config::RasterOptions;
use crate::error::{Result, SynthError};
use crate::font::{FaceChoice, FontBook, FontWeight};
use crate::types::Color;
use image::RgbImage;
use image::imageops::{self, FilterType};
use rustybuzz::{Direction as HbDirection, Face as HbFace, UnicodeBuffer};
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};
use ttf_parser::{GlyphId, OutlineBuilder};

const SYNTHETIC_BOLD_STROKE: f32 = 0.04; // of the em size
const GREEK_ADVANCE: f32 = 0.55;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub bold: bool,
    pub color: Color,
}

/// Zero-area bitmap, the result for degenerate or failed regions.
pub fn empty_bitmap() -> RgbImage {
    RgbImage::new(0, 0)
}

/// Render `text` into an RGB bitmap of exactly `target_w` x `target_h`.
///
/// Text is left and top aligned on a white background and word-wrapped to
/// the box width. Rendering happens at a supersampled resolution which is
/// then Lanczos-resized down to the target. Content that does not fit is
/// clipped. A non-positive target yields [`empty_bitmap`].
///
/// Every render resource (pixmap, parsed faces, shaping buffers) lives only
/// for the duration of the call.
pub fn rasterize(
    text: &str,
    target_w: i64,
    target_h: i64,
    style: &TextStyle,
    fonts: &FontBook,
    options: &RasterOptions,
) -> Result<RgbImage> {
    if target_w <= 0 || target_h <= 0 {
        return Ok(empty_bitmap());
    }
    let width = u32::try_from(target_w)
        .map_err(|_| SynthError::Rasterization(format!("target width {target_w} too large")))?;
    let height = u32::try_from(target_h)
        .map_err(|_| SynthError::Rasterization(format!("target height {target_h} too large")))?;

    let scale = render_scale(width, height, options);
    let render_w = scaled_dim(width, scale);
    let render_h = scaled_dim(height, scale);
    let mut pixmap = Pixmap::new(render_w, render_h).ok_or_else(|| {
        SynthError::Rasterization(format!("cannot allocate {render_w}x{render_h} pixmap"))
    })?;
    pixmap.fill(Color::WHITE.to_sk_color());

    let font_px = style.font_size * scale;
    if font_px > 0.0 && !text.trim().is_empty() {
        let paint = fill_paint(style.color);
        let weight = if style.bold {
            FontWeight::Bold
        } else {
            FontWeight::Regular
        };
        match fonts.face(weight) {
            Some(choice) => draw_text(&mut pixmap, text, font_px, &choice, &paint)?,
            None => draw_greeked(&mut pixmap, text, font_px, style.bold, &paint),
        }
    }

    downsample(pixmap, width, height)
}

fn render_scale(width: u32, height: u32, options: &RasterOptions) -> f32 {
    let area = width as f64 * height as f64;
    let wanted = options.supersample.max(1) as f64;
    let cap = (options.max_render_pixels as f64 / area).sqrt();
    wanted.min(cap) as f32
}

fn scaled_dim(dim: u32, scale: f32) -> u32 {
    ((dim as f32 * scale).round() as u32).max(1)
}

fn downsample(pixmap: Pixmap, width: u32, height: u32) -> Result<RgbImage> {
    let (render_w, render_h) = (pixmap.width(), pixmap.height());
    // The background is opaque, so premultiplied and straight RGBA agree.
    let rgba = pixmap.take();
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    let rendered = RgbImage::from_raw(render_w, render_h, rgb)
        .ok_or_else(|| SynthError::Rasterization("pixmap buffer size mismatch".to_string()))?;
    if render_w == width && render_h == height {
        return Ok(rendered);
    }
    Ok(imageops::resize(&rendered, width, height, FilterType::Lanczos3))
}

fn draw_text(
    pixmap: &mut Pixmap,
    text: &str,
    font_px: f32,
    choice: &FaceChoice<'_>,
    paint: &Paint<'_>,
) -> Result<()> {
    let face = ttf_parser::Face::parse(choice.data, 0)
        .map_err(|e| SynthError::Rasterization(format!("font does not parse: {e}")))?;
    let shaper = HbFace::from_slice(choice.data, 0);
    let metrics = LineMetrics::of(&face, font_px);

    let max_width = pixmap.width() as f32;
    let lines = wrap_text(text, max_width, |line| {
        line_advance(&face, shaper.as_ref(), line, font_px)
    });

    let stroke = choice.synthetic_bold.then(|| Stroke {
        width: font_px * SYNTHETIC_BOLD_STROKE,
        ..Stroke::default()
    });

    let bottom = pixmap.height() as f32;
    let mut baseline = metrics.ascent;
    for line in &lines {
        if baseline - metrics.ascent >= bottom {
            break;
        }
        for placement in layout_line_glyphs(&face, shaper.as_ref(), line, font_px, 0.0, baseline) {
            let mut builder =
                GlyphPathBuilder::new(placement.origin_x, placement.origin_y, placement.scale);
            if face
                .outline_glyph(GlyphId(placement.glyph_id), &mut builder)
                .is_none()
            {
                continue;
            }
            let Some(path) = builder.finish() else {
                continue;
            };
            pixmap.fill_path(&path, paint, FillRule::Winding, Transform::identity(), None);
            if let Some(stroke) = stroke.as_ref() {
                pixmap.stroke_path(&path, paint, stroke, Transform::identity(), None);
            }
        }
        baseline += metrics.line_height;
    }
    Ok(())
}

// No font at all: each word becomes a solid bar.
fn draw_greeked(pixmap: &mut Pixmap, text: &str, font_px: f32, bold: bool, paint: &Paint<'_>) {
    let advance = font_px * GREEK_ADVANCE;
    let measure = |s: &str| s.chars().count() as f32 * advance;
    let lines = wrap_text(text, pixmap.width() as f32, measure);

    let ascent = font_px * 0.8;
    let line_height = font_px * 1.2;
    let bar_height = if bold { font_px * 0.6 } else { font_px * 0.5 };
    let bottom = pixmap.height() as f32;

    let mut baseline = ascent;
    for line in &lines {
        if baseline - ascent >= bottom {
            break;
        }
        let mut x = 0.0f32;
        for word in line.split(' ') {
            let width = measure(word);
            if width > 0.0 {
                if let Some(rect) =
                    tiny_skia::Rect::from_xywh(x, baseline - bar_height, width, bar_height)
                {
                    pixmap.fill_rect(rect, paint, Transform::identity(), None);
                }
            }
            x += width + advance;
        }
        baseline += line_height;
    }
}

fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines = Vec::new();
    for paragraph in normalized.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            if measure(&candidate) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        lines.push(current);
    }
    lines
}

struct LineMetrics {
    ascent: f32,
    line_height: f32,
}

impl LineMetrics {
    fn of(face: &ttf_parser::Face<'_>, font_px: f32) -> Self {
        let scale = font_px / face.units_per_em().max(1) as f32;
        let ascent = face.ascender() as f32 * scale;
        let descent = face.descender() as f32 * scale;
        let gap = face.line_gap() as f32 * scale;
        let line_height = ascent - descent + gap;
        Self {
            ascent,
            line_height: if line_height > 0.0 {
                line_height
            } else {
                font_px * 1.2
            },
        }
    }
}

struct GlyphPlacement {
    glyph_id: u16,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

fn line_advance(face: &ttf_parser::Face<'_>, shaper: Option<&HbFace<'_>>, text: &str, font_px: f32) -> f32 {
    if let Some(shaper) = shaper {
        let units = shaper.units_per_em().max(1) as f32;
        let output = shape(shaper, text);
        return output
            .glyph_positions()
            .iter()
            .map(|pos| pos.x_advance as f32 / units * font_px)
            .sum();
    }
    let units = face.units_per_em().max(1) as f32;
    text.chars()
        .map(|ch| unshaped_advance(face, ch, units, font_px))
        .sum()
}

fn shape(face: &HbFace<'_>, text: &str) -> rustybuzz::GlyphBuffer {
    let mut buffer = UnicodeBuffer::new();
    buffer.set_direction(detect_direction(text));
    buffer.push_str(text);
    rustybuzz::shape(face, &[], buffer)
}

fn layout_line_glyphs(
    face: &ttf_parser::Face<'_>,
    shaper: Option<&HbFace<'_>>,
    text: &str,
    font_px: f32,
    origin_x: f32,
    baseline_y: f32,
) -> Vec<GlyphPlacement> {
    let Some(shaper) = shaper else {
        return layout_line_glyphs_unshaped(face, text, font_px, origin_x, baseline_y);
    };
    let units = shaper.units_per_em().max(1) as f32;
    let scale = font_px / units;
    let output = shape(shaper, text);
    let infos = output.glyph_infos();
    let positions = output.glyph_positions();
    if infos.is_empty() || infos.len() != positions.len() {
        return layout_line_glyphs_unshaped(face, text, font_px, origin_x, baseline_y);
    }

    let mut out = Vec::with_capacity(infos.len());
    let mut pen_x = 0.0f32;
    for (info, pos) in infos.iter().zip(positions.iter()) {
        let gid = info.glyph_id as u16;
        if gid != 0 {
            out.push(GlyphPlacement {
                glyph_id: gid,
                origin_x: origin_x + pen_x + pos.x_offset as f32 * scale,
                // Shaping offsets are y-up, pixmap rows are y-down.
                origin_y: baseline_y - pos.y_offset as f32 * scale,
                scale,
            });
        }
        pen_x += pos.x_advance as f32 * scale;
    }
    out
}

fn layout_line_glyphs_unshaped(
    face: &ttf_parser::Face<'_>,
    text: &str,
    font_px: f32,
    origin_x: f32,
    baseline_y: f32,
) -> Vec<GlyphPlacement> {
    let units = face.units_per_em().max(1) as f32;
    let scale = font_px / units;
    let mut out = Vec::new();
    let mut pen_x = 0.0f32;
    for ch in text.chars() {
        if let Some(gid) = face.glyph_index(ch) {
            out.push(GlyphPlacement {
                glyph_id: gid.0,
                origin_x: origin_x + pen_x,
                origin_y: baseline_y,
                scale,
            });
        }
        pen_x += unshaped_advance(face, ch, units, font_px);
    }
    out
}

fn unshaped_advance(face: &ttf_parser::Face<'_>, ch: char, units: f32, font_px: f32) -> f32 {
    let advance = face
        .glyph_index(ch)
        .and_then(|gid| face.glyph_hor_advance(gid))
        .unwrap_or(0) as f32;
    if advance <= 0.0 {
        font_px * 0.5
    } else {
        advance / units * font_px
    }
}

fn detect_direction(text: &str) -> HbDirection {
    for ch in text.chars() {
        let code = ch as u32;
        let rtl = matches!(
            code,
            0x0590..=0x08FF | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF | 0x1EE00..=0x1EEFF
        );
        if rtl {
            return HbDirection::RightToLeft;
        }
    }
    HbDirection::LeftToRight
}

fn fill_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_sk_color());
    paint.anti_alias = true;
    paint
}

struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FontConfig;

    fn style(font_size: f32, color: Color) -> TextStyle {
        TextStyle {
            font_size,
            bold: false,
            color,
        }
    }

    fn has_non_white_pixel(img: &RgbImage) -> bool {
        img.pixels().any(|p| p.0 != [255, 255, 255])
    }

    #[test]
    fn non_positive_targets_yield_empty_bitmap() {
        let fonts = FontBook::empty();
        let opts = RasterOptions::default();
        for (w, h) in [(0, 10), (10, 0), (-5, 10), (10, -1), (-3, -3)] {
            let out = rasterize("hello", w, h, &style(12.0, Color::BLACK), &fonts, &opts).unwrap();
            assert_eq!(out.dimensions(), (0, 0), "target {w}x{h}");
        }
    }

    #[test]
    fn output_matches_requested_dimensions() {
        let fonts = FontBook::empty();
        let opts = RasterOptions::default();
        for (w, h) in [(1, 1), (37, 11), (600, 48), (123, 457)] {
            let out = rasterize(
                "this is a subtitle text*",
                w,
                h,
                &style(24.0, Color::BLACK),
                &fonts,
                &opts,
            )
            .unwrap();
            assert_eq!(out.dimensions(), (w as u32, h as u32));
        }
    }

    #[test]
    fn greeked_text_uses_text_color() {
        let fonts = FontBook::empty();
        let color = Color::rgb(100, 40, 15);
        let out = rasterize(
            "title text",
            400,
            60,
            &style(40.0, color),
            &fonts,
            &RasterOptions::default(),
        )
        .unwrap();
        assert!(has_non_white_pixel(&out));
        let close = out.pixels().any(|p| {
            let [r, g, b] = p.0;
            r.abs_diff(color.r) < 8 && g.abs_diff(color.g) < 8 && b.abs_diff(color.b) < 8
        });
        assert!(close, "expected pixels near the text color");
    }

    #[test]
    fn overflowing_text_is_clipped_not_an_error() {
        let fonts = FontBook::empty();
        let long = "word ".repeat(500);
        let out = rasterize(
            &long,
            20,
            5,
            &style(30.0, Color::BLACK),
            &fonts,
            &RasterOptions::default(),
        )
        .unwrap();
        assert_eq!(out.dimensions(), (20, 5));
    }

    #[test]
    fn blank_text_renders_white() {
        let out = rasterize(
            "   ",
            30,
            30,
            &style(12.0, Color::BLACK),
            &FontBook::empty(),
            &RasterOptions::default(),
        )
        .unwrap();
        assert!(!has_non_white_pixel(&out));
    }

    #[test]
    fn render_scale_respects_pixel_cap() {
        let opts = RasterOptions {
            supersample: 4,
            max_render_pixels: 1_000_000,
        };
        assert_eq!(render_scale(100, 100, &opts), 4.0);
        let capped = render_scale(1000, 1000, &opts);
        assert!((capped - 1.0).abs() < 1e-6);
        let w = scaled_dim(2000, render_scale(2000, 2000, &opts));
        assert!(w <= 1000);
    }

    #[test]
    fn wrap_is_greedy_and_honors_newlines() {
        let measure = |s: &str| s.chars().count() as f32;
        let lines = wrap_text("aa bb cc dd\nee", 5.0, measure);
        assert_eq!(lines, vec!["aa bb", "cc dd", "ee"]);

        let lines = wrap_text("supercalifragilistic x", 5.0, measure);
        assert_eq!(lines, vec!["supercalifragilistic", "x"]);
    }

    fn ink(img: &RgbImage) -> u64 {
        img.pixels()
            .map(|p| p.0.iter().map(|c| 255 - *c as u64).sum::<u64>())
            .sum()
    }

    #[test]
    fn synthetic_bold_adds_ink_to_real_glyphs() {
        // Needs any installed face; its bytes are reused as the only (regular) face.
        let system = FontBook::resolve(&FontConfig::default()).unwrap();
        let Some(regular) = system.face(FontWeight::Regular) else {
            return;
        };
        let fonts = FontBook::from_bytes(regular.data.to_vec(), None).unwrap();
        assert!(fonts.face(FontWeight::Bold).unwrap().synthetic_bold);

        let render = |bold: bool| {
            rasterize(
                "Hello layout",
                240,
                60,
                &TextStyle {
                    font_size: 32.0,
                    bold,
                    color: Color::BLACK,
                },
                &fonts,
                &RasterOptions::default(),
            )
            .unwrap()
        };
        let plain = render(false);
        let bold = render(true);
        assert_eq!(plain.dimensions(), (240, 60));
        assert_eq!(bold.dimensions(), (240, 60));
        assert!(ink(&plain) > 0);
        assert!(ink(&bold) > ink(&plain));
    }

    #[test]
    fn real_glyphs_wrap_within_the_box() {
        let system = FontBook::resolve(&FontConfig::default()).unwrap();
        let Some(regular) = system.face(FontWeight::Regular) else {
            return;
        };
        let fonts = FontBook::from_bytes(regular.data.to_vec(), None).unwrap();
        let out = rasterize(
            "one two three four five six seven",
            80,
            120,
            &style(16.0, Color::BLACK),
            &fonts,
            &RasterOptions::default(),
        )
        .unwrap();
        assert_eq!(out.dimensions(), (80, 120));
        // Wrapped lines put ink below the first line.
        let mut lower = (0..80).flat_map(|x| (30..120).map(move |y| (x, y)));
        assert!(lower.any(|(x, y)| out.get_pixel(x, y).0 != [255, 255, 255]));
    }
}
