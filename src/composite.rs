use crate::config::GeneratorConfig;
use crate::fill::fill;
use crate::font::FontBook;
use crate::layout::{PageLayout, Region};
use crate::types::{Color, Rect, Size};
use image::RgbImage;

/// A region that reached the page, with the rectangle actually written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub region: Region,
    pub written: Rect,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositeStats {
    /// Composited regions in paint order.
    pub placements: Vec<Placement>,
    pub skipped: usize,
    pub rasterization_failures: usize,
}

/// Fresh white page buffer.
pub fn new_page(size: Size) -> RgbImage {
    RgbImage::from_pixel(size.width, size.height, Color::WHITE.to_rgb())
}

/// Copy `bitmap` into `page` with its top-left corner at the region origin.
///
/// The write is clipped to the page, the region and the bitmap extent.
/// Returns the rectangle written, or `None` when nothing was (degenerate
/// region, empty bitmap, or entirely off-page).
pub fn composite(page: &mut RgbImage, region: &Rect, bitmap: &RgbImage) -> Option<Rect> {
    let page_bounds = Rect::new(0, 0, page.width() as i64, page.height() as i64);
    let bitmap_extent = Rect::new(
        region.x0,
        region.y0,
        region.x0 + bitmap.width() as i64,
        region.y0 + bitmap.height() as i64,
    );
    let target = region.intersect(&page_bounds).intersect(&bitmap_extent);
    if target.is_degenerate() {
        return None;
    }

    let page_stride = page.width() as usize * 3;
    let src_stride = bitmap.width() as usize * 3;
    let span = target.width() as usize * 3;
    let src_x = (target.x0 - region.x0) as usize * 3;
    let dst_x = target.x0 as usize * 3;

    let src = bitmap.as_raw();
    let dst: &mut [u8] = page;
    for y in target.y0..target.y1 {
        let src_row = (y - region.y0) as usize * src_stride + src_x;
        let dst_row = y as usize * page_stride + dst_x;
        dst[dst_row..dst_row + span].copy_from_slice(&src[src_row..src_row + span]);
    }
    Some(target)
}

/// Fill and composite every region of `layout` in paint order onto a new
/// page. Later regions overwrite earlier ones where they overlap.
pub fn compose_page(
    layout: &PageLayout,
    config: &GeneratorConfig,
    fonts: &FontBook,
) -> (RgbImage, CompositeStats) {
    let mut page = new_page(layout.size);
    let mut stats = CompositeStats::default();
    for region in layout.regions() {
        let filled = fill(region, config, fonts);
        if filled.rasterization_failed {
            stats.rasterization_failures += 1;
        }
        match composite(&mut page, &region.rect, &filled.bitmap) {
            Some(written) => stats.placements.push(Placement {
                region: *region,
                written,
            }),
            None => stats.skipped += 1,
        }
    }
    (page, stats)
}
