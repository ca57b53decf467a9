#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetrics {
    pub page_index: usize,
    pub width: u32,
    pub height: u32,
    pub render_ms: f64,
    pub region_count: usize,
    pub composited_regions: usize,
    pub skipped_regions: usize,
    pub rasterization_failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchMetrics {
    pub pages: Vec<PageMetrics>,
    pub total_render_ms: f64,
    pub total_regions: usize,
    pub total_skipped_regions: usize,
}

impl BatchMetrics {
    pub fn from_pages(mut pages: Vec<PageMetrics>) -> Self {
        pages.sort_by_key(|p| p.page_index);
        let total_render_ms = pages.iter().map(|p| p.render_ms).sum();
        let total_regions = pages.iter().map(|p| p.region_count).sum();
        let total_skipped_regions = pages.iter().map(|p| p.skipped_regions).sum();
        Self {
            pages,
            total_render_ms,
            total_regions,
            total_skipped_regions,
        }
    }
}
