use crate::composite::Placement;
use crate::error::Result;
use crate::types::Color;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One labeled box, in the record shape the annotation tool persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPos {
    pub label: String,
    /// `[x0, y0, x1, y1]` in page pixels, end exclusive.
    pub box_coords: [i64; 4],
    pub color: Color,
}

/// Labels for one page image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelRecord {
    pub file_name: String,
    pub page: u32,
    pub text_pos: Vec<TextPos>,
}

impl LabelRecord {
    /// Build a record from the regions that were actually composited, using
    /// the page-clipped rectangles.
    pub fn from_placements(file_name: impl Into<String>, placements: &[Placement]) -> Self {
        Self {
            file_name: file_name.into(),
            page: 0,
            text_pos: placements
                .iter()
                .map(|placement| TextPos {
                    label: placement.region.role.label().to_string(),
                    box_coords: placement.written.to_array(),
                    color: placement.region.color,
                })
                .collect(),
        }
    }
}

/// Write `record` as `<dir>/<index>.json`, creating `dir` if needed.
pub fn write_label_record(dir: &Path, index: usize, record: &LabelRecord) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{index}.json"));
    let json = serde_json::to_vec_pretty(record)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
