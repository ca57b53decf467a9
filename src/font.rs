use crate::config::FontConfig;
use crate::error::{Result, SynthError};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Extra font directories, separated like `PATH`.
pub const FONT_DIR_ENV: &str = "DOCSYNTH_FONT_DIR";

const MAX_SCAN_DEPTH: usize = 4;

const REGULAR_CANDIDATES: &[&str] = &[
    "arial.ttf",
    "segoeui.ttf",
    "helvetica.ttf",
    "liberationsans-regular.ttf",
    "dejavusans.ttf",
    "notosans-regular.ttf",
    "roboto-regular.ttf",
    "freesans.ttf",
];

const BOLD_CANDIDATES: &[&str] = &[
    "arialbd.ttf",
    "segoeuib.ttf",
    "helvetica-bold.ttf",
    "liberationsans-bold.ttf",
    "dejavusans-bold.ttf",
    "notosans-bold.ttf",
    "roboto-bold.ttf",
    "freesansbold.ttf",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

pub struct FaceChoice<'a> {
    pub data: &'a [u8],
    /// Only the regular face exists; the rasterizer strokes it.
    pub synthetic_bold: bool,
}

#[derive(Clone, Default)]
pub struct FontBook {
    regular: Option<Arc<Vec<u8>>>,
    bold: Option<Arc<Vec<u8>>>,
}

impl fmt::Debug for FontBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontBook")
            .field("regular_bytes", &self.regular.as_ref().map(|d| d.len()))
            .field("bold_bytes", &self.bold.as_ref().map(|d| d.len()))
            .finish()
    }
}

impl FontBook {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_bytes(regular: Vec<u8>, bold: Option<Vec<u8>>) -> Result<Self> {
        check_face(&regular, "regular")?;
        if let Some(bold) = bold.as_ref() {
            check_face(bold, "bold")?;
        }
        Ok(Self {
            regular: Some(Arc::new(regular)),
            bold: bold.map(Arc::new),
        })
    }

    #[cfg(test)]
    pub(crate) fn from_unchecked(regular: Vec<u8>, bold: Option<Vec<u8>>) -> Self {
        Self {
            regular: Some(Arc::new(regular)),
            bold: bold.map(Arc::new),
        }
    }

    /// Resolve fonts for `config`. Explicit paths must load; the system
    /// search is best effort.
    pub fn resolve(config: &FontConfig) -> Result<Self> {
        let mut regular = config.regular.as_deref().map(load_font_file).transpose()?;
        let mut bold = config.bold.as_deref().map(load_font_file).transpose()?;

        if config.search_system && (regular.is_none() || bold.is_none()) {
            let index = index_font_files(&font_dirs());
            if regular.is_none() {
                regular = first_loadable(&index, REGULAR_CANDIDATES);
            }
            if bold.is_none() {
                bold = first_loadable(&index, BOLD_CANDIDATES);
            }
        }

        if regular.is_none() {
            // A bold-only book still renders; regular text uses the bold face.
            regular = bold.clone();
        }

        let book = Self { regular, bold };
        if book.is_empty() {
            warn!("no usable font found; text regions will be greeked");
        } else {
            info!(
                regular = book.regular.is_some(),
                bold = book.bold.is_some(),
                "fonts resolved"
            );
        }
        Ok(book)
    }

    pub fn is_empty(&self) -> bool {
        self.regular.is_none()
    }

    pub fn face(&self, weight: FontWeight) -> Option<FaceChoice<'_>> {
        match weight {
            FontWeight::Regular => self.regular.as_deref().map(|data| FaceChoice {
                data: data.as_slice(),
                synthetic_bold: false,
            }),
            FontWeight::Bold => match self.bold.as_deref() {
                Some(data) => Some(FaceChoice {
                    data: data.as_slice(),
                    synthetic_bold: false,
                }),
                None => self.regular.as_deref().map(|data| FaceChoice {
                    data: data.as_slice(),
                    synthetic_bold: true,
                }),
            },
        }
    }
}

fn check_face(data: &[u8], label: &str) -> Result<()> {
    ttf_parser::Face::parse(data, 0)
        .map(|_| ())
        .map_err(|e| SynthError::Font(format!("{label} font does not parse: {e}")))
}

fn load_font_file(path: &Path) -> Result<Arc<Vec<u8>>> {
    let bytes = std::fs::read(path)
        .map_err(|e| SynthError::Font(format!("cannot read {}: {e}", path.display())))?;
    check_face(&bytes, &path.display().to_string())?;
    Ok(Arc::new(bytes))
}

fn first_loadable(index: &HashMap<String, PathBuf>, candidates: &[&str]) -> Option<Arc<Vec<u8>>> {
    for name in candidates {
        let Some(path) = index.get(*name) else {
            continue;
        };
        match load_font_file(path) {
            Ok(bytes) => {
                debug!(path = %path.display(), "using system font");
                return Some(bytes);
            }
            Err(err) => debug!(path = %path.display(), %err, "skipping font"),
        }
    }
    None
}

fn index_font_files(dirs: &[PathBuf]) -> HashMap<String, PathBuf> {
    let mut index = HashMap::new();
    for dir in dirs {
        scan_dir(dir, 0, &mut index);
    }
    index
}

fn scan_dir(dir: &Path, depth: usize, index: &mut HashMap<String, PathBuf>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_dir(&path, depth + 1, index);
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".ttf") || lower.ends_with(".otf") {
            index.entry(lower).or_insert(path);
        }
    }
}

fn font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(extra) = std::env::var(FONT_DIR_ENV) {
        for path in std::env::split_paths(&extra) {
            if !path.as_os_str().is_empty() {
                dirs.push(path);
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    dirs
}
