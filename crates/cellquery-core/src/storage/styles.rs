//! Per-cell formatting loaded from a TOML file.
//!
//! ```toml
//! [[cells]]
//! sheet = "people"
//! address = "B2"
//! bold = true
//! color = 255
//! formula = "=20+10"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::config::read_limited;
use crate::error::{Error, Result};

const MAX_STYLES_FILE_BYTES: u64 = 1_048_576; // 1 MiB

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StylesFile {
    pub cells: Vec<CellStyle>,
}

/// One `[[cells]]` entry. Unset fields leave the cell's current format alone.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CellStyle {
    pub sheet: String,
    pub address: String,
    pub formula: Option<String>,
    pub number_format: Option<String>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub font: Option<String>,
    pub font_size: Option<f64>,
    pub font_color: Option<i64>,
    pub color: Option<i64>,
    pub color_index: Option<i64>,
    pub pattern: Option<i64>,
}

pub fn parse_styles(content: &str) -> Result<StylesFile> {
    toml::from_str(content).map_err(|e| Error::Parse {
        line: e.span().map(|s| line_of(content, s.start)).unwrap_or(0),
        message: e.message().to_string(),
    })
}

pub fn load_styles(path: &Path) -> Result<StylesFile> {
    let content = read_limited(path, MAX_STYLES_FILE_BYTES)?;
    let styles = parse_styles(&content)?;
    tracing::debug!(path = %path.display(), entries = styles.cells.len(), "loaded styles");
    Ok(styles)
}

fn line_of(content: &str, offset: usize) -> usize {
    content[..offset.min(content.len())].matches('\n').count() + 1
}
