use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{DEFAULT_FONT_NAME, SYSTEM_FONT_CANDIDATES};

#[derive(Error, Debug)]
pub enum FontResolveError {
    #[error("font file not found: {0}")]
    NotFound(PathBuf),
    #[error("no usable font found (searched {searched} locations); pass an explicit font path")]
    NoCandidate { searched: usize },
    #[error("failed to read font {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolve the overlay font file, checking the explicit path before any
/// fallback location.
///
/// Resolution order:
/// 1. Explicit path (must exist, no fallback when given)
/// 2. User font directory (platform-specific)
/// 3. Well-known system font locations
pub fn resolve(explicit: Option<&Path>) -> Result<PathBuf, FontResolveError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(FontResolveError::NotFound(path.to_path_buf()))
        };
    }

    let mut candidates = Vec::new();
    if let Some(dir) = font_dir() {
        candidates.push(dir.join(DEFAULT_FONT_NAME));
    }
    candidates.extend(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from));

    first_existing(&candidates)
}

/// Reads the resolved font into memory for the glyph rasterizer.
pub fn load(path: &Path) -> Result<Vec<u8>, FontResolveError> {
    fs::read(path).map_err(|e| FontResolveError::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Platform-specific directory for user-supplied fonts.
///
/// - macOS: `~/Library/Application Support/FixCam/fonts/`
/// - Linux: `$XDG_DATA_HOME/FixCam/fonts/` or `~/.local/share/FixCam/fonts/`
/// - Windows: `%APPDATA%/FixCam/fonts/`
pub fn font_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("FixCam").join("fonts"))
}

fn first_existing(candidates: &[PathBuf]) -> Result<PathBuf, FontResolveError> {
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or(FontResolveError::NoCandidate {
            searched: candidates.len(),
        })
}
