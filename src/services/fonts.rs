//! Font catalog — derives `FontDescriptor`s from a directory listing.
//!
//! The scan runs on the caller's task, never inside the hub, so a slow
//! filesystem cannot stall the mutation timeline. A missing directory is
//! not an error: the catalog is simply empty.

use std::path::Path;

use protocol::FontDescriptor;
use tracing::{info, warn};

/// Extensions recognized as font files (compared case-insensitively).
pub const FONT_EXTENSIONS: [&str; 4] = ["ttf", "otf", "woff", "woff2"];

/// Family used when a file name has no usable characters.
pub const FALLBACK_FAMILY: &str = "CustomFont";

/// Scan `dir` and build the catalog, sorted by file name.
pub async fn load_catalog(dir: &Path) -> Vec<FontDescriptor> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(dir = %dir.display(), "font directory not found; catalog is empty");
            return Vec::new();
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "font directory unreadable; catalog is empty");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                if let Ok(name) = entry.file_name().into_string() {
                    files.push(name);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "font directory listing interrupted");
                break;
            }
        }
    }

    let catalog = build_catalog(files);
    info!(dir = %dir.display(), count = catalog.len(), "font catalog loaded");
    catalog
}

/// Turn raw file names into a sorted catalog, skipping non-font files.
#[must_use]
pub fn build_catalog(files: impl IntoIterator<Item = String>) -> Vec<FontDescriptor> {
    let mut catalog: Vec<FontDescriptor> = files
        .into_iter()
        .filter_map(|file| {
            let (stem, ext) = file.rsplit_once('.')?;
            if !is_font_extension(ext) {
                return None;
            }
            Some(FontDescriptor { font_family: family_name(stem), path: format!("/fonts/{file}"), file })
        })
        .collect();
    catalog.sort_by(|a, b| a.file.cmp(&b.file));
    catalog
}

fn is_font_extension(ext: &str) -> bool {
    FONT_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext))
}

/// Derive a CSS family name from a file stem: non-alphanumerics split words,
/// each word is capitalized, and the words are joined without separators.
#[must_use]
pub fn family_name(stem: &str) -> String {
    let family: String = stem
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();

    if family.is_empty() { FALLBACK_FAMILY.to_owned() } else { family }
}
