//! Post extraction: raw file bytes → key, title, date and rendered body.
//!
//! A post file starts with a header line, the rest is the markdown body:
//!
//! ```text
//! hello world | 2012-12-01
//! # title hello world
//! ```

use std::path::Path;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::render::Renderer;

/// Separates the title from the date in the header line.
pub const TITLE_DATE_SEPARATOR: char = '|';

/// Date format in the header line (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Everything a successful parse yields for one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPost {
    pub key: String,
    pub title: String,
    pub date: NaiveDate,
    pub content: String,
}

/// Parses a post file. `path` is only used for error messages.
pub fn extract_post(path: &Path, raw: &[u8], renderer: &dyn Renderer) -> Result<ExtractedPost> {
    let parse_err = |reason: String| Error::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let text = std::str::from_utf8(raw).map_err(|e| parse_err(format!("not UTF-8: {}", e)))?;

    let (header, body) = text
        .split_once('\n')
        .ok_or_else(|| parse_err("there must be at least one line".to_string()))?;
    let header = header.trim();

    let (title, date) = header.split_once(TITLE_DATE_SEPARATOR).ok_or_else(|| {
        parse_err(format!(
            "no '{}' between title and date",
            TITLE_DATE_SEPARATOR
        ))
    })?;
    let date = date.trim();
    if !is_date_shaped(date) {
        return Err(parse_err(format!("bad date {:?}: expected YYYY-MM-DD", date)));
    }
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|e| parse_err(format!("bad date {:?}: {}", date, e)))?;

    Ok(ExtractedPost {
        key: content_key(raw),
        title: title.trim().to_string(),
        date,
        content: renderer.render(body.trim()),
    })
}

/// Exactly `DDDD-DD-DD`; chrono alone also takes `2012-1-1`.
fn is_date_shaped(date: &str) -> bool {
    let bytes = date.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Stable key derived from the raw file bytes (hex SHA-256).
pub fn content_key(raw: &[u8]) -> String {
    hex::encode(Sha256::digest(raw))
}
