//! Small helpers shared by the conversion pipeline.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

// ============================================================================
// Text Decoding
// ============================================================================

/// Decode source bytes with the encoding named by `label`.
///
/// `label` is any WHATWG encoding label (`utf-8`, `latin1`, `shift_jis`, ...).
/// A byte order mark matching the encoding is stripped. Unlike a browser, a
/// malformed byte sequence is an error rather than a replacement character.
pub fn decode_text(bytes: &[u8], label: &str, path: &Path) -> Result<String> {
    let encoding = encoding_rs::Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::UnknownEncoding(label.to_string()))?;

    let (text, malformed) = encoding.decode_with_bom_removal(bytes);
    if malformed {
        return Err(Error::Encoding {
            path: path.to_path_buf(),
            encoding: encoding.name().to_string(),
        });
    }
    Ok(text.into_owned())
}

/// Read and decode a text file.
pub fn read_text(path: &Path, label: &str) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::read(path, e))?;
    decode_text(&bytes, label, path)
}

/// Check that `label` names an encoding this build understands.
pub fn validate_encoding(label: &str) -> Result<()> {
    encoding_rs::Encoding::for_label(label.trim().as_bytes())
        .map(|_| ())
        .ok_or_else(|| Error::UnknownEncoding(label.to_string()))
}

// ============================================================================
// Media Types
// ============================================================================

/// Media type of a packaged resource, by file extension.
///
/// Used for files copied verbatim; images detected by content carry their
/// own type.
pub fn media_type(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "css" => "text/css",
        "js" => "application/javascript",
        "html" | "htm" | "xhtml" => "application/xhtml+xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "txt" | "md" => "text/plain",
        "xml" => "application/xml",
        "json" => "application/json",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// Date Utilities
// ============================================================================

/// Truncate an ISO date/timestamp to just the date portion (YYYY-MM-DD).
pub fn truncate_to_date(s: &str) -> &str {
    match s.find('T') {
        Some(pos) => &s[..pos],
        None => s,
    }
}
