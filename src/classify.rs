//! Reference and file classification.
//!
//! Two questions are answered here, both without touching extension claims
//! more than necessary:
//!
//! - Is an `href`/`src` value a reference to a file inside the book, or an
//!   external URL that must never be rewritten? ([`is_local_reference`])
//! - Is a file a raster image? Answered by magic bytes only, so misnamed and
//!   extensionless images are still recognized. ([`is_image`], [`ImageFormat`])

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

// ============================================================================
// Reference Parsing
// ============================================================================

/// A reference split into its URL components.
///
/// Splitting follows the generic URL grammar: an optional `scheme:`, an
/// optional `//authority`, then path, `?query` and `#fragment`. The fragment
/// is split off first, so `a.md#x?y` has fragment `x?y` and no query.
/// Empty query and fragment components are reported as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Href<'a> {
    /// Scheme without the trailing colon, lowercased on comparison only.
    pub scheme: &'a str,
    /// Everything before the path (`scheme:` and `//authority`), verbatim.
    pub prefix: &'a str,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

impl<'a> Href<'a> {
    /// Split a reference into components.
    ///
    /// Returns `None` for references that cannot be classified, such as an
    /// authority with an unterminated IPv6 literal.
    pub fn parse(href: &'a str) -> Option<Self> {
        let (scheme, rest_start) = match href.find(':') {
            Some(pos) if pos > 0 && is_scheme(&href[..pos]) => (&href[..pos], pos + 1),
            _ => ("", 0),
        };

        let rest = &href[rest_start..];
        let (authority_len, rest) = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find(['/', '?', '#']).unwrap_or(after.len());
                let authority = &after[..end];
                if authority.contains('[') != authority.contains(']') {
                    return None;
                }
                (2 + end, &after[end..])
            }
            None => (0, rest),
        };
        let prefix = &href[..rest_start + authority_len];

        let (rest, fragment) = match rest.split_once('#') {
            Some((before, fragment)) => (before, Some(fragment)),
            None => (rest, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        Some(Self {
            scheme,
            prefix,
            path,
            query: query.filter(|q| !q.is_empty()),
            fragment: fragment.filter(|f| !f.is_empty()),
        })
    }

    /// Whether the scheme denotes a file inside the book.
    ///
    /// Single-letter schemes are treated as local so Windows drive letters
    /// (`C:\...`) are never mistaken for URLs.
    pub fn is_local(&self) -> bool {
        self.scheme.len() <= 1 || self.scheme.eq_ignore_ascii_case("file")
    }

    /// Rebuild the reference with a different path, keeping every other
    /// component verbatim.
    pub fn with_path(&self, path: &str) -> String {
        let mut out = String::with_capacity(self.prefix.len() + path.len() + 16);
        out.push_str(self.prefix);
        out.push_str(path);
        if let Some(query) = self.query {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = self.fragment {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Whether `href` references a file inside the book rather than an external
/// resource. Unclassifiable references are treated as external.
pub fn is_local_reference(href: &str) -> bool {
    Href::parse(href).is_some_and(|h| h.is_local())
}

/// Whether `href` is an absolute filesystem path. Such references point
/// outside the conversion root and are never rewritten.
pub fn is_absolute_reference(href: &str) -> bool {
    href.starts_with('/') || Path::new(href).has_root()
}

// ============================================================================
// Raster Image Sniffing
// ============================================================================

/// Raster image formats recognized by magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    WebP,
    /// SGI image
    Rgb,
    Pbm,
    Pgm,
    Ppm,
    /// Sun raster
    Rast,
    Xbm,
    Exr,
}

/// Number of leading bytes inspected when sniffing.
const SNIFF_LEN: usize = 32;

impl ImageFormat {
    /// Identify a raster format from the leading bytes of a file.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        let pnm_tail = |b: u8| matches!(b, b' ' | b'\t' | b'\n' | b'\r');

        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if data.starts_with(b"MM\x00*") || data.starts_with(b"II*\x00") {
            Some(ImageFormat::Tiff)
        } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            Some(ImageFormat::WebP)
        } else if data.starts_with(b"BM") {
            Some(ImageFormat::Bmp)
        } else if data.starts_with(&[0x01, 0xDA]) {
            Some(ImageFormat::Rgb)
        } else if data.starts_with(&[0x59, 0xA6, 0x6A, 0x95]) {
            Some(ImageFormat::Rast)
        } else if data.starts_with(&[0x76, 0x2F, 0x31, 0x01]) {
            Some(ImageFormat::Exr)
        } else if data.starts_with(b"#define ") {
            Some(ImageFormat::Xbm)
        } else if data.first() == Some(&b'P') && data.len() >= 3 {
            match data[1] {
                b'1' | b'4' if pnm_tail(data[2]) => Some(ImageFormat::Pbm),
                b'2' | b'5' if pnm_tail(data[2]) => Some(ImageFormat::Pgm),
                b'3' | b'6' if pnm_tail(data[2]) => Some(ImageFormat::Ppm),
                _ => None,
            }
        } else {
            None
        }
    }

    /// MIME type used in the package manifest.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Rgb => "image/x-rgb",
            ImageFormat::Pbm => "image/x-portable-bitmap",
            ImageFormat::Pgm => "image/x-portable-graymap",
            ImageFormat::Ppm => "image/x-portable-pixmap",
            ImageFormat::Rast => "image/x-cmu-raster",
            ImageFormat::Xbm => "image/x-xbitmap",
            ImageFormat::Exr => "image/x-exr",
        }
    }
}

/// Sniff the raster format of a file on disk.
pub fn sniff_file(path: &Path) -> Result<Option<ImageFormat>> {
    let file = File::open(path).map_err(|e| Error::read(path, e))?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| Error::read(path, e))?;
    Ok(ImageFormat::sniff(&head))
}

/// Whether a file on disk is a raster image, judged by content alone.
pub fn is_image(path: &Path) -> Result<bool> {
    Ok(sniff_file(path)?.is_some())
}
