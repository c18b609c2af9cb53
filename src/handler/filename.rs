//! File name inference for handled content.

use std::path::{Component, Path};

use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use url::Url;

use crate::network::media::{extension_for_media_type, media_type_for_extension, parse_media_type};

const FALLBACK_STEM: &str = "download";
const FALLBACK_EXTENSION: &str = ".bin";

/// Picks a file name for content fetched from `url`.
///
/// Order: `Content-Disposition` filename, then the last URL path segment
/// (given the media type's extension when it lacks a matching one), then
/// `download` plus the media type's extension.
#[must_use]
pub fn infer_file_name(url: &Url, headers: &HeaderMap, media_type: &str) -> String {
    if let Some(name) = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_content_disposition)
        .map(|name| sanitize_filename(&name))
        .filter(|name| is_usable(name))
    {
        return name;
    }

    let extension = extension_for_media_type(media_type);
    if let Some(segment) = last_url_segment(url) {
        return match extension {
            Some(extension) if !extension_matches(&segment, media_type) => {
                format!("{segment}{extension}")
            }
            _ => segment,
        };
    }

    format!("{FALLBACK_STEM}{}", extension.unwrap_or(FALLBACK_EXTENSION))
}

fn last_url_segment(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(last)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| last.to_string());
    let sanitized = sanitize_filename(decoded.trim());
    is_usable(&sanitized).then_some(sanitized)
}

fn extension_matches(file_name: &str, media_type: &str) -> bool {
    let Some((_, extension)) = file_name.rsplit_once('.') else {
        return false;
    };
    let Some(essence) = parse_media_type(media_type) else {
        return false;
    };
    media_type_for_extension(extension) == Some(essence.as_str())
        || extension_for_media_type(&essence)
            .is_some_and(|canonical| canonical[1..].eq_ignore_ascii_case(extension))
}

fn is_usable(name: &str) -> bool {
    !name.trim_matches('_').is_empty()
}

/// Parses Content-Disposition header to extract filename.
///
/// Handles both:
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf`
/// - `attachment; filename*=UTF-8''example.pdf` (RFC 5987)
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    // RFC 5987 form takes precedence
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            if let Ok(decoded) = urlencoding::decode(encoded[..end].trim()) {
                return Some(decoded.into_owned());
            }
        }
    }

    if let Some(pos) = header.find("filename=") {
        let value = header[pos + 9..].trim();
        if let Some(stripped) = value.strip_prefix('"') {
            if let Some(end) = stripped.find('"') {
                return Some(stripped[..end].to_string());
            }
        } else {
            let end = value.find(';').unwrap_or(value.len());
            let filename = value[..end].trim();
            if !filename.is_empty() {
                return Some(filename.to_string());
            }
        }
    }

    None
}

/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |` and control characters) and neutralizes dot-only
/// names.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
