//! Media type constants and extension mapping.

/// Fallback media type for unlabelled or unparseable content.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Media type of web pages.
pub const HTML_MEDIA_TYPE: &str = "text/html";

/// Media type of PDF documents.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Parses a `Content-Type` style value down to its lowercase essence
/// (`type/subtype`), dropping parameters.
///
/// Returns `None` for empty or malformed values.
#[must_use]
pub fn parse_media_type(value: &str) -> Option<String> {
    let essence = value.split(';').next()?.trim().to_ascii_lowercase();
    let (kind, subtype) = essence.split_once('/')?;
    let valid_token = |token: &str| {
        !token.is_empty()
            && token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c))
    };
    (valid_token(kind) && valid_token(subtype)).then_some(essence)
}

/// Returns the canonical file extension (with leading dot) for a media type.
#[must_use]
pub fn extension_for_media_type(media_type: &str) -> Option<&'static str> {
    let essence = parse_media_type(media_type)?;
    let extension = match essence.as_str() {
        "application/pdf" => ".pdf",
        "text/html" | "application/xhtml+xml" => ".html",
        "text/plain" => ".txt",
        "application/json" => ".json",
        "application/xml" | "text/xml" => ".xml",
        "application/epub+zip" => ".epub",
        "application/postscript" => ".ps",
        "application/x-bibtex" => ".bib",
        "application/msword" => ".doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/svg+xml" => ".svg",
        "application/zip" => ".zip",
        "application/gzip" => ".gz",
        "video/mp4" => ".mp4",
        "audio/mpeg" => ".mp3",
        _ => return None,
    };
    Some(extension)
}

/// Returns the media type conventionally associated with a file extension
/// (with or without the leading dot, case-insensitive).
#[must_use]
pub fn media_type_for_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    let media_type = match extension.as_str() {
        "pdf" => "application/pdf",
        "html" | "htm" => "text/html",
        "xhtml" => "application/xhtml+xml",
        "txt" => "text/plain",
        "json" => "application/json",
        "xml" => "application/xml",
        "epub" => "application/epub+zip",
        "ps" => "application/postscript",
        "bib" => "application/x-bibtex",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        _ => return None,
    };
    Some(media_type)
}
