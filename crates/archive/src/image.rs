//! Page image recognition by filename.

/// Recognised page image suffixes, without the leading dot.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

const OCTET_STREAM: &str = "application/octet-stream";

fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    // A bare ".png" at the end of a path is a hidden file, not an image.
    if stem.is_empty() || stem.ends_with('/') {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Returns `true` if `name` ends in one of the [`IMAGE_EXTENSIONS`] (case-insensitive).
///
/// Works on both plain filenames and full in-archive paths (`"chapter/001.JPG"`).
#[must_use]
pub fn is_image_name(name: &str) -> bool {
    extension(name).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// MIME type for a page, derived from its filename.
#[must_use]
pub fn content_type(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => OCTET_STREAM,
    }
}
