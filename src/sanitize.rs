//! File name sanitizing.

/// Characters reserved by at least one common file system.
const RESERVED: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Strip reserved characters from a title so it can be used as a file name component.
///
/// Length is left untouched.
pub fn sanitize_filename(raw: &str) -> String {
    raw.chars().filter(|c| !RESERVED.contains(c)).collect()
}
