//! Text/binary classification.

use crate::options::BinaryDetection;

/// Number of leading bytes examined for NUL bytes.
pub const SNIFF_LEN: usize = 8 * 1024;

const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "icns", "tif", "tiff", "webp", "avif", "heic",
    "psd",
    // archives
    "zip", "gz", "tgz", "bz2", "xz", "zst", "7z", "rar", "tar", "jar", "war", "whl", "deb",
    "rpm", "dmg", "iso",
    // executables and objects
    "exe", "dll", "so", "dylib", "bin", "o", "a", "lib", "obj", "class", "pyc", "wasm", "rlib",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // media
    "mp3", "mp4", "m4a", "wav", "flac", "ogg", "oga", "avi", "mov", "mkv", "webm",
    // documents and data
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "sqlite", "db",
];

/// Whether the file name carries an extension that is never text.
pub fn has_binary_extension(file_name: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            BINARY_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// Classifies a file as binary.
///
/// The extension check is a shortcut; the authoritative test looks at the first
/// [`SNIFF_LEN`] bytes. Content that is not valid UTF-8 is also binary, since it
/// cannot be stored verbatim in the manifest.
pub fn classify(file_name: &str, bytes: &[u8], detection: BinaryDetection) -> bool {
    if has_binary_extension(file_name) {
        return true;
    }
    let prefix = &bytes[..bytes.len().min(SNIFF_LEN)];
    let flagged = match detection {
        BinaryDetection::Simple => prefix.contains(&0),
        BinaryDetection::Accurate => content_inspector::inspect(prefix).is_binary(),
    };
    flagged || std::str::from_utf8(bytes).is_err()
}
