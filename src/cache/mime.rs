//! # MIME Lookup
//!
//! Filename-extension lookup table used when a transport response carries
//! no usable content type, and when rebuilding cache metadata from disk.

/// Fallback type for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extension → MIME table for the media kinds the client handles.
const TABLE: &[(&str, &str)] = &[
    // Images
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
    // Audio (voice notes)
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("m4a", "audio/mp4"),
    ("aac", "audio/aac"),
    ("amr", "audio/amr"),
    // Video
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mov", "video/quicktime"),
    // Documents
    ("pdf", "application/pdf"),
    ("json", "application/json"),
    ("txt", "text/plain"),
];

/// Look up the MIME type for a file extension (without the dot).
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

/// Resolve the MIME type for a filename, falling back to octet-stream.
pub fn mime_for_filename(name: &str) -> &'static str {
    name.rsplit_once('.')
        .and_then(|(_, ext)| mime_for_extension(ext))
        .unwrap_or(OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(mime_for_filename("photo.png"), "image/png");
        assert_eq!(mime_for_filename("voice.AMR"), "audio/amr");
        assert_eq!(mime_for_filename("clip.mp4"), "video/mp4");
    }

    #[test]
    fn test_unknown_falls_back_to_octet_stream() {
        assert_eq!(mime_for_filename("archive.xyz"), OCTET_STREAM);
        assert_eq!(mime_for_filename("no-extension"), OCTET_STREAM);
    }

    #[test]
    fn test_extension_lookup_is_case_insensitive() {
        assert_eq!(mime_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(mime_for_extension("jpeg"), Some("image/jpeg"));
    }
}
