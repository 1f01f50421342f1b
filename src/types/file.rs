use serde::{Deserialize, Serialize};

/// MIME recorded when neither the caller nor sniffing can name one.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Coarse grouping used for filtered views. Computed once from the MIME
/// type at upload and never recomputed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Video,
    Image,
    Audio,
    Other,
}

impl Category {
    pub fn from_mime(mime: &str) -> Self {
        match mime.trim().to_ascii_lowercase() {
            mime if mime.starts_with("video/") => Category::Video,
            mime if mime.starts_with("image/") => Category::Image,
            mime if mime.starts_with("audio/") => Category::Audio,
            _ => Category::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Video => "video",
            Category::Image => "image",
            Category::Audio => "audio",
            Category::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(Category::Video),
            "image" => Some(Category::Image),
            "audio" => Some(Category::Audio),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

/// Sniff a MIME type from the leading bytes of a file.
pub fn detect_mime(data: &[u8]) -> Option<&'static str> {
    infer::get(data).map(|kind| kind.mime_type())
}
