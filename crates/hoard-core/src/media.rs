//! Platform-agnostic media records.
//!
//! These are the units cached by the structured post cache and fetched by the
//! download manager. They carry no behaviour tied to a specific platform.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content rating reported by the source platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaRating {
    /// Safe for general audiences.
    Safe,
    /// Questionable content.
    Questionable,
    /// Explicit content.
    Explicit,
    /// The platform did not report a rating.
    #[default]
    Unknown,
}

impl MediaRating {
    /// Parse the single-letter or full-word rating used by most platforms.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "s" | "safe" | "g" | "general" => Self::Safe,
            "q" | "questionable" | "sensitive" => Self::Questionable,
            "e" | "explicit" => Self::Explicit,
            _ => Self::Unknown,
        }
    }
}

/// A single media record (a "post") from a remote platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Platform-scoped identifier.
    pub id: String,
    /// Name of the source platform (e.g. "e621").
    pub source: String,
    /// Display title, if the platform provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Tag list in platform order.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Content rating.
    #[serde(default)]
    pub rating: MediaRating,
    /// Direct URL to the full media file, when already known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// URL of the preview image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// URL of the post page on the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    /// Media width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Media height in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// File extension without the dot (e.g. "png").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ext: Option<String>,
    /// File size in bytes as reported by the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// When this record was last fetched from the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Local file path once the item has been downloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file_path: Option<PathBuf>,
}

impl MediaItem {
    /// Create a minimal media item.
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            title: None,
            tags: Vec::new(),
            rating: MediaRating::Unknown,
            file_url: None,
            preview_url: None,
            page_url: None,
            width: None,
            height: None,
            file_ext: None,
            file_size: None,
            last_fetched_at: None,
            local_file_path: None,
        }
    }

    /// Set the direct file URL.
    #[must_use]
    pub fn with_file_url(mut self, url: impl Into<String>) -> Self {
        self.file_url = Some(url.into());
        self
    }

    /// Set the preview URL.
    #[must_use]
    pub fn with_preview_url(mut self, url: impl Into<String>) -> Self {
        self.preview_url = Some(url.into());
        self
    }

    /// Set the file extension.
    #[must_use]
    pub fn with_file_ext(mut self, ext: impl Into<String>) -> Self {
        self.file_ext = Some(ext.into());
        self
    }

    /// Set the tag list.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Best-effort file extension: explicit value, else the extension of
    /// the file URL's last path segment.
    pub fn extension(&self) -> Option<String> {
        if let Some(ext) = &self.file_ext {
            return Some(ext.trim_start_matches('.').to_ascii_lowercase());
        }
        let url = self.file_url.as_deref()?;
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let segment = path.rsplit('/').next()?;
        let (_, ext) = segment.rsplit_once('.')?;
        (!ext.is_empty() && ext.len() <= 5).then(|| ext.to_ascii_lowercase())
    }

    /// Default on-disk file name (`<source>_<id>.<ext>`), sanitized.
    pub fn default_file_name(&self) -> String {
        let stem: String = format!("{}_{}", self.source, self.id)
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        match self.extension() {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem,
        }
    }
}

/// Lightweight summary of a pool (a named, ordered collection of posts).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    /// Pool identifier.
    pub id: i64,
    /// Pool display name.
    pub name: String,
    /// Number of posts in the pool as reported by the platform.
    pub post_count: u32,
}

impl PoolInfo {
    /// Create a new pool summary.
    pub fn new(id: i64, name: impl Into<String>, post_count: u32) -> Self {
        Self {
            id,
            name: name.into(),
            post_count,
        }
    }
}

/// Parameters for a platform search.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Tag query.
    pub tags: Vec<String>,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

impl SearchParams {
    /// Create a search for the given tags, first page, default page size.
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            page: 1,
            limit: 75,
        }
    }

    /// Stable cache key for this query (usable as a TTL cache key).
    pub fn cache_key(&self) -> String {
        let mut tags = self.tags.clone();
        tags.sort();
        format!("{}|{}|{}", tags.join(" "), self.page, self.limit)
    }
}

/// A page of search results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    /// Items on this page.
    pub items: Vec<MediaItem>,
    /// Whether another page is available.
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_prefers_explicit_value() {
        let item = MediaItem::new("1", "e621")
            .with_file_url("https://static.example/a/b.png")
            .with_file_ext(".WEBM");
        assert_eq!(item.extension().as_deref(), Some("webm"));
    }

    #[test]
    fn extension_from_url_ignores_query() {
        let item = MediaItem::new("1", "e621").with_file_url("https://x/y/file.JPG?token=abc");
        assert_eq!(item.extension().as_deref(), Some("jpg"));
    }

    #[test]
    fn default_file_name_is_sanitized() {
        let item = MediaItem::new("12/3", "dan booru").with_file_url("https://x/f.gif");
        assert_eq!(item.default_file_name(), "dan_booru_12_3.gif");
    }

    #[test]
    fn rating_parse() {
        assert_eq!(MediaRating::parse("s"), MediaRating::Safe);
        assert_eq!(MediaRating::parse("Explicit"), MediaRating::Explicit);
        assert_eq!(MediaRating::parse("zzz"), MediaRating::Unknown);
    }

    #[test]
    fn search_cache_key_is_order_independent() {
        let a = SearchParams::tags(["wolf", "forest"]);
        let b = SearchParams::tags(["forest", "wolf"]);
        assert_eq!(a.cache_key(), b.cache_key());
    }
}
