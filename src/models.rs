//! Core data types flowing through the recommendation pipeline.
//!
//! Each stage owns its input and produces the next stage's input:
//! query text → [`ExtractedFields`] → region code → [`SiteSummary`] listing
//! → [`SiteDetail`] → [`Card`]. The only cross-request state is the
//! append-only [`CacheEntry`] store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// The tourism API is loose about scalar types: area codes and content
/// ids arrive as strings or numbers depending on the endpoint. Accept
/// both and normalize to `String`.
fn de_string_loose<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Region and top-level category extracted from a free-text query.
///
/// At most one of each: the extraction prompt constrains the model to a
/// single region name and a single `cat1` code. `cat1` is `None` when the
/// model produced a code outside the known table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    pub region: String,
    pub cat1: Option<String>,
}

/// One entry in the tourism API's area-code table.
#[derive(Debug, Clone, Deserialize)]
pub struct AreaCode {
    #[serde(default, deserialize_with = "de_string_loose")]
    pub code: String,
    #[serde(default)]
    pub name: String,
}

/// One candidate site from the `areaBasedList2` listing endpoint.
///
/// `firstimage2` is the primary promotional image, `firstimage` the
/// secondary one; either may be empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteSummary {
    #[serde(rename = "contentid", default, deserialize_with = "de_string_loose")]
    pub content_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub addr1: String,
    #[serde(default)]
    pub addr2: String,
    #[serde(default)]
    pub cat1: String,
    #[serde(default)]
    pub firstimage: String,
    #[serde(default)]
    pub firstimage2: String,
}

impl SiteSummary {
    /// Whether the listing entry carries a representative image.
    pub fn has_representative_image(&self) -> bool {
        !self.firstimage2.trim().is_empty() || !self.firstimage.trim().is_empty()
    }

    /// `addr1` and `addr2` joined with a single space, either alone if the
    /// other is empty.
    pub fn full_address(&self) -> String {
        let a1 = self.addr1.trim();
        let a2 = self.addr2.trim();
        match (a1.is_empty(), a2.is_empty()) {
            (false, false) => format!("{} {}", a1, a2),
            (false, true) => a1.to_string(),
            (true, false) => a2.to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Overview and homepage from the `detailCommon2` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailCommon {
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub homepage: String,
}

/// One image record from the `detailImage2` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailImage {
    #[serde(rename = "originimgurl", default)]
    pub origin_img_url: String,
    #[serde(rename = "smallimageurl", default)]
    pub small_image_url: String,
}

/// A fully enriched site, ready for presentation.
#[derive(Debug, Clone)]
pub struct SiteDetail {
    pub content_id: String,
    pub name: String,
    pub address: String,
    pub overview: String,
    /// One-line summary derived from the overview.
    pub summary: String,
    pub homepage: Option<String>,
    /// Resolved via the firstimage2 → firstimage → detailImage2 fallback
    /// chain; `None` when all three were empty or invalid.
    pub image: Option<String>,
}

/// Final display record. Derived from [`SiteDetail`], never persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Card {
    pub name: String,
    pub summary: String,
    pub address: String,
    pub image_url: Option<String>,
    pub homepage: Option<String>,
}

/// One record of the append-only embedding cache file.
///
/// `query` is already normalized (see `cache::normalize_query`); entries
/// are never mutated or deleted, so repeated queries accumulate and the
/// latest entry wins at lookup time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub query: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}
