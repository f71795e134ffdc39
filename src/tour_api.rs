//! Korea Tourism API (KorService) client.
//!
//! [`TourApi`] is the seam the pipeline calls through; tests inject canned
//! implementations. [`KorService`] is the production client over the four
//! endpoints the pipeline needs: `areaCode2`, `areaBasedList2`,
//! `detailCommon2`, and `detailImage2`.
//!
//! The API wraps every payload in `response.body.items.item`, where `item`
//! may be an array, a single object, or absent entirely when there are no
//! rows — [`extract_items`] flattens all three shapes. Error pages come
//! back as HTML with a 200 status, so the body is shape-checked before
//! JSON parsing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::TourApiConfig;
use crate::error::PipelineError;
use crate::models::{AreaCode, DetailCommon, DetailImage, SiteSummary};

#[async_trait]
pub trait TourApi: Send + Sync {
    /// Fetch the region name → code table.
    async fn area_codes(&self) -> Result<Vec<AreaCode>>;

    /// Fetch the area-based listing, ordered by the API so that entries
    /// with a representative image come first (`arrange=O`).
    async fn area_based_list(
        &self,
        area_code: &str,
        cat1: Option<&str>,
        num_rows: usize,
    ) -> Result<Vec<SiteSummary>>;

    /// Fetch overview text and homepage for one site.
    async fn detail_common(&self, content_id: &str) -> Result<DetailCommon>;

    /// Fetch the alternate image records for one site.
    async fn detail_images(&self, content_id: &str) -> Result<Vec<DetailImage>>;
}

/// Resolve a human-readable region name to its API area code.
///
/// Administrative suffixes (특별자치도, 광역시, 특별시) are stripped before
/// matching, and the first table entry whose name contains the stripped
/// query wins — deterministic for a fixed table. No match is a
/// [`PipelineError::RegionNotFound`], never a crash.
pub async fn resolve_region_code(
    api: &dyn TourApi,
    region_name: &str,
) -> Result<String, PipelineError> {
    let table = api
        .area_codes()
        .await
        .map_err(|e| PipelineError::Api(format!("areaCode2: {}", e)))?;

    match_area_code(&table, region_name)
        .map(|area| area.code.clone())
        .ok_or_else(|| PipelineError::RegionNotFound(region_name.to_string()))
}

fn strip_region_suffixes(name: &str) -> String {
    name.replace("특별자치도", "")
        .replace("광역시", "")
        .replace("특별시", "")
        .trim()
        .to_string()
}

/// Substring-match a region name against the area-code table.
pub fn match_area_code<'a>(table: &'a [AreaCode], region_name: &str) -> Option<&'a AreaCode> {
    let needle = strip_region_suffixes(region_name);
    if needle.is_empty() {
        return None;
    }
    table
        .iter()
        .find(|area| area.name.contains(&needle) && !area.code.is_empty())
}

/// Production client for the KorService endpoints.
pub struct KorService {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl KorService {
    /// Build a client from config. The service key comes from the
    /// `TOUR_API_KEY` environment variable.
    pub fn new(config: &TourApiConfig) -> Result<Self> {
        let raw_key = std::env::var("TOUR_API_KEY")
            .map_err(|_| anyhow::anyhow!("TOUR_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build tourism API HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key: normalize_service_key(&raw_key),
        })
    }

    async fn call(
        &self,
        endpoint: &str,
        extra: &[(&str, String)],
        num_rows: usize,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut params: Vec<(&str, String)> = vec![
            ("serviceKey", self.service_key.clone()),
            ("numOfRows", num_rows.to_string()),
            ("pageNo", "1".to_string()),
            ("MobileOS", "ETC".to_string()),
            ("MobileApp", "TourScout".to_string()),
            ("_type", "json".to_string()),
        ];
        params.extend(extra.iter().cloned());

        let resp = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .with_context(|| format!("failed to call {}", endpoint))?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        let text = resp
            .text()
            .await
            .with_context(|| format!("failed to read {} body", endpoint))?;

        if !status.is_success() {
            anyhow::bail!("{} returned {}: {}", endpoint, status, body_head(&text));
        }

        // The portal serves error pages as HTML with a 200 status; guard
        // the parse on content type or body shape.
        let trimmed = text.trim();
        let looks_like_json = content_type.contains("json")
            || trimmed.starts_with('{')
            || trimmed.starts_with('[');
        if !looks_like_json {
            anyhow::bail!(
                "{} returned non-JSON response (ct='{}'). Body head: {}",
                endpoint,
                content_type,
                body_head(trimmed)
            );
        }

        serde_json::from_str(trimmed)
            .with_context(|| format!("failed to parse {} response", endpoint))
    }
}

#[async_trait]
impl TourApi for KorService {
    async fn area_codes(&self) -> Result<Vec<AreaCode>> {
        let payload = self.call("areaCode2", &[], 100).await?;
        parse_items(&payload)
    }

    async fn area_based_list(
        &self,
        area_code: &str,
        cat1: Option<&str>,
        num_rows: usize,
    ) -> Result<Vec<SiteSummary>> {
        // arrange=O: representative-image-guaranteed ordering
        let mut extra = vec![
            ("arrange", "O".to_string()),
            ("areaCode", area_code.to_string()),
        ];
        if let Some(cat1) = cat1 {
            extra.push(("cat1", cat1.to_string()));
        }
        let payload = self.call("areaBasedList2", &extra, num_rows).await?;
        parse_items(&payload)
    }

    async fn detail_common(&self, content_id: &str) -> Result<DetailCommon> {
        let extra = vec![("contentId", content_id.to_string())];
        let payload = self.call("detailCommon2", &extra, 1).await?;
        let mut items: Vec<DetailCommon> = parse_items(&payload)?;
        let first = items.drain(..).next().unwrap_or_default();
        Ok(first)
    }

    async fn detail_images(&self, content_id: &str) -> Result<Vec<DetailImage>> {
        let extra = vec![("contentId", content_id.to_string())];
        let payload = self.call("detailImage2", &extra, 10).await?;
        parse_items(&payload)
    }
}

/// Decode the service key the way the portal hands it out: if the key was
/// copied in its URL-encoded form, percent-decode it once; strip spaces
/// either way. `reqwest` re-encodes it as a query parameter.
pub fn normalize_service_key(raw: &str) -> String {
    let key = raw.trim();
    let decoded = if key.contains('%') {
        percent_decode(key)
    } else {
        key.to_string()
    };
    decoded.replace(' ', "")
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn body_head(text: &str) -> String {
    text.chars().take(300).collect::<String>().replace('\n', " ")
}

/// Pull `response.body.items.item` out of a payload and deserialize each
/// record, tolerating the single-object and no-rows shapes.
pub fn parse_items<T: DeserializeOwned>(payload: &serde_json::Value) -> Result<Vec<T>> {
    let items = extract_items(payload);
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(serde_json::from_value(item).context("unexpected item shape")?);
    }
    Ok(out)
}

fn extract_items(payload: &serde_json::Value) -> Vec<serde_json::Value> {
    let item = payload
        .pointer("/response/body/items/item")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    match item {
        serde_json::Value::Array(arr) => arr,
        serde_json::Value::Object(_) => vec![item],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<AreaCode> {
        vec![
            AreaCode {
                code: "1".into(),
                name: "서울".into(),
            },
            AreaCode {
                code: "6".into(),
                name: "부산".into(),
            },
            AreaCode {
                code: "39".into(),
                name: "제주도".into(),
            },
        ]
    }

    #[test]
    fn test_match_exact_name() {
        let t = table();
        let area = match_area_code(&t, "부산").unwrap();
        assert_eq!(area.code, "6");
    }

    #[test]
    fn test_match_strips_admin_suffixes() {
        assert_eq!(match_area_code(&table(), "제주특별자치도").unwrap().code, "39");
        assert_eq!(match_area_code(&table(), "부산광역시").unwrap().code, "6");
        assert_eq!(match_area_code(&table(), "서울특별시").unwrap().code, "1");
    }

    #[test]
    fn test_match_is_deterministic() {
        let t = table();
        let first = match_area_code(&t, "제주").unwrap().code.clone();
        for _ in 0..5 {
            assert_eq!(match_area_code(&t, "제주").unwrap().code, first);
        }
    }

    #[test]
    fn test_match_unknown_region_is_none() {
        assert!(match_area_code(&table(), "아틀란티스").is_none());
        assert!(match_area_code(&table(), "").is_none());
    }

    #[test]
    fn test_extract_items_array() {
        let payload = serde_json::json!({
            "response": { "body": { "items": { "item": [
                { "code": "1", "name": "서울" },
                { "code": "39", "name": "제주도" }
            ]}}}
        });
        let items: Vec<AreaCode> = parse_items(&payload).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].name, "제주도");
    }

    #[test]
    fn test_extract_items_single_object() {
        let payload = serde_json::json!({
            "response": { "body": { "items": { "item":
                { "code": "39", "name": "제주도" }
            }}}
        });
        let items: Vec<AreaCode> = parse_items(&payload).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_extract_items_empty_string_body() {
        // zero-row responses put "" where the items object would be
        let payload = serde_json::json!({
            "response": { "body": { "items": "" } }
        });
        let items: Vec<AreaCode> = parse_items(&payload).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_service_key_passthrough() {
        assert_eq!(normalize_service_key(" abc+def== "), "abc+def==");
    }

    #[test]
    fn test_service_key_percent_decoded_once() {
        assert_eq!(normalize_service_key("abc%2Bdef%3D%3D"), "abc+def==");
    }
}
