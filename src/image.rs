//! Image URL validation and homepage normalization.
//!
//! Listing and detail records carry image URLs of wildly varying quality:
//! plain-http links, placeholder domains, non-image files, and hosts whose
//! HEAD responses lie. [`ImagePolicy`] applies the filter chain (https
//! upgrade → extension allow-list → domain deny-list → optional HEAD
//! probe); anything that fails comes back as "no image" rather than an
//! error, since a card can always render a placeholder.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};
use url::Url;

use crate::config::ImageConfig;

/// Upgrade a plain-http URL to https; leave anything else untouched.
pub fn to_https(url: &str) -> String {
    let url = url.trim();
    if let Some(rest) = url.strip_prefix("http://") {
        format!("https://{}", rest)
    } else {
        url.to_string()
    }
}

fn href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)href=["']([^"']+)["']"#).unwrap())
}

/// Normalize the homepage field from `detailCommon2`, which may be a bare
/// URL, an `<a>` tag, or a protocol-relative or schemeless link.
pub fn normalize_homepage(raw: &str) -> String {
    let mut t = raw.trim().to_string();
    if t.is_empty() {
        return String::new();
    }

    if let Some(caps) = href_regex().captures(&t) {
        t = caps[1].trim().to_string();
    }
    t = t.replace("&amp;", "&");

    if t.starts_with("//") {
        t = format!("https:{}", t);
    }
    let has_scheme = t
        .get(..7)
        .map_or(false, |p| p.eq_ignore_ascii_case("http://"))
        || t.get(..8)
            .map_or(false, |p| p.eq_ignore_ascii_case("https://"));
    if !has_scheme {
        t = format!("https://{}", t);
    }

    to_https(&t)
}

/// Image URL filter chain plus the HEAD probe.
pub struct ImagePolicy {
    config: ImageConfig,
    client: reqwest::Client,
}

impl ImagePolicy {
    pub fn new(config: &ImageConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            config: config.clone(),
            client,
        }
    }

    fn host_of(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }

    /// Host equals a denied domain or is a subdomain of one. Unparseable
    /// URLs are treated as blocked.
    pub fn domain_blocked(&self, url: &str) -> bool {
        let host = match Self::host_of(url) {
            Some(h) => h,
            None => return true,
        };
        self.config
            .deny_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
    }

    /// Path ends in an allowed image extension.
    pub fn ext_ok(&self, url: &str) -> bool {
        let path = match Url::parse(url) {
            Ok(u) => u.path().to_lowercase(),
            Err(_) => return false,
        };
        match path.rsplit_once('.') {
            Some((_, ext)) => self.config.allowed_exts.contains(ext),
            None => false,
        }
    }

    async fn head_ok(&self, url: &str) -> bool {
        if !self.config.require_head_ok {
            return true;
        }
        if let Some(host) = Self::host_of(url) {
            // some image hosts answer HEAD incorrectly; trust them as-is
            if self.config.head_whitelist.contains(&host) {
                return true;
            }
        }

        let resp = match self.client.head(url).send().await {
            Ok(r) => r,
            Err(_) => return false,
        };
        if resp.status().as_u16() >= 400 {
            return false;
        }

        let content_type = resp
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.starts_with("image/") {
            return false;
        }

        if let Some(len) = resp
            .headers()
            .get("Content-Length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
        {
            if len < self.config.min_bytes || len > self.config.max_bytes {
                return false;
            }
        }

        true
    }

    /// Run the full chain. Returns the https form of the URL when it
    /// passes, `None` otherwise.
    pub async fn validate(&self, raw: &str) -> Option<String> {
        let url = to_https(raw);
        if url.is_empty() || self.domain_blocked(&url) || !self.ext_ok(&url) {
            return None;
        }
        if !self.head_ok(&url).await {
            return None;
        }
        Some(url)
    }
}

/// In-memory TTL cache of validated image URLs, keyed by content id, so a
/// site seen in repeated queries skips the HEAD probe. Evicts the older
/// half when full.
pub struct ValidatedUrlCache {
    ttl: Duration,
    max: usize,
    store: Mutex<HashMap<String, (String, Instant)>>,
}

impl ValidatedUrlCache {
    pub fn new(ttl_secs: u64, max: usize) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            max,
            store: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if key.is_empty() {
            return None;
        }
        let mut store = self.store.lock().expect("url cache lock poisoned");
        match store.get(key) {
            Some((url, inserted)) => {
                if !self.ttl.is_zero() && inserted.elapsed() > self.ttl {
                    store.remove(key);
                    None
                } else {
                    Some(url.clone())
                }
            }
            None => None,
        }
    }

    pub fn set(&self, key: &str, url: &str) {
        if key.is_empty() || url.is_empty() {
            return;
        }
        let mut store = self.store.lock().expect("url cache lock poisoned");
        if self.max > 0 && store.len() >= self.max {
            let mut by_age: Vec<(String, Instant)> = store
                .iter()
                .map(|(k, (_, t))| (k.clone(), *t))
                .collect();
            by_age.sort_by_key(|(_, t)| *t);
            for (k, _) in by_age.into_iter().take((self.max / 2).max(1)) {
                store.remove(&k);
            }
        }
        store.insert(key.to_string(), (url.to_string(), Instant::now()));
    }
}
