//! The query → cards pipeline.
//!
//! One [`Recommender::recommend`] call runs the whole chain: embedding
//! cache consult, field extraction, region-code resolution, listing fetch
//! (image-first sort, category filter, cleanup), concurrent per-site
//! enrichment, and card rendering. Collaborators sit behind trait objects
//! so tests can run the pipeline against canned services.
//!
//! Failure policy (see `error.rs`): extraction and region resolution abort
//! the query; a failure enriching one site drops only that site; cache and
//! embedding problems degrade to stderr warnings.

use regex::Regex;
use std::sync::{Arc, Mutex, OnceLock};

use crate::cache::VectorCache;
use crate::config::Config;
use crate::embedding::{embed_query, Embedder, OpenAiEmbedder};
use crate::error::PipelineError;
use crate::extract::{extract_fields, summarize_one_line};
use crate::image::{normalize_homepage, to_https, ImagePolicy, ValidatedUrlCache};
use crate::llm::{ChatModel, OpenAiChat};
use crate::models::{Card, SiteDetail, SiteSummary};
use crate::present;
use crate::tour_api::{resolve_region_code, KorService, TourApi};

pub struct Recommender {
    chat: Arc<dyn ChatModel>,
    embedder: Arc<dyn Embedder>,
    api: Arc<dyn TourApi>,
    cache: Option<Mutex<VectorCache>>,
    image_policy: Arc<ImagePolicy>,
    url_cache: Arc<ValidatedUrlCache>,
    config: Config,
}

impl Recommender {
    /// Build the production pipeline: OpenAI chat + embeddings, the
    /// KorService client, and the flat-file vector cache.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let chat = Arc::new(OpenAiChat::new(&config.openai)?);
        let embedder = Arc::new(OpenAiEmbedder::new(&config.openai)?);
        let api = Arc::new(KorService::new(&config.tour_api)?);

        let cache = if config.cache.enabled {
            match VectorCache::open(&config.cache.path) {
                Ok(cache) => Some(Mutex::new(cache)),
                Err(e) => {
                    // best-effort: a broken cache file must not block queries
                    eprintln!("Warning: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self::assemble(chat, embedder, api, cache, config))
    }

    /// Build a pipeline from explicit collaborators. Used by tests to run
    /// the full chain against canned services.
    pub fn with_parts(
        chat: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        api: Arc<dyn TourApi>,
        cache: Option<VectorCache>,
        config: Config,
    ) -> Self {
        Self::assemble(chat, embedder, api, cache.map(Mutex::new), config)
    }

    fn assemble(
        chat: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        api: Arc<dyn TourApi>,
        cache: Option<Mutex<VectorCache>>,
        config: Config,
    ) -> Self {
        let image_policy = Arc::new(ImagePolicy::new(&config.image));
        let url_cache = Arc::new(ValidatedUrlCache::new(
            config.image.url_cache_ttl_secs,
            config.image.url_cache_max,
        ));
        Self {
            chat,
            embedder,
            api,
            cache,
            image_policy,
            url_cache,
            config,
        }
    }

    /// Run the pipeline for one query. `want` caps the number of cards;
    /// zero matches is a valid empty result, not an error.
    pub async fn recommend(
        &self,
        query: &str,
        want: usize,
    ) -> Result<Vec<Card>, PipelineError> {
        self.consult_cache(query).await;

        let fields = extract_fields(self.chat.as_ref(), query).await?;
        let area_code = resolve_region_code(self.api.as_ref(), &fields.region).await?;

        let num_rows = std::cmp::max(
            self.config.tour_api.page_size_floor,
            want * self.config.tour_api.fetch_multiplier,
        );
        let listing = self
            .api
            .area_based_list(&area_code, fields.cat1.as_deref(), num_rows)
            .await
            .map_err(|e| PipelineError::Api(format!("areaBasedList2: {}", e)))?;

        let mut listing = sort_image_first(listing);
        if let Some(cat1) = &fields.cat1 {
            listing = filter_category(listing, cat1);
        }
        let listing = clean_listing(listing);

        if listing.is_empty() {
            return Ok(Vec::new());
        }

        // Sites are independent and read-only: enrich them concurrently
        // and reassemble in listing order.
        let mut handles = Vec::new();
        for site in listing.into_iter().take(want) {
            let chat = Arc::clone(&self.chat);
            let api = Arc::clone(&self.api);
            let policy = Arc::clone(&self.image_policy);
            let url_cache = Arc::clone(&self.url_cache);
            handles.push(tokio::spawn(async move {
                enrich_site(chat.as_ref(), api.as_ref(), &policy, &url_cache, site).await
            }));
        }

        let mut cards = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Ok(detail)) => cards.push(present::render(&detail)),
                Ok(Err(e)) => eprintln!("Warning: {}", e),
                Err(e) => eprintln!("Warning: enrichment task failed: {}", e),
            }
        }

        Ok(cards)
    }

    /// Best-effort embedding cache consult: reuse the vector of an exact or
    /// near-duplicate query, embed and append otherwise. Never aborts the
    /// pipeline.
    async fn consult_cache(&self, query: &str) -> Option<Vec<f32>> {
        let cache = self.cache.as_ref()?;

        if let Some(vector) = {
            let cache = cache.lock().expect("cache lock poisoned");
            cache.lookup_exact(query).map(|e| e.embedding.clone())
        } {
            return Some(vector);
        }

        let vector = match embed_query(self.embedder.as_ref(), query).await {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Warning: query embedding failed: {}", e);
                return None;
            }
        };

        let mut cache = cache.lock().expect("cache lock poisoned");
        let near_hit = cache
            .nearest(&vector)
            .map(|(_, sim)| sim >= self.config.cache.similarity_threshold)
            .unwrap_or(false);

        // Near-duplicates below the threshold are misses and get their own
        // record; entries are append-only and never rewritten.
        if !near_hit {
            if let Err(e) = cache.store(query, vector.clone()) {
                eprintln!("Warning: {}", e);
            }
        }

        Some(vector)
    }
}

/// Stable partition: entries carrying a representative image sort before
/// those without, API order otherwise preserved.
pub fn sort_image_first(mut listing: Vec<SiteSummary>) -> Vec<SiteSummary> {
    listing.sort_by_key(|site| !site.has_representative_image());
    listing
}

/// Keep only entries whose top-level category matches exactly.
pub fn filter_category(listing: Vec<SiteSummary>, cat1: &str) -> Vec<SiteSummary> {
    listing
        .into_iter()
        .filter(|site| site.cat1 == cat1)
        .collect()
}

fn commercial_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new("(대리점|지점|점$|마트|백화점|면세점|아울렛|할인점|스토어)").unwrap()
    })
}

/// Drop titleless entries and commercial listings (franchise branches,
/// marts, outlets) that slip through the API's category taxonomy.
pub fn clean_listing(listing: Vec<SiteSummary>) -> Vec<SiteSummary> {
    listing
        .into_iter()
        .filter(|site| {
            let title = site.title.trim();
            !title.is_empty() && !commercial_regex().is_match(title)
        })
        .collect()
}

fn clean_title(raw: &str) -> String {
    raw.replace("<b>", "").replace("</b>", "").trim().to_string()
}

/// Enrich one listing entry: overview + homepage from `detailCommon2`, a
/// one-line summary, and the image fallback chain
/// firstimage2 → firstimage → `detailImage2`, first valid URL winning.
pub async fn enrich_site(
    chat: &dyn ChatModel,
    api: &dyn TourApi,
    policy: &ImagePolicy,
    url_cache: &ValidatedUrlCache,
    site: SiteSummary,
) -> Result<SiteDetail, PipelineError> {
    let detail =
        api.detail_common(&site.content_id)
            .await
            .map_err(|source| PipelineError::Enrichment {
                content_id: site.content_id.clone(),
                source,
            })?;

    let overview = detail.overview.trim().to_string();
    let homepage = normalize_homepage(&detail.homepage);
    let summary = summarize_one_line(chat, &overview).await;

    let image = resolve_image(api, policy, url_cache, &site).await;

    Ok(SiteDetail {
        name: clean_title(&site.title),
        address: site.full_address(),
        content_id: site.content_id,
        overview,
        summary,
        homepage: (!homepage.is_empty()).then_some(homepage),
        image,
    })
}

/// The three-step image fallback chain. All candidates empty or invalid
/// means the site has no image; the card renders a placeholder instead.
async fn resolve_image(
    api: &dyn TourApi,
    policy: &ImagePolicy,
    url_cache: &ValidatedUrlCache,
    site: &SiteSummary,
) -> Option<String> {
    if let Some(cached) = url_cache.get(&site.content_id) {
        return Some(cached);
    }

    for candidate in [&site.firstimage2, &site.firstimage] {
        if let Some(valid) = policy.validate(&to_https(candidate)).await {
            url_cache.set(&site.content_id, &valid);
            return Some(valid);
        }
    }

    // last resort: the alternate detail-image endpoint
    let records = match api.detail_images(&site.content_id).await {
        Ok(records) => records,
        Err(_) => return None,
    };
    for record in records {
        for candidate in [&record.origin_img_url, &record.small_image_url] {
            if let Some(valid) = policy.validate(candidate).await {
                url_cache.set(&site.content_id, &valid);
                return Some(valid);
            }
        }
    }

    None
}
