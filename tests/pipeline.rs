//! End-to-end pipeline tests against canned services.
//!
//! The language model, embedding model, and tourism API are injected as
//! mock trait implementations — no network traffic. Image URLs use the
//! HEAD-whitelisted host so validation passes offline.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use tour_scout::cache::VectorCache;
use tour_scout::config::Config;
use tour_scout::embedding::Embedder;
use tour_scout::error::PipelineError;
use tour_scout::llm::ChatModel;
use tour_scout::models::{AreaCode, DetailCommon, DetailImage, SiteSummary};
use tour_scout::pipeline::Recommender;
use tour_scout::present::{NO_IMAGE, NO_SUMMARY};
use tour_scout::tour_api::TourApi;

const IMG_HOST: &str = "https://tong.visitkorea.or.kr";

struct MockChat {
    extraction_json: String,
}

#[async_trait]
impl ChatModel for MockChat {
    async fn complete(&self, _system: &str, user: &str, json_output: bool) -> Result<String> {
        if json_output {
            Ok(self.extraction_json.clone())
        } else {
            // summarizer path: a stable one-liner regardless of overview
            let _ = user;
            Ok("주변 경치를 즐길 수 있습니다".to_string())
        }
    }
}

/// Deterministic toy embedding: 4 dims derived from byte sums.
struct MockEmbedder;

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_name(&self) -> &str {
        "mock-embedding"
    }
    fn dims(&self) -> usize {
        4
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let sum: u32 = t.bytes().map(u32::from).sum();
                vec![
                    (sum % 97) as f32 / 97.0,
                    (sum % 31) as f32 / 31.0,
                    (sum % 13) as f32 / 13.0,
                    1.0,
                ]
            })
            .collect())
    }
}

struct MockApi {
    listing: Vec<SiteSummary>,
    details: HashMap<String, DetailCommon>,
    images: HashMap<String, Vec<DetailImage>>,
    failing_ids: Vec<String>,
}

impl MockApi {
    fn new(listing: Vec<SiteSummary>) -> Self {
        Self {
            listing,
            details: HashMap::new(),
            images: HashMap::new(),
            failing_ids: Vec::new(),
        }
    }

    fn with_detail(mut self, id: &str, overview: &str, homepage: &str) -> Self {
        self.details.insert(
            id.to_string(),
            DetailCommon {
                overview: overview.to_string(),
                homepage: homepage.to_string(),
            },
        );
        self
    }

    fn with_images(mut self, id: &str, origin: &str, small: &str) -> Self {
        self.images.insert(
            id.to_string(),
            vec![DetailImage {
                origin_img_url: origin.to_string(),
                small_image_url: small.to_string(),
            }],
        );
        self
    }

    fn failing(mut self, id: &str) -> Self {
        self.failing_ids.push(id.to_string());
        self
    }
}

#[async_trait]
impl TourApi for MockApi {
    async fn area_codes(&self) -> Result<Vec<AreaCode>> {
        Ok(vec![
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
        ])
    }

    async fn area_based_list(
        &self,
        area_code: &str,
        _cat1: Option<&str>,
        _num_rows: usize,
    ) -> Result<Vec<SiteSummary>> {
        assert_eq!(area_code, "39", "tests route everything through Jeju");
        Ok(self.listing.clone())
    }

    async fn detail_common(&self, content_id: &str) -> Result<DetailCommon> {
        if self.failing_ids.iter().any(|id| id == content_id) {
            anyhow::bail!("simulated network error for {}", content_id);
        }
        Ok(self.details.get(content_id).cloned().unwrap_or_default())
    }

    async fn detail_images(&self, content_id: &str) -> Result<Vec<DetailImage>> {
        Ok(self.images.get(content_id).cloned().unwrap_or_default())
    }
}

fn site(id: &str, title: &str, cat1: &str, firstimage2: &str, firstimage: &str) -> SiteSummary {
    SiteSummary {
        content_id: id.into(),
        title: title.into(),
        addr1: "제주특별자치도 서귀포시".into(),
        addr2: String::new(),
        cat1: cat1.into(),
        firstimage: firstimage.into(),
        firstimage2: firstimage2.into(),
    }
}

fn recommender(extraction_json: &str, api: MockApi, cache: Option<VectorCache>) -> Recommender {
    Recommender::with_parts(
        Arc::new(MockChat {
            extraction_json: extraction_json.to_string(),
        }),
        Arc::new(MockEmbedder),
        Arc::new(api),
        cache,
        Config::default(),
    )
}

#[tokio::test]
async fn jeju_nature_end_to_end() {
    let api = MockApi::new(vec![
        site("100", "어느쇼핑몰", "A04", &format!("{}/mall.jpg", IMG_HOST), ""),
        site("101", "천지연폭포", "A01", &format!("{}/falls.jpg", IMG_HOST), ""),
        site("102", "한라산", "A01", "", ""),
        site("103", "성산일출봉", "A01", "", &format!("{}/sunrise.jpg", IMG_HOST)),
    ])
    .with_detail("101", "계곡과 숲길이 아름다운 폭포입니다.", "http://www.visitjeju.net")
    .with_detail("102", "제주도의 중심에 솟은 화산입니다.", "")
    .with_detail("103", "일출 명소로 유명한 분화구입니다.", "");

    let rec = recommender(r#"{"region":"제주","cat1":"A01"}"#, api, None);
    let cards = rec.recommend("제주 자연", 5).await.unwrap();

    // the A04 entry is filtered out, the three A01 sites survive
    assert_eq!(cards.len(), 3);

    // image-first ordering: 101 and 103 carry representative images
    assert_eq!(cards[0].name, "천지연폭포");
    assert_eq!(cards[1].name, "성산일출봉");
    assert_eq!(cards[2].name, "한라산");

    // field A (firstimage2) wins when present, upgraded to https
    assert_eq!(
        cards[0].image_url.as_deref(),
        Some("https://tong.visitkorea.or.kr/falls.jpg")
    );
    // no image field was set and no alternate record exists
    assert_eq!(cards[2].image_url, None);

    assert_eq!(
        cards[0].homepage.as_deref(),
        Some("https://www.visitjeju.net")
    );
    assert!(cards[0].summary.ends_with("즐길 수 있습니다."));
    assert_eq!(cards[0].address, "제주특별자치도 서귀포시");
}

#[tokio::test]
async fn unknown_region_is_not_found_not_a_crash() {
    let api = MockApi::new(Vec::new());
    let rec = recommender(r#"{"region":"아틀란티스","cat1":"A01"}"#, api, None);

    let err = rec.recommend("아틀란티스 자연", 5).await.unwrap_err();
    match err {
        PipelineError::RegionNotFound(region) => assert_eq!(region, "아틀란티스"),
        other => panic!("expected RegionNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn one_failing_site_among_five_drops_only_that_site() {
    let mut api = MockApi::new(
        (0..5)
            .map(|i| {
                site(
                    &format!("20{}", i),
                    &format!("명소{}", i),
                    "A01",
                    &format!("{}/{}.jpg", IMG_HOST, i),
                    "",
                )
            })
            .collect(),
    );
    for i in 0..5 {
        api = api.with_detail(&format!("20{}", i), "볼거리가 많은 명소입니다.", "");
    }
    let api = api.failing("202");

    let rec = recommender(r#"{"region":"제주","cat1":"A01"}"#, api, None);
    let cards = rec.recommend("제주 자연", 5).await.unwrap();

    assert_eq!(cards.len(), 4);
    assert!(cards.iter().all(|c| c.name != "명소2"));
    // surviving cards keep listing order
    assert_eq!(cards[0].name, "명소0");
    assert_eq!(cards[3].name, "명소4");
}

#[tokio::test]
async fn detail_image_endpoint_is_the_last_fallback() {
    let api = MockApi::new(vec![site("300", "비자림", "A01", "", "")])
        .with_detail("300", "숲길이 좋은 곳입니다.", "")
        .with_images("300", &format!("{}/forest.jpg", IMG_HOST), "");

    let rec = recommender(r#"{"region":"제주","cat1":"A01"}"#, api, None);
    let cards = rec.recommend("제주 자연", 5).await.unwrap();

    assert_eq!(cards.len(), 1);
    assert_eq!(
        cards[0].image_url.as_deref(),
        Some("https://tong.visitkorea.or.kr/forest.jpg")
    );
}

#[tokio::test]
async fn empty_listing_is_a_valid_empty_result() {
    let api = MockApi::new(Vec::new());
    let rec = recommender(r#"{"region":"제주","cat1":"A01"}"#, api, None);
    let cards = rec.recommend("제주 자연", 5).await.unwrap();
    assert!(cards.is_empty());
}

#[tokio::test]
async fn missing_detail_fields_become_placeholders() {
    // detail_common succeeds but carries nothing
    let api = MockApi::new(vec![site("400", "이름없는곳", "A01", "", "")])
        .with_detail("400", "", "");

    let rec = recommender(r#"{"region":"제주","cat1":"A01"}"#, api, None);
    let cards = rec.recommend("제주 자연", 5).await.unwrap();

    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].summary, NO_SUMMARY);
    assert_eq!(cards[0].image_url, None);
    assert_eq!(cards[0].homepage, None);
    // the text renderer shows a placeholder for a missing image
    assert_eq!(cards[0].image_url.as_deref().unwrap_or(NO_IMAGE), NO_IMAGE);
}

#[tokio::test]
async fn repeated_query_reuses_cache_entry() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache_path = dir.path().join("vector_cache.jsonl");

    let listing = vec![site("101", "천지연폭포", "A01", "", "")];
    let details = ("101", "계곡과 숲길이 아름다운 폭포입니다.", "");

    // first run stores one record
    {
        let api = MockApi::new(listing.clone()).with_detail(details.0, details.1, details.2);
        let cache = VectorCache::open(&cache_path).unwrap();
        let rec = recommender(r#"{"region":"제주","cat1":"A01"}"#, api, Some(cache));
        rec.recommend("제주 자연", 5).await.unwrap();
    }
    let after_first = VectorCache::open(&cache_path).unwrap();
    assert_eq!(after_first.len(), 1);
    assert!(after_first.lookup_exact("제주 자연").is_some());

    // identical query (modulo whitespace) hits the exact lookup and
    // appends nothing
    {
        let api = MockApi::new(listing).with_detail(details.0, details.1, details.2);
        let cache = VectorCache::open(&cache_path).unwrap();
        let rec = recommender(r#"{"region":"제주","cat1":"A01"}"#, api, Some(cache));
        rec.recommend("  제주   자연 ", 5).await.unwrap();
    }
    let after_second = VectorCache::open(&cache_path).unwrap();
    assert_eq!(after_second.len(), 1);
}

#[tokio::test]
async fn dissimilar_query_appends_its_own_record() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache_path = dir.path().join("vector_cache.jsonl");

    let run = |query: &'static str| {
        let cache = VectorCache::open(&cache_path).unwrap();
        let api = MockApi::new(vec![site("101", "천지연폭포", "A01", "", "")])
            .with_detail("101", "폭포입니다.", "");
        let rec = recommender(r#"{"region":"제주","cat1":"A01"}"#, api, Some(cache));
        async move { rec.recommend(query, 5).await }
    };

    run("제주 자연").await.unwrap();
    run("제주도 역사 박물관 투어").await.unwrap();

    let cache = VectorCache::open(&cache_path).unwrap();
    // both may land, or the second may fall under the similarity
    // threshold of the toy embedder; exact lookup must work either way
    assert!(cache.lookup_exact("제주 자연").is_some());
    assert!(!cache.is_empty());
}
