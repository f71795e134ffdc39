//! Field extraction and one-line summaries.
//!
//! The extractor turns a free-text Korean travel query into exactly one
//! region name and at most one top-level category (`cat1`) code by calling
//! the chat model with a fixed prompt. The summarizer condenses a site's
//! overview into one display-length sentence, falling back to deterministic
//! truncation when the model is unavailable.

use anyhow::Result;

use crate::error::PipelineError;
use crate::llm::ChatModel;
use crate::models::ExtractedFields;

/// The tourism API's top-level category taxonomy.
pub const CAT1_CHOICES: &[(&str, &str)] = &[
    ("A01", "자연"),
    ("A02", "인문(문화/예술/역사)"),
    ("A03", "레포츠"),
    ("A04", "쇼핑"),
    ("A05", "음식"),
    ("B02", "숙박"),
    ("C01", "추천코스"),
];

/// Region words recognized directly in the query when the model does not
/// name one.
const REGION_HINTS: &[&str] = &[
    "서울",
    "부산",
    "대구",
    "인천",
    "광주",
    "대전",
    "울산",
    "세종",
    "경기",
    "강원",
    "충북",
    "충남",
    "전북",
    "전남",
    "경북",
    "경남",
    "제주",
    "강원특별자치도",
    "제주특별자치도",
];

const FALLBACK_SUMMARY_CHARS: usize = 40;

fn cat1_is_known(code: &str) -> bool {
    CAT1_CHOICES.iter().any(|(c, _)| *c == code)
}

fn extraction_prompt(query: &str) -> String {
    let cat_list = CAT1_CHOICES
        .iter()
        .map(|(code, name)| format!("- {} : {}", code, name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "다음 한국어 요청에서\n\
         1) 지역명 1개(예: 제주, 부산, 강릉)와\n\
         2) 아래 목록 중 가장 가까운 대분류 cat1 코드 1개\n\
         를 JSON으로만 출력하세요.\n\n\
         대분류 목록:\n{cat_list}\n\n\
         출력 스키마:\n{{\"region\":\"제주\",\"cat1\":\"A01\"}}\n\n\
         요청: {query}"
    )
}

/// Scan the raw query for a known region word; fall back to the trimmed
/// query itself so an unknown region still reaches code resolution (where
/// it fails as a visible not-found, not a crash).
fn region_from_hints(query: &str) -> String {
    let trimmed = query.trim();
    REGION_HINTS
        .iter()
        .find(|hint| trimmed.contains(*hint))
        .map(|hint| hint.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Extract (region, cat1) from a free-text query.
///
/// Model call failure or an unparseable response is an
/// [`PipelineError::Extraction`] — no retry. A parseable response with an
/// empty region falls back to [`region_from_hints`]; a cat1 code outside
/// the known table becomes `None`.
pub async fn extract_fields(
    chat: &dyn ChatModel,
    query: &str,
) -> Result<ExtractedFields, PipelineError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(PipelineError::Extraction("empty query".to_string()));
    }

    let raw = chat
        .complete(
            "반드시 유효한 JSON만 출력하세요.",
            &extraction_prompt(query),
            true,
        )
        .await
        .map_err(|e| PipelineError::Extraction(e.to_string()))?;

    let value: serde_json::Value = serde_json::from_str(raw.trim())
        .map_err(|e| PipelineError::Extraction(format!("unparseable model output: {}", e)))?;

    let region = value
        .get("region")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    let cat1 = value
        .get("cat1")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_uppercase())
        .filter(|s| cat1_is_known(s));

    let region = if region.is_empty() {
        region_from_hints(query)
    } else {
        region
    };

    Ok(ExtractedFields { region, cat1 })
}

/// First sentence of `text`, truncated to [`FALLBACK_SUMMARY_CHARS`]
/// characters with a `...` marker. Deterministic for a given overview.
pub fn fallback_summary(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let first = trimmed
        .split_inclusive(['.', '!', '?', '。'])
        .next()
        .unwrap_or(trimmed)
        .trim_end_matches(['.', '!', '?', '。'])
        .trim();

    let chars: Vec<char> = first.chars().collect();
    if chars.len() > FALLBACK_SUMMARY_CHARS {
        let head: String = chars[..FALLBACK_SUMMARY_CHARS].iter().collect();
        format!("{}...", head)
    } else {
        format!("{}.", first)
    }
}

/// Condense an overview into a single Korean sentence for card display.
///
/// Tries the chat model first (temperature 0.0, so the output is stable for
/// the same overview); any failure degrades to [`fallback_summary`]. Empty
/// overview yields an empty summary.
pub async fn summarize_one_line(chat: &dyn ChatModel, overview: &str) -> String {
    let text = overview.trim();
    if text.is_empty() {
        return String::new();
    }

    let user = format!(
        "예시입력: 천지연폭포는 계곡과 숲길이 아름답습니다.\n\
         예시출력: 숲길과 어우러진 천지연폭포의 경치를 즐길 수 있습니다.\n\n\
         다음 글을 같은 형식으로 요약:\n{}",
        text
    );

    match chat
        .complete(
            "한국어 문장 하나로만 답해. 금지어: 요약,정리,한줄,한 문장. 28~48자.",
            &user,
            false,
        )
        .await
    {
        Ok(answer) => {
            let first = answer
                .trim()
                .split_inclusive(['.', '!', '?', '。'])
                .next()
                .unwrap_or("")
                .trim_end_matches(['.', '!', '?', '。'])
                .trim()
                .to_string();
            if first.is_empty() {
                fallback_summary(text)
            } else {
                format!("{}.", first)
            }
        }
        Err(_) => fallback_summary(text),
    }
}
