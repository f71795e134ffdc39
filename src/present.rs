//! Card presentation.
//!
//! Pure mapping from enriched [`SiteDetail`] records to the display schema,
//! plus the terminal rendering of the final list. Missing optional fields
//! map to fixed placeholder text; nothing here can fail.

use crate::models::{Card, SiteDetail};

pub const NO_NAME: &str = "이름 정보 없음";
pub const NO_SUMMARY: &str = "한 줄 설명 없음";
pub const NO_ADDRESS: &str = "주소 정보 없음";
pub const NO_IMAGE: &str = "이미지 없음";
pub const NO_HOMEPAGE: &str = "홈페이지 정보 없음";

/// Map one enriched site to its display card.
pub fn render(detail: &SiteDetail) -> Card {
    let pick = |s: &str, placeholder: &str| {
        let t = s.trim();
        if t.is_empty() {
            placeholder.to_string()
        } else {
            t.to_string()
        }
    };

    Card {
        name: pick(&detail.name, NO_NAME),
        summary: pick(&detail.summary, NO_SUMMARY),
        address: pick(&detail.address, NO_ADDRESS),
        image_url: detail.image.clone().filter(|s| !s.trim().is_empty()),
        homepage: detail.homepage.clone().filter(|s| !s.trim().is_empty()),
    }
}

/// Print the recommendation list, one block per card.
pub fn print_cards(cards: &[Card]) {
    if cards.is_empty() {
        println!("추천 결과가 없습니다.");
        return;
    }

    for (i, card) in cards.iter().enumerate() {
        println!("{}. {}", i + 1, card.name);
        println!("   {}", card.summary);
        println!("   주소: {}", card.address);
        println!(
            "   이미지: {}",
            card.image_url.as_deref().unwrap_or(NO_IMAGE)
        );
        println!(
            "   홈페이지: {}",
            card.homepage.as_deref().unwrap_or(NO_HOMEPAGE)
        );
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail() -> SiteDetail {
        SiteDetail {
            content_id: "126535".into(),
            name: "천지연폭포".into(),
            address: "제주특별자치도 서귀포시".into(),
            overview: "계곡과 숲길이 아름다운 폭포.".into(),
            summary: "숲길과 어우러진 폭포 경치를 즐길 수 있습니다.".into(),
            homepage: Some("https://www.visitjeju.net".into()),
            image: Some("https://tong.visitkorea.or.kr/a.jpg".into()),
        }
    }

    #[test]
    fn test_render_passes_fields_through() {
        let card = render(&detail());
        assert_eq!(card.name, "천지연폭포");
        assert_eq!(
            card.image_url.as_deref(),
            Some("https://tong.visitkorea.or.kr/a.jpg")
        );
        assert_eq!(card.homepage.as_deref(), Some("https://www.visitjeju.net"));
    }

    #[test]
    fn test_render_placeholders_for_missing_fields() {
        let mut d = detail();
        d.name.clear();
        d.summary = "   ".into();
        d.address.clear();
        d.homepage = None;
        d.image = Some("".into());

        let card = render(&d);
        assert_eq!(card.name, NO_NAME);
        assert_eq!(card.summary, NO_SUMMARY);
        assert_eq!(card.address, NO_ADDRESS);
        assert_eq!(card.homepage, None);
        assert_eq!(card.image_url, None);
    }
}
