//! Anchored pattern extraction from scraped map pages.
//!
//! Map pages embed their data as JSON-ish literals inside `<script>` blocks.
//! A loose search would happily match unrelated page content, so every
//! pattern is anchored on a token that only appears next to the value we
//! want:
//!
//! 1. the `"formatted_address":"..."` literal, and failing that
//! 2. the global plus code for the requested coordinate, followed by the
//!    first `[ "..." ]` array, which holds the compound code
//!    (e.g. `WP9P+V4F Thuan An, Binh Duong`).

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::{decode_json_string, AddressResult};
use crate::coord::PlusCode;

fn formatted_address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""formatted_address"\s*:\s*"((?:[^"\\]|\\.)*)""#)
            .expect("formatted_address pattern is valid")
    })
}

/// Builds the plus-code anchored pattern. `.` does not cross newlines, which
/// keeps the match within the same script line as the anchor.
fn plus_code_pattern(global_code: &str) -> Option<Regex> {
    let pattern = format!(r#"{}.*?\[\s*"((?:[^"\\]|\\.)*?)"\s*\]"#, regex::escape(global_code));
    Regex::new(&pattern).ok()
}

pub(super) fn parse(payload: &[u8], plus_code: PlusCode) -> AddressResult {
    let page = String::from_utf8_lossy(payload);

    let formatted = formatted_address_pattern()
        .captures(&page)
        .and_then(|c| c.get(1))
        .map(|m| decode_json_string(m.as_str()))
        .filter(|s| !s.trim().is_empty());

    let compound = plus_code_pattern(&plus_code.global)
        .and_then(|re| {
            re.captures(&page)
                .and_then(|c| c.get(1))
                .map(|m| decode_json_string(m.as_str()))
        })
        .filter(|s| !s.trim().is_empty());

    if formatted.is_none() && compound.is_none() {
        debug!(
            global_code = %plus_code.global,
            page_bytes = payload.len(),
            "No anchored marker found in page"
        );
    }

    let display_name = formatted.or_else(|| compound.clone());

    AddressResult {
        display_name,
        address_components: Default::default(),
        plus_code: Some(plus_code.with_compound(compound)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> PlusCode {
        PlusCode {
            global: "7P28WP9P+V4".to_string(),
            compound: None,
        }
    }

    const MAPS_PAGE: &str = r#"<!DOCTYPE html><html><head><title>Google Maps</title>
<script>window.APP_INITIALIZATION_STATE=[[["7P28WP9P+V4",null,[ "WP9P+V4F Thuan An, Binh Duong" ]],["other"]]];</script>
</head><body></body></html>"#;

    #[test]
    fn test_plus_code_anchor_captures_compound() {
        let result = parse(MAPS_PAGE.as_bytes(), code());
        assert_eq!(
            result.display_name.as_deref(),
            Some("WP9P+V4F Thuan An, Binh Duong")
        );
        let plus_code = result.plus_code.unwrap();
        assert_eq!(plus_code.global, "7P28WP9P+V4");
        assert_eq!(
            plus_code.compound.as_deref(),
            Some("WP9P+V4F Thuan An, Binh Duong")
        );
    }

    #[test]
    fn test_formatted_address_wins_over_compound() {
        let page = format!(
            r#"{}<script>{{"formatted_address":"12 Nguyen Hue, District 1"}}</script>"#,
            MAPS_PAGE
        );
        let result = parse(page.as_bytes(), code());
        assert_eq!(
            result.display_name.as_deref(),
            Some("12 Nguyen Hue, District 1")
        );
        // Compound code is still recorded alongside
        assert!(result.plus_code.unwrap().compound.is_some());
    }

    #[test]
    fn test_anchor_is_required() {
        // An array literal without the plus code in front must not match
        let page = r#"<script>var x = [ "Unrelated string" ];</script>"#;
        let result = parse(page.as_bytes(), code());
        assert!(result.display_name.is_none());
    }

    #[test]
    fn test_plus_sign_in_code_is_literal() {
        // Unescaped, "+" would mean "one or more P" and match "7P28WP9PPV4"
        let page = r#"7P28WP9PPV4 [ "wrong" ]"#;
        let result = parse(page.as_bytes(), code());
        assert!(result.display_name.is_none());
    }

    #[test]
    fn test_escaped_characters_decoded() {
        let page = r#"{"formatted_address":"Café \"Sao\", 5 Lê Lợi"}"#;
        let result = parse(page.as_bytes(), code());
        assert_eq!(
            result.display_name.as_deref(),
            Some("Café \"Sao\", 5 Lê Lợi")
        );
    }

    #[test]
    fn test_empty_formatted_address_ignored() {
        let page = r#"{"formatted_address":""}"#;
        let result = parse(page.as_bytes(), code());
        assert!(result.display_name.is_none());
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let mut page = b"\xff\xfe".to_vec();
        page.extend_from_slice(br#"{"formatted_address":"1 Main St"}"#);
        let result = parse(&page, code());
        assert_eq!(result.display_name.as_deref(), Some("1 Main St"));
    }
}
