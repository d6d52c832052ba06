//! Tolerant parsing of free-text model output into structured values.
//!
//! Each parser tries a strict interpretation first, then best-effort extraction, and
//! finally settles for an empty or plain-text result. None of them fail.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"\\]+)""#).expect("quoted string regex is valid"));

/// Segment IDs named by a ranking response, in the order given, duplicates removed.
///
/// Looks for the first JSON array of strings anywhere in the text (an empty array counts,
/// meaning nothing is relevant); failing that, takes every double-quoted substring;
/// failing that, returns nothing.
#[must_use]
pub fn parse_segment_ids(response: &str) -> Vec<String> {
    let ids = first_string_array(response).unwrap_or_else(|| {
        QUOTED
            .captures_iter(response)
            .map(|c| c[1].trim().to_owned())
            .collect()
    });
    dedup(ids)
}

/// Arrays holding no strings, such as `[1]` citations or arrays of objects, are skipped.
fn first_string_array(text: &str) -> Option<Vec<String>> {
    text.match_indices('[').find_map(|(pos, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[pos..]).into_iter::<Value>();
        let Some(Ok(Value::Array(items))) = stream.next() else {
            return None;
        };
        if items.is_empty() {
            return Some(Vec::new());
        }
        let strings: Vec<String> = items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_owned()),
                _ => None,
            })
            .collect();
        (!strings.is_empty()).then_some(strings)
    })
}

fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !id.is_empty() && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Summary and keywords produced for one segment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Parse an enrichment response: whole-text JSON, then an embedded JSON object, then
/// the raw text taken as the summary.
#[must_use]
pub fn parse_enrichment(response: &str) -> Enrichment {
    let trimmed = strip_code_fence(response.trim());

    if let Ok(parsed) = serde_json::from_str::<Enrichment>(trimmed) {
        return parsed;
    }

    let embedded = trimmed.match_indices('{').find_map(|(pos, _)| {
        serde_json::Deserializer::from_str(&trimmed[pos..])
            .into_iter::<Enrichment>()
            .next()
            .and_then(Result::ok)
    });
    if let Some(parsed) = embedded {
        return parsed;
    }

    Enrichment {
        summary: trimmed.to_owned(),
        keywords: Vec::new(),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn plain_array() {
        assert_eq!(
            parse_segment_ids(r#"["doc_chunk_2", "doc_chunk_1"]"#),
            ["doc_chunk_2", "doc_chunk_1"]
        );
    }

    #[test]
    fn array_embedded_in_prose() {
        let response = "Sure! The relevant sections are [\"a_chunk_3\", \"a_chunk_1\"] in that order.";
        assert_eq!(parse_segment_ids(response), ["a_chunk_3", "a_chunk_1"]);
    }

    #[test]
    fn empty_array_means_none_relevant() {
        assert!(parse_segment_ids("[]").is_empty());
        assert!(parse_segment_ids("None are relevant: []").is_empty());
    }

    #[test]
    fn skips_bracketed_non_json_before_array() {
        let response = "[note] see [\"x_chunk_1\"]";
        assert_eq!(parse_segment_ids(response), ["x_chunk_1"]);
    }

    #[test]
    fn numeric_citation_before_ranking_is_skipped() {
        let response = "Per section [1], the answer is [\"doc_chunk_2\"]";
        assert_eq!(parse_segment_ids(response), ["doc_chunk_2"]);
    }

    #[test]
    fn array_of_objects_falls_through_to_quoted_strings() {
        let ids = parse_segment_ids(r#"[{"id": "doc_chunk_2"}]"#);
        assert!(ids.contains(&"doc_chunk_2".to_owned()));
    }

    #[test]
    fn numbers_are_never_ids() {
        assert!(parse_segment_ids("[3, 1, 2]").is_empty());
    }

    #[test]
    fn falls_back_to_quoted_strings() {
        let response = "I would pick \"doc_chunk_4\" and then \"doc_chunk_2\" (unterminated [";
        assert_eq!(parse_segment_ids(response), ["doc_chunk_4", "doc_chunk_2"]);
    }

    #[test]
    fn nothing_recognizable_is_empty() {
        assert!(parse_segment_ids("I could not decide.").is_empty());
    }

    #[test]
    fn duplicates_removed_in_order() {
        assert_eq!(parse_segment_ids(r#"["b","a","b"]"#), ["b", "a"]);
    }

    #[test]
    fn enrichment_strict_json() {
        let e = parse_enrichment(r#"{"summary": "Prices for 2024.", "keywords": ["pricing"]}"#);
        assert_eq!(e.summary, "Prices for 2024.");
        assert_eq!(e.keywords, ["pricing"]);
    }

    #[test]
    fn enrichment_in_code_fence() {
        let e = parse_enrichment("```json\n{\"summary\": \"s\", \"keywords\": [\"k\"]}\n```");
        assert_eq!(e.summary, "s");
        assert_eq!(e.keywords, ["k"]);
    }

    #[test]
    fn enrichment_embedded_object() {
        let e = parse_enrichment("Here you go: {\"summary\": \"s\", \"keywords\": []} done");
        assert_eq!(e.summary, "s");
        assert!(e.keywords.is_empty());
    }

    #[test]
    fn enrichment_plain_text_becomes_summary() {
        let e = parse_enrichment("  This part covers regional sales.  ");
        assert_eq!(e.summary, "This part covers regional sales.");
        assert!(e.keywords.is_empty());
    }

    proptest! {
        #[test]
        fn parsers_never_panic(s in ".{0,200}") {
            let _ = parse_segment_ids(&s);
            let _ = parse_enrichment(&s);
        }
    }
}
