//! Extraction transforms: turn a raw dump record into plain extracted text,
//! or skip it (disambiguation pages, redirects, records with no usable
//! text field).

use async_trait::async_trait;
use corpusforge_core::error::Error;
use corpusforge_core::stage::Transform;
use corpusforge_core::types::RawRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CirrusSearchRecord {
    namespace: i64,
    #[serde(default)]
    category: Vec<String>,
    source_text: Option<String>,
}

static WIKI_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[([^\]|]*\|)?([^\]]*)\]\]").unwrap());
static WIKI_TEMPLATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{[^{}]*\}\}").unwrap());
static WIKI_MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"'{2,5}|<[^>]+>").unwrap());

/// Strips the most common wikitext markup: templates, ref tags, bold/italic
/// quoting, and `[[link|label]]` piping down to the display label.
fn strip_wikicode(input: &str) -> String {
    let s = WIKI_TEMPLATE.replace_all(input, "");
    let s = WIKI_LINK.replace_all(&s, "$2");
    WIKI_MARKUP.replace_all(&s, "").into_owned()
}

/// Extracts plain text from a CirrusSearch dump line. Only namespace-0
/// (article) records that are not disambiguation pages produce text;
/// everything else, or any record missing `source_text`, is silently
/// skipped, mirroring the original extractor's `except KeyError: pass`.
pub struct CirrusSearchExtractor;

#[async_trait]
impl Transform<RawRecord, String> for CirrusSearchExtractor {
    async fn apply(&self, input: RawRecord) -> Result<Vec<String>, Error> {
        let line = match input {
            RawRecord::CirrusSearchLine(line) => line,
            RawRecord::XmlPage { .. } => return Ok(vec![]),
        };
        let record: CirrusSearchRecord = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(_) => return Ok(vec![]),
        };
        if record.namespace != 0
            || record.category.iter().any(|c| c == "Disambiguation pages")
        {
            return Ok(vec![]);
        }
        let Some(source_text) = record.source_text else {
            return Ok(vec![]);
        };
        Ok(vec![strip_wikicode(&source_text)])
    }
}

/// Extracts plain text from an XML-reader-produced page. Namespace
/// filtering and redirect rejection already happened in the reader's tag
/// state machine, so this extractor only strips wikicode markup.
pub struct XmlPageExtractor;

#[async_trait]
impl Transform<RawRecord, String> for XmlPageExtractor {
    async fn apply(&self, input: RawRecord) -> Result<Vec<String>, Error> {
        let text = match input {
            RawRecord::XmlPage { text, .. } => text,
            RawRecord::CirrusSearchLine(_) => return Ok(vec![]),
        };
        Ok(vec![strip_wikicode(&text)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cirrus_skips_disambiguation_pages() {
        let line = serde_json::json!({
            "namespace": 0,
            "category": ["Disambiguation pages"],
            "source_text": "some text"
        })
        .to_string();
        let out = CirrusSearchExtractor
            .apply(RawRecord::CirrusSearchLine(line))
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn cirrus_extracts_namespace_zero_articles() {
        let line = serde_json::json!({
            "namespace": 0,
            "category": [],
            "source_text": "Hello '''world'''."
        })
        .to_string();
        let out = CirrusSearchExtractor
            .apply(RawRecord::CirrusSearchLine(line))
            .await
            .unwrap();
        assert_eq!(out, vec!["Hello world.".to_string()]);
    }

    #[tokio::test]
    async fn xml_page_strips_templates_and_links() {
        let out = XmlPageExtractor
            .apply(RawRecord::XmlPage {
                title: "Example".into(),
                text: "See {{infobox}} and [[Target|label]].".into(),
            })
            .await
            .unwrap();
        assert_eq!(out, vec!["See  and label.".to_string()]);
    }
}
