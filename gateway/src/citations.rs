//! Citation normalisation.
//!
//! Web-search models report sources either as structured `search_results`
//! or as a legacy flat `citations` list of URLs. The shape is decided once,
//! when the gateway response is decoded, into a [`CitationPayload`].

use serde::{Deserialize, Serialize};

use crate::types::GatewayResponse;

/// Structured search result as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CitationPayload {
    Structured(Vec<SearchResult>),
    Legacy(Vec<String>),
    #[default]
    None
}

impl CitationPayload {
    /// Prefers non-empty structured results, then a non-empty legacy list.
    pub fn from_raw(search_results: Option<Vec<SearchResult>>, citations: Option<Vec<String>>) -> Self {
        match (search_results, citations) {
            (Some(results), _) if !results.is_empty() => CitationPayload::Structured(results),
            (_, Some(urls)) if !urls.is_empty() => CitationPayload::Legacy(urls),
            _ => CitationPayload::None
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CitationPayload::None)
    }
}

/// Canonical citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>
}

pub fn extract_citations(response: &GatewayResponse) -> Vec<Citation> {
    match &response.citations {
        CitationPayload::Structured(results) => results
            .iter()
            .map(|r| Citation {
                url: r.url.clone(),
                title: Some(r.title.clone()).filter(|t| !t.is_empty()),
                date: r.date.clone(),
                snippet: r.snippet.clone()
            })
            .collect(),
        CitationPayload::Legacy(urls) => urls
            .iter()
            .map(|url| Citation {
                url: url.clone(),
                title: None,
                date: None,
                snippet: None
            })
            .collect(),
        CitationPayload::None => Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_core::UsageRecord;

    fn response(citations: CitationPayload) -> GatewayResponse {
        GatewayResponse {
            content: String::new(),
            model: "perplexity/sonar-pro".to_string(),
            usage: UsageRecord::default(),
            citations
        }
    }

    fn result(url: &str) -> SearchResult {
        SearchResult {
            title: format!("Title for {url}"),
            url: url.to_string(),
            date: Some("2025-03-01".to_string()),
            snippet: Some("snippet".to_string())
        }
    }

    #[test]
    fn test_structured_preferred_over_legacy() {
        let payload = CitationPayload::from_raw(
            Some(vec![result("https://a.example")]),
            Some(vec!["https://legacy.example".to_string()])
        );
        let citations = extract_citations(&response(payload));
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url, "https://a.example");
        assert_eq!(citations[0].title.as_deref(), Some("Title for https://a.example"));
        assert_eq!(citations[0].date.as_deref(), Some("2025-03-01"));
    }

    #[test]
    fn test_empty_structured_falls_back_to_legacy() {
        let payload = CitationPayload::from_raw(
            Some(vec![]),
            Some(vec!["https://legacy.example".to_string()])
        );
        let citations = extract_citations(&response(payload));
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url, "https://legacy.example");
        assert!(citations[0].title.is_none());
        assert!(citations[0].date.is_none());
        assert!(citations[0].snippet.is_none());
    }

    #[test]
    fn test_no_citations() {
        assert!(CitationPayload::from_raw(None, None).is_empty());
        assert!(CitationPayload::from_raw(Some(vec![]), Some(vec![])).is_empty());
        assert!(extract_citations(&response(CitationPayload::None)).is_empty());
    }

    #[test]
    fn test_search_result_tolerates_missing_title() {
        let parsed: SearchResult = serde_json::from_str(r#"{"url": "https://x.example"}"#).unwrap();
        let citations = extract_citations(&response(CitationPayload::Structured(vec![parsed])));
        assert!(citations[0].title.is_none());
    }
}
