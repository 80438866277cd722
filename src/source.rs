//! Fetching and parsing remote documents.

use reqwest::blocking::Client;

use crate::config::ArmoryConfig;
use crate::document::Document;
use crate::error::ArmoryError;

/// Turns a URL into a parsed document.
///
/// `Fetch` covers network and HTTP status failures, `Parse` a response that
/// holds no usable markup. Callers treat both as final for that call.
#[cfg_attr(test, mockall::automock)]
pub trait DocumentSource {
    fn fetch_and_parse(&self, url: &str) -> Result<Document, ArmoryError>;
}

/// Blocking HTTP document source.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(config: &ArmoryConfig) -> Result<Self, ArmoryError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| ArmoryError::fetch("<client>", e))?;

        Ok(Self { client })
    }
}

impl DocumentSource for HttpSource {
    fn fetch_and_parse(&self, url: &str) -> Result<Document, ArmoryError> {
        tracing::info!(%url, "fetching document");

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ArmoryError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, %status, "armory returned an error status");
            return Err(ArmoryError::fetch(url, format!("HTTP {}", status)));
        }

        let body = response.text().map_err(|e| ArmoryError::fetch(url, e))?;
        parse_body(url, &body)
    }
}

/// Parse a response body, rejecting bodies with no markup.
pub fn parse_body(url: &str, body: &str) -> Result<Document, ArmoryError> {
    if body.trim().is_empty() {
        return Err(ArmoryError::parse(url, "empty response body"));
    }

    let document = Document::parse(body);
    if !document.has_content() {
        return Err(ArmoryError::parse(url, "no elements in response"));
    }

    Ok(document)
}
