//! Module registry client
//!
//! The registry is a GitHub "contents" API directory. Listing it returns a
//! JSON array of entries; fetching `<url>/<name>` returns one entry whose
//! `download_url` points at the raw file.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{NmbError, Result};
use crate::modules::validate_name;

/// One entry of a contents listing
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RegistryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// HTTP client for the module registry
pub struct RegistryClient {
    client: Client,
    base_url: String,
    available: Vec<String>,
}

impl RegistryClient {
    /// Create a registry client
    ///
    /// # Arguments
    /// * `base_url` - contents API URL of the modules directory
    /// * `timeout` - per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nmb/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            available: Vec::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Module names from the most recent successful listing
    pub fn available(&self) -> &[String] {
        &self.available
    }

    /// List module files in the registry directory
    ///
    /// Calls GET on the base URL and keeps entries of type `file`.
    pub async fn fetch_modules(&mut self) -> Result<Vec<String>> {
        let entries: Vec<RegistryEntry> = self.get_json(&self.base_url).await?;

        let names: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.kind == "file")
            .map(|entry| entry.name)
            .collect();

        info!(count = names.len(), "fetched module listing");
        self.available = names.clone();
        Ok(names)
    }

    /// Download one module's source text
    ///
    /// Fetches the entry metadata first, then its `download_url`.
    pub async fn download_module(&self, name: &str) -> Result<String> {
        validate_name(name)?;

        let metadata_url = format!("{}/{}", self.base_url, name);
        let entry: RegistryEntry = self.get_json(&metadata_url).await.map_err(|e| match e {
            NmbError::Registry(reason) => {
                NmbError::Registry(format!("Failed to fetch metadata for {}: {}", name, reason))
            }
            other => other,
        })?;

        let download_url = entry
            .download_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| NmbError::Registry(format!("Download URL not found for {}", name)))?;

        debug!(module = name, url = %download_url, "downloading module");
        let response = self.client.get(&download_url).send().await?;
        if !response.status().is_success() {
            return Err(NmbError::Registry(format!(
                "Failed to download the content of {}: {}",
                name,
                response.status()
            )));
        }

        Ok(response.text().await?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NmbError::Registry(format!("{} returned {}", url, response.status())));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
