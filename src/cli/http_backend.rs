use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Serialize;

use crate::models::{ClassQueryResult, FunctionQueryResult, ListSymbolsResult};

/// HTTP client backend that delegates the four core operations to a
/// running `pysymindex serve` daemon.
pub struct HttpSearchBackend {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct QueryClassRequest<'a> {
    name: &'a str,
    file_hint: Option<&'a str>,
}

#[derive(Serialize)]
struct QueryFunctionRequest<'a> {
    name: &'a str,
    file_hint: Option<&'a str>,
    host_class: Option<&'a str>,
}

#[derive(Serialize)]
struct ListSymbolsRequest<'a> {
    file: Option<&'a PathBuf>,
}

#[derive(Serialize)]
struct RebuildRequest {
    force: bool,
}

#[derive(serde::Deserialize)]
struct RebuildResponse {
    #[allow(dead_code)]
    status: String,
}

impl HttpSearchBackend {
    /// Create a new HTTP backend targeting the given base URL
    /// (e.g. "http://127.0.0.1:7879").
    pub fn new<S: Into<String>>(base_url: S) -> Result<Self> {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    pub fn query_class(&self, name: &str, file_hint: Option<&str>) -> Result<ClassQueryResult> {
        self.post_json("/v1/query/class", &QueryClassRequest { name, file_hint })
    }

    pub fn query_function(
        &self,
        name: &str,
        file_hint: Option<&str>,
        host_class: Option<&str>,
    ) -> Result<FunctionQueryResult> {
        self.post_json(
            "/v1/query/function",
            &QueryFunctionRequest {
                name,
                file_hint,
                host_class,
            },
        )
    }

    pub fn list_symbols(&self, file: Option<&PathBuf>) -> Result<ListSymbolsResult> {
        self.post_json("/v1/symbols", &ListSymbolsRequest { file })
    }

    pub fn rebuild_index(&self, force: bool) -> Result<()> {
        let _: RebuildResponse = self.post_json("/v1/rebuild", &RebuildRequest { force })?;
        Ok(())
    }

    fn post_json<T, R>(&self, path: &str, body: &T) -> Result<R>
    where
        T: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = self.url_for(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .with_context(|| format!("failed to send request to {}", url))?
            .error_for_status()
            .with_context(|| format!("server returned error for {}", url))?;

        let value = response
            .json::<R>()
            .context("failed to decode JSON response from server")?;

        Ok(value)
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
