use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use tutela_core::ai::Retriever;
use tutela_core::types::{Passage, PassageMetadata};

/// Client for the semantic-search service that indexes the legal corpus.
/// POSTs `{"query": ..., "k": ...}` and accepts either a bare array of
/// passages or an object wrapping one under `documents`/`docs`/`output`.
pub struct HttpRetriever {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRetriever {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client for the retriever")?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Deserialize)]
struct RawPassage {
    #[serde(alias = "page_content")]
    content: String,
    #[serde(default)]
    metadata: PassageMetadata,
}

fn unwrap_documents(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in ["documents", "docs", "output"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return items;
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        info!(k, "querying retriever");

        let response = self
            .client
            .post(&url)
            .json(&SearchRequest { query, k })
            .send()
            .await
            .context("retriever request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("retriever returned HTTP {status}");
        }

        let body: Value = response
            .json()
            .await
            .context("failed to decode retriever response")?;

        let passages = unwrap_documents(body)
            .into_iter()
            .filter_map(|v| serde_json::from_value::<RawPassage>(v).ok())
            .filter(|p| !p.content.trim().is_empty())
            .take(k)
            .map(|p| Passage {
                content: p.content,
                metadata: p.metadata,
            })
            .collect();
        Ok(passages)
    }
}
