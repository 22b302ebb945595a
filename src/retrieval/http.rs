//! HTTP 索引适配器
//!
//! `POST {endpoint}`，请求体 `{query, principal, k}`，响应 `{passages: [{text, metadata}]}`。
//! 超时由 reqwest 客户端控制，超时与其它请求失败同样作为检索错误返回。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::Principal;
use crate::retrieval::{Passage, RetrievalError, Retriever};

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    principal: &'a str,
    k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    passages: Vec<Passage>,
}

pub struct HttpRetriever {
    client: Client,
    endpoint: String,
}

impl HttpRetriever {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn search(
        &self,
        query: &str,
        principal: &Principal,
        k: usize,
    ) -> Result<Vec<Passage>, RetrievalError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&SearchRequest {
                query,
                principal: principal.as_str(),
                k,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        let mut parsed: SearchResponse = resp.json().await?;
        parsed.passages.truncate(k);
        Ok(parsed.passages)
    }
}
