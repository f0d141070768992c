//! OpenAI-compatible HTTP provider.
//!
//! Works against any server exposing the `/v1/chat/completions` and
//! `/v1/embeddings` wire format (OpenAI, LM Studio, Ollama, vLLM).

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::config::LlmSettings;
use crate::core::errors::ApiError;

#[derive(Clone)]
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    embedding_model: String,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(settings: &LlmSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            chat_model: settings.chat_model.clone(),
            embedding_model: settings.embedding_model.clone(),
            client: Client::new(),
        }
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    fn map_transport_error(err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else {
            ApiError::Upstream(err.to_string())
        }
    }

    fn chat_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": self.chat_model,
            "messages": request.messages,
            "stream": stream,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
            if let Some(s) = &request.stop {
                obj.insert("stop".to_string(), json!(s));
            }
        }

        body
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/v1/models", self.base_url);
        let mut builder = self.client.get(&url).timeout(Duration::from_secs(5));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        match builder.send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest, timeout: Duration) -> Result<String, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.chat_body(&request, false);

        let res = self
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!("chat completion failed: {}", text)));
        }

        let payload: Value = res.json().await.map_err(Self::map_transport_error)?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(content)
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.chat_body(&request, true);

        let res = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!("chat stream failed: {}", text)));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        // The receiver dropping ends this task: channel sends fail and the
        // response body stream is dropped with it, which cancels the request.
        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        let chunk_str = String::from_utf8_lossy(&bytes);
                        for line in chunk_str.lines() {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            if line == "data: [DONE]" {
                                return;
                            }

                            if let Some(data) = line.strip_prefix("data: ") {
                                if let Ok(json) = serde_json::from_str::<Value>(data) {
                                    if let Some(content) =
                                        json["choices"][0]["delta"]["content"].as_str()
                                    {
                                        if !content.is_empty()
                                            && tx.send(Ok(content.to_string())).await.is_err()
                                        {
                                            return;
                                        }
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(Self::map_transport_error(e))).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn embed(&self, input: &str, timeout: Duration) -> Result<Vec<f32>, ApiError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.embedding_model,
            "input": input,
        });

        let res = self
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!("embedding failed: {}", text)));
        }

        let payload: Value = res.json().await.map_err(Self::map_transport_error)?;
        let embedding: Vec<f32> = payload["data"][0]["embedding"]
            .as_array()
            .map(|vals| {
                vals.iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect()
            })
            .unwrap_or_default();

        if embedding.is_empty() {
            return Err(ApiError::Upstream(
                "embedding response carried no vector".to_string(),
            ));
        }

        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LlmSettings;
    use crate::llm::types::ChatMessage;
    use tokio::net::TcpListener;

    fn provider_for(base_url: String) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(&LlmSettings {
            base_url,
            ..LlmSettings::default()
        })
    }

    /// Accepts connections and holds them open without ever answering.
    async fn stalled_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let _held = socket;
                    tokio::time::sleep(Duration::from_secs(60)).await;
                });
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn embed_timeout_surfaces_as_retryable_timeout() {
        let provider = provider_for(stalled_server().await);

        let err = provider
            .embed("battery care", Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Timeout(_)), "got {:?}", err);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn chat_timeout_surfaces_as_retryable_timeout() {
        let provider = provider_for(stalled_server().await);
        let request = ChatRequest::new(vec![ChatMessage::user("hello")]);

        let err = provider
            .chat(request, Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Timeout(_)), "got {:?}", err);
        assert!(err.is_retryable());
    }
}
