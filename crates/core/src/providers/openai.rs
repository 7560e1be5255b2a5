use crate::config::ProviderSettings;
use crate::traits::{Embedder, Generator};
use crate::{ApiKey, EmbeddingVector, QaError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const PROVIDER: &str = "openai";

/// Shared HTTP plumbing for the embedding and completion endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    settings: ProviderSettings,
}

impl OpenAiClient {
    pub fn new(settings: ProviderSettings) -> Result<Self, QaError> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|error| QaError::Configuration(format!("http client: {error}")))?;

        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    async fn post_json<B, T>(&self, path: &str, credential: &ApiKey, body: &B) -> Result<T, QaError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.settings.endpoint(path)?;

        let response = self
            .client
            .post(url)
            .bearer_auth(credential.expose())
            .json(body)
            .send()
            .await
            .map_err(|error| {
                error!(provider = PROVIDER, endpoint = path, error = %error, "request failed");
                let details = if error.is_timeout() {
                    format!("{path} timed out")
                } else {
                    format!("{path} request failed: {error}")
                };
                QaError::unavailable(PROVIDER, details)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(provider = PROVIDER, endpoint = path, %status, "API error");
            return Err(classify_failure(status, &body));
        }

        response.json::<T>().await.map_err(|error| {
            error!(provider = PROVIDER, endpoint = path, error = %error, "failed to parse response");
            QaError::unavailable(PROVIDER, format!("{path} returned an unreadable body: {error}"))
        })
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

fn classify_failure(status: StatusCode, body: &str) -> QaError {
    let detail = serde_json::from_str::<ErrorResponse>(body).ok();
    let message = detail
        .as_ref()
        .map(|response| response.error.message.clone())
        .unwrap_or_else(|| body.to_string());
    let code = detail.and_then(|response| response.error.code);

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return QaError::Authentication {
            provider: PROVIDER.to_string(),
            details: format!("{status}: {message}"),
        };
    }
    if code.as_deref() == Some("context_length_exceeded") {
        return QaError::ContextTooLarge(message);
    }
    QaError::unavailable(PROVIDER, format!("API returned {status}: {message}"))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: OpenAiClient,
}

impl OpenAiEmbedder {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.client.settings.embedding_dimensions
    }

    async fn embed(
        &self,
        credential: &ApiKey,
        texts: &[String],
    ) -> Result<Vec<EmbeddingVector>, QaError> {
        let settings = &self.client.settings;
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(settings.embedding_batch_size.max(1)) {
            debug!(
                provider = PROVIDER,
                batch_size = batch.len(),
                model = %settings.embedding_model,
                "embedding batch"
            );

            let request = EmbeddingRequest {
                model: &settings.embedding_model,
                input: batch,
            };
            let response: EmbeddingResponse =
                self.client.post_json("embeddings", credential, &request).await?;

            if response.data.len() != batch.len() {
                return Err(QaError::unavailable(
                    PROVIDER,
                    format!(
                        "embeddings returned {} vectors for {} inputs",
                        response.data.len(),
                        batch.len()
                    ),
                ));
            }

            let expected = self.dimensions();
            if let Some(item) = response.data.iter().find(|item| item.embedding.len() != expected) {
                error!(
                    provider = PROVIDER,
                    model = %settings.embedding_model,
                    expected,
                    actual = item.embedding.len(),
                    "embedding has unexpected dimensions"
                );
                return Err(QaError::DimensionMismatch {
                    expected,
                    actual: item.embedding.len(),
                });
            }

            let mut data = response.data;
            data.sort_by_key(|item| item.index.unwrap_or(usize::MAX));
            vectors.extend(data.into_iter().map(|item| item.embedding));
        }

        Ok(vectors)
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: OpenAiClient,
}

impl OpenAiGenerator {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn max_prompt_tokens(&self) -> usize {
        let settings = &self.client.settings;
        settings
            .context_window_tokens
            .saturating_sub(settings.max_tokens)
    }

    async fn generate(
        &self,
        credential: &ApiKey,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, QaError> {
        let settings = &self.client.settings;
        debug!(
            provider = PROVIDER,
            prompt_len = prompt.len(),
            model = %settings.completion_model,
            temperature,
            "requesting completion"
        );

        let request = CompletionRequest {
            model: &settings.completion_model,
            prompt,
            temperature,
            max_tokens: settings.max_tokens,
        };
        let response: CompletionResponse =
            self.client.post_json("completions", credential, &request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(QaError::unavailable(PROVIDER, "completion was empty"));
        }
        Ok(text)
    }
}
