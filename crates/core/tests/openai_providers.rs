use doc_qa_core::{
    ApiKey, CharacterNgramEmbedder, Document, Embedder, ErrorKind, Generator, OpenAiClient,
    OpenAiEmbedder, OpenAiGenerator, Pipeline, PipelineConfig, ProviderSettings, QaError, Stage,
};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers `/embeddings` with local trigram vectors, listed in reverse so the
/// client has to restore input order from `index`.
struct TrigramEmbeddings;

impl Respond for TrigramEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let embedder = CharacterNgramEmbedder { dimensions: 16 };
        let inputs: Vec<String> = body["input"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let data: Vec<Value> = inputs
            .iter()
            .enumerate()
            .rev()
            .map(|(index, text)| {
                json!({
                    "object": "embedding",
                    "index": index,
                    "embedding": embedder.embed_text(text),
                })
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({ "object": "list", "data": data }))
    }
}

fn settings(server: &MockServer) -> ProviderSettings {
    let mut settings = ProviderSettings::default()
        .with_api_base(&format!("{}/v1", server.uri()))
        .unwrap();
    settings.embedding_dimensions = 16;
    settings
}

fn credential() -> ApiKey {
    ApiKey::parse("sk-test", "sk-").unwrap()
}

fn completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "object": "text_completion",
        "choices": [{ "index": 0, "text": text, "finish_reason": "stop" }],
    }))
}

#[tokio::test]
async fn embeddings_come_back_in_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(TrigramEmbeddings)
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OpenAiEmbedder::new(OpenAiClient::new(settings(&server)).unwrap());
    let texts = vec!["first text".to_string(), "second text".to_string()];

    let vectors = embedder.embed(&credential(), &texts).await.unwrap();

    let local = CharacterNgramEmbedder { dimensions: 16 };
    assert_eq!(vectors, vec![local.embed_text("first text"), local.embed_text("second text")]);
}

#[tokio::test]
async fn large_batches_are_split_into_one_call_per_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(TrigramEmbeddings)
        .expect(3)
        .mount(&server)
        .await;

    let mut settings = settings(&server);
    settings.embedding_batch_size = 2;
    let embedder = OpenAiEmbedder::new(OpenAiClient::new(settings).unwrap());
    let texts: Vec<String> = (0..5).map(|item| format!("text number {item}")).collect();

    let vectors = embedder.embed(&credential(), &texts).await.unwrap();

    assert_eq!(vectors.len(), 5);
    assert_eq!(
        vectors[4],
        CharacterNgramEmbedder { dimensions: 16 }.embed_text("text number 4")
    );
}

#[tokio::test]
async fn empty_batch_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(TrigramEmbeddings)
        .expect(0)
        .mount(&server)
        .await;

    let embedder = OpenAiEmbedder::new(OpenAiClient::new(settings(&server)).unwrap());
    assert!(embedder.embed(&credential(), &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn vectors_of_the_wrong_size_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(TrigramEmbeddings)
        .mount(&server)
        .await;

    let mut settings = settings(&server);
    settings.embedding_dimensions = 8;
    let embedder = OpenAiEmbedder::new(OpenAiClient::new(settings).unwrap());
    let error = embedder
        .embed(&credential(), &["text".to_string()])
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Configuration);
    assert!(matches!(
        error,
        QaError::DimensionMismatch {
            expected: 8,
            actual: 16
        }
    ));
}

#[tokio::test]
async fn rejected_key_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "code": "invalid_api_key" }
        })))
        .mount(&server)
        .await;

    let embedder = OpenAiEmbedder::new(OpenAiClient::new(settings(&server)).unwrap());
    let error = embedder
        .embed(&credential(), &["text".to_string()])
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn server_errors_are_provider_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OpenAiEmbedder::new(OpenAiClient::new(settings(&server)).unwrap());
    let error = embedder
        .embed(&credential(), &["text".to_string()])
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ProviderUnavailable);
}

#[tokio::test]
async fn injected_timeout_surfaces_as_provider_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(completion("late").set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let mut settings = settings(&server);
    settings.timeout = Some(Duration::from_millis(100));
    let generator = OpenAiGenerator::new(OpenAiClient::new(settings).unwrap());

    let error = generator
        .generate(&credential(), "prompt", 0.3)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ProviderUnavailable);
    assert!(error.to_string().contains("timed out"));
}

#[tokio::test]
async fn completion_sends_model_temperature_and_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo-instruct",
            "prompt": "Question: why?",
            "temperature": 0.5,
            "max_tokens": 256,
        })))
        .respond_with(completion("  Because.\n"))
        .expect(1)
        .mount(&server)
        .await;

    let generator = OpenAiGenerator::new(OpenAiClient::new(settings(&server)).unwrap());
    let text = generator
        .generate(&credential(), "Question: why?", 0.5)
        .await
        .unwrap();

    assert_eq!(text, "Because.");
}

#[tokio::test]
async fn context_length_error_is_context_too_large() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "This model's maximum context length is 4097 tokens",
                "type": "invalid_request_error",
                "code": "context_length_exceeded"
            }
        })))
        .mount(&server)
        .await;

    let generator = OpenAiGenerator::new(OpenAiClient::new(settings(&server)).unwrap());
    let error = generator
        .generate(&credential(), "prompt", 0.3)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ContextTooLarge);
}

#[tokio::test]
async fn blank_completion_is_not_an_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(completion("   "))
        .mount(&server)
        .await;

    let generator = OpenAiGenerator::new(OpenAiClient::new(settings(&server)).unwrap());
    let error = generator
        .generate(&credential(), "prompt", 0.3)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ProviderUnavailable);
}

#[tokio::test]
async fn pipeline_answers_through_openai_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(TrigramEmbeddings)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(completion(" The sky is blue."))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = Pipeline::openai(settings(&server)).unwrap();
    let documents = vec![Document::new("colors.txt", "The sky is blue. The grass is green.")];
    let config = PipelineConfig {
        chunk_size: 1_000,
        chunk_overlap: 0,
        k: 1,
        ..PipelineConfig::default()
    };

    let answer = pipeline
        .run(&documents, "What color is the sky?", "sk-test", &config)
        .await
        .unwrap();

    assert_eq!(answer.text, "The sky is blue.");
    assert_eq!(answer.context.hits[0].chunk.text, "The sky is blue. The grass is green.");
}

#[tokio::test]
async fn pipeline_tags_provider_rejection_with_the_embedding_stage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let pipeline = Pipeline::openai(settings(&server)).unwrap();
    let failure = pipeline
        .run(
            &[Document::new("a.txt", "some text")],
            "question?",
            "sk-revoked",
            &PipelineConfig::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Authentication);
    assert_eq!(failure.stage, Stage::Embedding);
}
