//! Tests for the HTTP routes
//!
//! These drive the router in-process with fake classifiers and extractors,
//! so no model file or network access is needed.

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::analysis::test_support::{FailingClassifier, KeywordClassifier, StaticExtractor};
    use crate::analysis::EmotionAnalyzer;
    use crate::emotion::EmotionClassifier;
    use crate::llm_client::{CharacterExtractor, LLMClient, LlmConfig};
    use crate::server::{build_router, AppState};

    const BODY_LIMIT: usize = 1024 * 1024;

    fn router_with<C, E>(classifier: C, extractor: E) -> Router
    where
        C: EmotionClassifier + 'static,
        E: CharacterExtractor + 'static,
    {
        build_router(
            AppState::new(EmotionAnalyzer::new(classifier), extractor),
            BODY_LIMIT,
        )
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_analyze_returns_sentences_in_order() {
        let router = router_with(KeywordClassifier, StaticExtractor::ok(vec![]));
        let (status, body) = send(
            router,
            post_json(
                "/analyze",
                json!({"text": "I am so happy. The night was long.  She felt scared!"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {"sentence": "I am so happy.", "emotions": ["joy"]},
                {"sentence": "The night was long.", "emotions": []},
                {"sentence": "She felt scared!", "emotions": ["fear"]}
            ])
        );
    }

    #[tokio::test]
    async fn test_analyze_missing_text_is_empty_list() {
        let router = router_with(KeywordClassifier, StaticExtractor::ok(vec![]));
        let (status, body) = send(router, post_json("/analyze", json!({}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_analyze_classifier_failure_is_generic_500() {
        let router = router_with(FailingClassifier, StaticExtractor::ok(vec![]));
        let (status, body) =
            send(router, post_json("/analyze", json!({"text": "Anything at all."}))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "An internal error occurred."}));
    }

    #[tokio::test]
    async fn test_analyze_rejects_malformed_json() {
        let router = router_with(KeywordClassifier, StaticExtractor::ok(vec![]));
        let request = Request::builder()
            .method(Method::POST)
            .uri("/analyze")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"text\": "))
            .unwrap();
        let (status, body) = send(router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_analyze_requires_json_content_type() {
        let router = router_with(KeywordClassifier, StaticExtractor::ok(vec![]));
        let request = Request::builder()
            .method(Method::POST)
            .uri("/analyze")
            .body(Body::from("text=hello"))
            .unwrap();
        let (status, body) = send(router, request).await;

        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_analyze_characters_blank_text() {
        let extractor = Arc::new(StaticExtractor::ok(vec![("Alice", vec!["Alice smiled."])]));
        let state = AppState {
            analyzer: Arc::new(EmotionAnalyzer::new(KeywordClassifier)),
            extractor: extractor.clone(),
        };
        let router = build_router(state, BODY_LIMIT);

        let (status, body) =
            send(router, post_json("/analyze_characters", json!({"text": "  \n"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
        assert_eq!(extractor.calls(), 0);
    }

    #[tokio::test]
    async fn test_analyze_characters_builds_journeys() {
        let extractor = StaticExtractor::ok(vec![
            ("Bob", vec!["Bob was furious.", "Bob sat down."]),
            ("Alice", vec!["Alice smiled."]),
            ("Nobody", vec!["   "]),
        ]);
        let router = router_with(KeywordClassifier, extractor);

        let (status, body) = send(
            router,
            post_json(
                "/analyze_characters",
                json!({"text": "Alice smiled. Bob was furious. Bob sat down."}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "Alice": [{"sentence": "Alice smiled.", "emotions": ["joy"]}],
                "Bob": [
                    {"sentence": "Bob was furious.", "emotions": ["anger"]},
                    {"sentence": "Bob sat down.", "emotions": []}
                ]
            })
        );
        let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["Alice", "Bob"]);
    }

    #[tokio::test]
    async fn test_analyze_characters_llm_failure_includes_message() {
        let router = router_with(
            KeywordClassifier,
            StaticExtractor::failing("LLM did not return a valid JSON object."),
        );
        let (status, body) = send(
            router,
            post_json("/analyze_characters", json!({"text": "Alice smiled."})),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"error": "An internal error occurred: LLM did not return a valid JSON object."})
        );
    }

    #[tokio::test]
    async fn test_analyze_characters_without_api_key() {
        let client = LLMClient::new(&LlmConfig::default()).unwrap();
        let router = router_with(KeywordClassifier, client);
        let (status, body) = send(
            router,
            post_json("/analyze_characters", json!({"text": "Alice smiled."})),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"error": "An internal error occurred: OPENROUTER_API_KEY not found in environment"})
        );
    }

    #[tokio::test]
    async fn test_health() {
        let client = LLMClient::new(&LlmConfig::default()).unwrap();
        let router = router_with(KeywordClassifier, client);
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
        assert_eq!(body["classifier_ready"], true);
        assert_eq!(body["llm_configured"], false);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let router = router_with(KeywordClassifier, StaticExtractor::ok(vec![]));
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/analyze")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    fn small_limit_router() -> Router {
        build_router(
            AppState::new(
                EmotionAnalyzer::new(KeywordClassifier),
                StaticExtractor::ok(vec![]),
            ),
            64,
        )
    }

    #[tokio::test]
    async fn test_body_limit() {
        let text = "word ".repeat(100);
        let (status, body) = send(
            small_limit_router(),
            post_json("/analyze", json!({ "text": text })),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_body_limit_with_content_length() {
        let payload = json!({ "text": "word ".repeat(100) }).to_string();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/analyze")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, payload.len())
            .body(Body::from(payload))
            .unwrap();
        let response = small_limit_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].is_string());
    }
}
