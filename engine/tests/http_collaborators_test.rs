use sdk::{Action, EngineError, Observation, SurfaceDriver, SurfaceError};
use serde_json::json;
use std::sync::Arc;
use wayfind_engine::conductor::{
    ExecutionTrace, GoalMetrics, OutcomeJudge, Planner, StepInfo, StepResult, Summarizer,
};
use wayfind_engine::judge::LlmJudge;
use wayfind_engine::llm::{LLMError, LLMProvider, Message, OllamaProvider, OpenAIProvider};
use wayfind_engine::planner::LlmPlanner;
use wayfind_engine::summarizer::LlmSummarizer;
use wayfind_engine::surface::HttpSurfaceDriver;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ollama_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "llama3.1:8b",
        "message": {"role": "assistant", "content": content},
        "done": true
    }))
}

fn article() -> Observation {
    Observation {
        url: "https://en.wikipedia.org/wiki/Ada_Lovelace".to_string(),
        title: "Ada Lovelace - Wikipedia".to_string(),
        visible_text: "Augusta Ada King, Countess of Lovelace was an English mathematician.".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_http_surface_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/execute"))
        .and(body_json(json!({"kind": "openUrl", "args": {"url": "https://a.test"}})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/observe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://a.test/",
            "title": "A",
            "visibleText": "hello",
            "clickableLabels": ["More"],
            "inputHints": []
        })))
        .mount(&server)
        .await;

    let driver = HttpSurfaceDriver::new(format!("{}/", server.uri()));
    driver.execute(&Action::open_url("https://a.test")).await.unwrap();
    let observation = driver.observe().await.unwrap();

    assert_eq!(observation.title, "A");
    assert_eq!(observation.visible_text, "hello");
    assert_eq!(observation.clickable_labels, vec!["More".to_string()]);
}

#[tokio::test]
async fn test_http_surface_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/execute"))
        .respond_with(ResponseTemplate::new(422).set_body_string("no element with text 'Go'"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/observe"))
        .respond_with(ResponseTemplate::new(503).set_body_string("browser restarting"))
        .mount(&server)
        .await;

    let driver = HttpSurfaceDriver::new(server.uri());

    let err = driver.execute(&Action::click_text("Go")).await.unwrap_err();
    match err {
        SurfaceError::Action(message) => assert!(message.contains("no element")),
        other => panic!("expected action error, got {:?}", other),
    }

    let err = driver.observe().await.unwrap_err();
    assert_eq!(err, SurfaceError::Unavailable("browser restarting".to_string()));
}

#[tokio::test]
async fn test_http_surface_rejects_malformed_observation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/observe"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = HttpSurfaceDriver::new(server.uri()).observe().await.unwrap_err();
    assert!(matches!(err, SurfaceError::Observation(_)));
}

#[tokio::test]
async fn test_ollama_provider_posts_chat() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3.1:8b", "stream": false})))
        .respond_with(ollama_reply("hello"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri(), "llama3.1:8b");
    let reply = provider.generate(&[Message::user("hi")]).await.unwrap();
    assert_eq!(reply, "hello");
}

#[tokio::test]
async fn test_openai_provider_auth_and_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "ok"}}]
        })))
        .mount(&server)
        .await;

    let provider = OpenAIProvider::new(server.uri(), "gpt-4o-mini", Some("sk-test".to_string()));
    assert_eq!(provider.generate(&[Message::user("hi")]).await.unwrap(), "ok");

    let limited = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&limited)
        .await;
    let provider = OpenAIProvider::new(limited.uri(), "gpt-4o-mini", Some("sk-test".to_string()));
    let err = provider.generate(&[Message::user("hi")]).await.unwrap_err();
    assert!(matches!(err, LLMError::RateLimitExceeded));
}

#[tokio::test]
async fn test_llm_planner_parses_fenced_action() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ollama_reply(
            "I'll search for her.\n```json\n{\"action\": \"fillInput\", \"args\": {\"hint\": \"Search\", \"value\": \"Ada Lovelace\"}}\n```",
        ))
        .mount(&server)
        .await;

    let planner = LlmPlanner::new(Arc::new(OllamaProvider::new(server.uri(), "llama3.1:8b")));
    let history = vec![StepResult::new(article(), Some(Action::accept_cookies()), StepInfo::default())];
    let action = planner
        .next_action("find Ada Lovelace", &article(), &history)
        .await
        .unwrap();

    assert_eq!(action, Action::fill_input("Search", "Ada Lovelace"));
}

#[tokio::test]
async fn test_llm_planner_reports_provider_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let planner = LlmPlanner::new(Arc::new(OllamaProvider::new(server.uri(), "llama3.1:8b")));
    let err = planner
        .next_action("find Ada Lovelace", &Observation::unknown(), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Planner(_)));
}

#[tokio::test]
async fn test_llm_judge_scores_trace() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content":
                "{\"overall_success\": true, \"global_score\": 0.85, \"issues\": [], \"strengths\": [\"direct\"], \"recommendations\": []}"
            }}]
        })))
        .mount(&server)
        .await;

    let judge = LlmJudge::new(Arc::new(OpenAIProvider::new(
        server.uri(),
        "gpt-4o-mini",
        Some("sk-test".to_string()),
    )));
    let mut trace = ExecutionTrace::new();
    trace.push(StepResult::new(article(), None, StepInfo::default()));

    let evaluation = judge
        .evaluate("look up Ada Lovelace in Wikipedia", &trace, &GoalMetrics::default())
        .await
        .unwrap();
    assert!(evaluation.overall_success);
    assert_eq!(evaluation.global_score, Some(0.85));
    assert_eq!(evaluation.strengths, vec!["direct".to_string()]);
}

#[tokio::test]
async fn test_llm_summarizer_cites_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ollama_reply("  Ada Lovelace was an English mathematician.\n"))
        .mount(&server)
        .await;

    let summarizer = LlmSummarizer::new(Arc::new(OllamaProvider::new(server.uri(), "llama3.1:8b")));
    let summary = summarizer
        .summarize("who was Ada Lovelace", &article())
        .await
        .unwrap();

    assert_eq!(summary.answer, "Ada Lovelace was an English mathematician.");
    assert_eq!(summary.sources.len(), 1);
    assert_eq!(summary.sources[0].url, "https://en.wikipedia.org/wiki/Ada_Lovelace");
}
