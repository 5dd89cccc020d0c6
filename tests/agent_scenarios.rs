use std::time::Duration;

use mathscene::Provider;
use mathscene::core::config::ResolvedConfig;
use mathscene::core::validate::RepairPolicy;
use mathscene::core::{Agent, AgentError, RepresentationMethod, Scenario};
use mathscene::inference::{Effort, ProviderError};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, method, path},
};

const GENERATE: &str = "/models/test-model:generateContent";

fn config_for(server: &MockServer, timeout: Duration) -> ResolvedConfig {
    ResolvedConfig {
        provider: Provider::Gemini,
        model_name: "test-model".to_string(),
        effort: Effort::None,
        max_output_tokens: 2048,
        request_timeout: timeout,
        max_concurrent_requests: 4,
        repair_policy: RepairPolicy::Strict,
        api_key: "test-key".to_string(),
        base_url: Some(server.uri()),
    }
}

fn agent_for(server: &MockServer, timeout: Duration) -> Agent {
    let config = config_for(server, timeout);
    Agent::from_config(&config, mathscene::connect(&config), None)
}

fn function_call(name: &str, question: &str) -> Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{"functionCall": {"name": name, "args": {"question": question}}}]
            },
            "finishReason": "STOP"
        }]
    })
}

fn text(body: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": body}]},
            "finishReason": "STOP"
        }]
    })
}

/// Routing calls carry function declarations; builder calls ask for JSON.
async fn mount_pipeline(server: &MockServer, route: Value, build: Value) {
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .and(body_string_contains("functionDeclarations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(route))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .and(body_string_contains("responseMimeType"))
        .respond_with(ResponseTemplate::new(200).set_body_json(build))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_apples_become_addition() {
    let server = MockServer::start().await;
    let question = "I have 1 apple and get 2 more apples";
    mount_pipeline(
        &server,
        function_call("addition", question),
        text(
            r#"{"method": "addition", "scenario": "Youre packing a picnic basket with apples.", "solution": "1 apple + 2 apples = 3 apples.", "origins": ["1 Apple", "2 Apples"], "target": "Basket"}"#,
        ),
    )
    .await;

    let answer = agent_for(&server, Duration::from_secs(5))
        .answer(question)
        .await
        .unwrap();

    assert_eq!(answer.method, RepresentationMethod::Addition);
    let Scenario::Addition(addition) = answer.scenario else {
        panic!("expected addition");
    };
    assert_eq!(addition.quantities(), vec![1, 2]);
    assert_eq!(addition.total(), Some(3));
    assert_eq!(addition.target, "Basket");
}

#[tokio::test]
async fn test_berries_become_deletion() {
    let server = MockServer::start().await;
    let question = "I had 15 berries and ate 5";
    mount_pipeline(
        &server,
        function_call("deletion", question),
        text(
            r#"{"method": "deletion", "scenario": "You collect 15 berries and eat 5 of them.", "solution": "15 - 5 = 10 berries.", "asset": "berries", "originalCount": 15, "solutionCount": 10}"#,
        ),
    )
    .await;

    let answer = agent_for(&server, Duration::from_secs(5))
        .answer(question)
        .await
        .unwrap();

    let Scenario::Deletion(deletion) = answer.scenario else {
        panic!("expected deletion");
    };
    assert_eq!(deletion.original_count, 15);
    assert_eq!(deletion.solution_count, 10);
    assert_eq!(deletion.removed(), 5);
}

#[tokio::test]
async fn test_cookies_become_division() {
    let server = MockServer::start().await;
    let question = "12 cookies shared among 4 children";
    mount_pipeline(
        &server,
        function_call("division", question),
        text(
            r#"{"method": "division", "scenario": "You have 12 cookies to share equally among 4 children.", "solution": "12 / 4 = 3 cookies each.", "origin": "cookie", "originCount": 12, "group": "child", "groupCount": 4}"#,
        ),
    )
    .await;

    let answer = agent_for(&server, Duration::from_secs(5))
        .answer(question)
        .await
        .unwrap();

    let Scenario::Division(division) = &answer.scenario else {
        panic!("expected division");
    };
    assert_eq!((division.origin_count, division.group_count), (12, 4));
    assert_eq!(division.share(), 3);

    let printed = serde_json::to_value(&answer.scenario).unwrap();
    assert_eq!(printed["method"], "division");
    assert_eq!(printed["originCount"], 12);
    assert_eq!(printed["groupCount"], 4);
}

#[tokio::test]
async fn test_truncated_builder_output_is_validation_error() {
    let server = MockServer::start().await;
    let question = "I had 15 berries and ate 5";
    mount_pipeline(
        &server,
        function_call("deletion", question),
        text(r#"{"method": "deletion", "scenario": "You collect 15 berries", "originalCou"#),
    )
    .await;

    let result = agent_for(&server, Duration::from_secs(5))
        .answer(question)
        .await;

    let Err(err) = result else {
        panic!("truncated output must not produce a scenario");
    };
    assert_eq!(err.kind(), "validation");
    let report = serde_json::to_value(err.report(question)).unwrap();
    assert_eq!(report["error"]["kind"], "validation");
    assert_eq!(report["error"]["question"], question);
}

#[tokio::test]
async fn test_unknown_method_from_router() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(function_call("multiplication", "3 x 4")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = agent_for(&server, Duration::from_secs(5))
        .answer("3 x 4")
        .await;
    assert!(matches!(result, Err(AgentError::UnsupportedMethod(ref name)) if name == "multiplication"));
}

#[tokio::test]
async fn test_slow_upstream_times_out_within_bound() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(function_call("division", "12 / 4"))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let result = agent_for(&server, Duration::from_secs(1))
        .answer("12 / 4")
        .await;

    assert!(matches!(result, Err(AgentError::Upstream(ProviderError::Timeout(_)))));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_fixed_method_makes_one_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .respond_with(ResponseTemplate::new(200).set_body_json(text(
            r#"{"method": "deletion", "scenario": "You have 7 balloons and 3 pop.", "solution": "7 - 3 = 4", "asset": "balloons", "originalCount": 7, "solutionCount": 4}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server, Duration::from_secs(5));
    let agent = Agent::from_config(
        &config,
        mathscene::connect(&config),
        Some(RepresentationMethod::Deletion),
    );
    let answer = agent.answer("7 - 3").await.unwrap();
    assert_eq!(answer.method, RepresentationMethod::Deletion);
}
