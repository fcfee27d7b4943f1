//! HTTP API tests against a server on an ephemeral port

use crewline::agent::AgentRegistry;
use crewline::llm::SimLlm;
use crewline::transport::http::{self, AppState};
use crewline::{Config, Coordinator};
use serde_json::{json, Value};
use std::sync::Arc;

async fn spawn_server() -> String {
    let mut config = Config::default();
    config.llm.provider = "sim".to_string();
    let registry = AgentRegistry::with_default_roster(Arc::new(SimLlm::new()));
    let coordinator = Coordinator::new(Arc::new(registry)).with_pipelines(config.pipelines());
    let state = Arc::new(AppState::new(coordinator, config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        http::serve(listener, state).await.unwrap();
    });
    format!("http://{}{}", addr, http::API_PREFIX)
}

async fn post_task(base: &str, body: Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("{}/tasks", base))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_feedback_task_succeeds() {
    let base = spawn_server().await;
    let (status, body) = post_task(
        &base,
        json!({ "description": "write release notes", "coordination_mode": "feedback" }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["code"], 0);
    let data = &body["data"];
    assert_eq!(data["coordination_mode"], "feedback");
    assert_eq!(data["is_finished"], true);
    assert!(data["error"].is_null());
    assert_eq!(data["agents_involved"].as_array().unwrap().len(), 4);
    assert_eq!(data["steps"].as_array().unwrap().len(), 4);
    assert!(data["steps"][0]["duration_ms"].is_u64());
}

#[tokio::test]
async fn test_failed_run_uses_code_one() {
    let base = spawn_server().await;
    let (status, body) = post_task(
        &base,
        json!({
            "description": "write release notes",
            "coordination_mode": "feedback",
            "max_feedback_rounds": 1
        }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["code"], 1);
    assert_eq!(body["message"], "failed");
    assert_eq!(
        body["data"]["error"],
        "max feedback rounds exceeded without passing review"
    );
    assert!(body["data"]["final_result"].is_null());
}

#[tokio::test]
async fn test_parallel_task_plan() {
    let base = spawn_server().await;
    let (_, body) = post_task(
        &base,
        json!({
            "description": "market scan",
            "type": "research",
            "coordination_mode": "parallel",
            "task_plan": [
                { "description": "competitors", "agent_type": "researcher" },
                { "description": "pricing", "agent_type": "analyst" }
            ]
        }),
    )
    .await;

    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["task"]["type"], "research");
    let merged = &body["data"]["final_result"];
    assert_eq!(merged["kind"], "aggregate");
    assert_eq!(merged["payload"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_mode_is_bad_request() {
    let base = spawn_server().await;
    let (status, body) = post_task(
        &base,
        json!({ "description": "x", "coordination_mode": "swarm" }),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["code"], 400);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Unknown coordination mode"));
}

#[tokio::test]
async fn test_empty_description_is_bad_request() {
    let base = spawn_server().await;
    let (status, _) = post_task(&base, json!({ "description": "   " })).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_agents_and_statistics() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let agents: Value = client
        .get(format!("{}/agents", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(agents["data"]["total"], 5);

    let one = client
        .get(format!("{}/agents/reviewer_001", base))
        .send()
        .await
        .unwrap();
    assert_eq!(one.status().as_u16(), 200);
    let one: Value = one.json().await.unwrap();
    assert_eq!(one["data"]["agent_type"], "reviewer");

    let missing = client
        .get(format!("{}/agents/nobody", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
    let missing: Value = missing.json().await.unwrap();
    assert_eq!(missing["code"], 404);

    let stats: Value = client
        .get(format!("{}/statistics", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["data"]["total_agents"], 5);
    assert_eq!(stats["data"]["agents_by_type"]["executor"], 1);
}

#[tokio::test]
async fn test_health() {
    let base = spawn_server().await;
    let health: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["provider"], "sim");
    assert_eq!(health["agents"], 5);
}
