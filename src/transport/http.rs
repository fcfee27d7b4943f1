//! HTTP task-submission API
//!
//! Routes live under `/api/v1/multi-agent` and answer with a
//! `{code, message, data}` envelope.

use crate::agent::{AgentInfo, RegistryStatistics};
use crate::config::Config;
use crate::core::{
    AgentOutput, AgentType, CoordinationMode, CoordinationState, StepRecord, Subtask, Task,
};
use crate::orchestration::Coordinator;
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub const API_PREFIX: &str = "/api/v1/multi-agent";

/// Shared application state
pub struct AppState {
    coordinator: Coordinator,
    config: Config,
    provider: String,
}

impl AppState {
    pub fn new(coordinator: Coordinator, config: Config) -> Self {
        let provider = config.llm.provider.clone();
        Self {
            coordinator,
            config,
            provider,
        }
    }
}

/// Response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        code: i32::from(status.as_u16()),
        message: message.into(),
        data: None,
    };
    (status, Json(body)).into_response()
}

/// Request to run one task
#[derive(Debug, Deserialize)]
struct TaskRequest {
    description: String,
    #[serde(rename = "type", default)]
    task_type: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    requirements: Vec<String>,
    #[serde(default = "default_mode")]
    coordination_mode: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    max_iterations: Option<u32>,
    #[serde(default)]
    max_feedback_rounds: Option<u32>,
    #[serde(default)]
    task_plan: Vec<Subtask>,
    #[serde(default)]
    pipeline: Option<Vec<AgentType>>,
}

fn default_mode() -> String {
    "sequential".to_string()
}

/// Terminal state of a run, as returned to HTTP clients
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResult {
    pub run_id: String,
    pub task: Task,
    pub coordination_mode: CoordinationMode,
    pub agents_involved: Vec<String>,
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_plan: Vec<Subtask>,
    pub feedback_rounds: u32,
    pub final_result: Option<AgentOutput>,
    pub is_finished: bool,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<CoordinationState> for TaskResult {
    fn from(state: CoordinationState) -> Self {
        Self {
            run_id: state.run_id,
            task: state.task,
            coordination_mode: state.mode,
            agents_involved: state.agents_involved,
            steps: state.steps,
            task_plan: state.task_plan,
            feedback_rounds: state.feedback_rounds,
            final_result: state.final_result,
            is_finished: state.is_finished,
            error: state.error,
            started_at: state.started_at,
            finished_at: state.finished_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AgentList {
    pub agents: Vec<AgentInfo>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider: String,
    pub agents: usize,
}

/// Build the router. Split from [`run_http_server`] so tests can serve it on
/// an ephemeral port.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/tasks", post(create_task))
        .route("/agents", get(list_agents))
        .route("/agents/:agent_id", get(get_agent))
        .route("/statistics", get(get_statistics))
        .route("/health", get(health_check));

    Router::new()
        .nest(API_PREFIX, api)
        .route("/health", get(health_check))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve on an already bound listener
pub async fn serve(listener: tokio::net::TcpListener, state: Arc<AppState>) -> Result<()> {
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

pub async fn run_http_server(
    host: &str,
    port: u16,
    coordinator: Coordinator,
    config: Config,
) -> Result<()> {
    let state = Arc::new(AppState::new(coordinator, config));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, state).await
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaskRequest>,
) -> Response {
    if req.description.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "description must not be empty");
    }

    let task = Task {
        description: req.description,
        task_type: req.task_type,
        context: req.context,
        requirements: req.requirements,
        session_id: req.session_id,
    };

    let mut options = state
        .config
        .run_options(req.max_iterations, req.max_feedback_rounds)
        .with_task_plan(req.task_plan);
    if let Some(pipeline) = req.pipeline {
        options = options.with_pipeline(pipeline);
    }

    match state
        .coordinator
        .run(task, &req.coordination_mode, options)
        .await
    {
        Ok(run) => {
            let failed = run.error.is_some();
            let mut body = ApiResponse::success(TaskResult::from(run));
            if failed {
                body.code = 1;
                body.message = "failed".to_string();
            }
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            tracing::error!("Task rejected: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn list_agents(State(state): State<Arc<AppState>>) -> Json<ApiResponse<AgentList>> {
    let agents = state.coordinator.registry().list();
    let total = agents.len();
    Json(ApiResponse::success(AgentList { agents, total }))
}

async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Response {
    match state.coordinator.registry().info(&agent_id) {
        Ok(info) => Json(ApiResponse::success(info)).into_response(),
        Err(e) => error_response(StatusCode::NOT_FOUND, e.to_string()),
    }
}

async fn get_statistics(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<RegistryStatistics>> {
    Json(ApiResponse::success(
        state.coordinator.registry().statistics(),
    ))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider: state.provider.clone(),
        agents: state.coordinator.registry().len(),
    })
}
