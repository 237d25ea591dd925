use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::error;

use tutela_core::catalog;
use tutela_core::compose;
use tutela_core::db::Db;
use tutela_core::engine::Engine;
use tutela_core::error::DomainError;
use tutela_core::parties;
use tutela_core::types::PartyUpsert;

use crate::advisor::Advisor;
use crate::export;

// ── AppState ──────────────────────────────────────────────────────────────

pub struct AppState {
    pub db: Arc<Db>,
    pub engine: Arc<Engine>,
    pub advisor: Advisor,
    pub export_dir: String,
    /// Cases with a chain or pipeline run in flight.
    in_flight: Mutex<HashSet<String>>,
}

impl AppState {
    pub fn new(db: Arc<Db>, engine: Arc<Engine>, advisor: Advisor, export_dir: String) -> Self {
        Self {
            db,
            engine,
            advisor,
            export_dir,
            in_flight: Mutex::new(HashSet::new()),
        }
    }
}

/// Guard that marks a case as busy for the duration of a chain/pipeline run.
struct CaseLease {
    state: Arc<AppState>,
    case_id: String,
}

impl CaseLease {
    fn acquire(state: &Arc<AppState>, case_id: &str) -> Result<Self, ApiError> {
        let mut in_flight = state.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(case_id.to_string()) {
            return Err(DomainError::CaseBusy(case_id.to_string()).into());
        }
        Ok(Self {
            state: Arc::clone(state),
            case_id: case_id.to_string(),
        })
    }
}

impl Drop for CaseLease {
    fn drop(&mut self) {
        let mut in_flight = self
            .state
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.case_id);
    }
}

// ── Error mapping ─────────────────────────────────────────────────────────

pub struct ApiError(DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError(DomainError::Internal(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = match kind {
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            "bad_request" | "validation" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("internal error: {:#}", self.0);
        }
        let body = json!({ "error": kind, "detail": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ── Request body types ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateCaseBody {
    title: Option<String>,
}

#[derive(Deserialize)]
struct SaveSectionBody {
    text: String,
}

#[derive(Deserialize)]
struct ApproveBody {
    source: Option<String>,
}

#[derive(Deserialize)]
struct AdvisorStartBody {
    system: Option<String>,
}

#[derive(Deserialize)]
struct AdvisorAnswerBody {
    session_id: String,
    #[serde(alias = "question")]
    message: String,
}

// ── Router ────────────────────────────────────────────────────────────────

pub fn build_router(state: Arc<AppState>, static_dir: &str) -> Router {
    let export_dir = state.export_dir.clone();
    Router::new()
        // Health
        .route("/api/health", get(health))
        // Cases
        .route("/api/case", post(create_case))
        .route("/api/cases", get(list_cases))
        .route("/api/case/:id", get(get_case))
        // Parties
        .route("/api/case/:id/party", post(upsert_party))
        // Sections
        .route("/api/case/:id/section/:name", post(save_section))
        .route("/api/case/:id/section/:name/improve", post(improve_section))
        .route("/api/case/:id/section/:name/approve", post(approve_section))
        .route("/api/case/:id/ensure/:name", get(ensure_section))
        .route("/api/case/:id/intro/refresh", post(refresh_intro))
        // Rights
        .route("/api/case/:id/rights", get(list_rights))
        .route("/api/case/:id/rights/detect", post(detect_rights))
        .route("/api/case/:id/rights/:right_name/argue", post(argue_right))
        // Generation
        .route("/api/case/:id/chain/autogen", post(chain_autogen))
        .route("/api/case/:id/run-pipeline", post(run_pipeline))
        // Composition and export
        .route("/api/case/:id/compose-final", get(compose_final))
        .route("/api/case/:id/compose-structured", get(compose_structured))
        .route("/api/case/:id/export-docx", post(export_docx))
        .route("/api/export/docx/:id", get(export_docx_shortcut))
        .route("/api/export/json/:id", get(export_json_shortcut))
        // Advisor
        .route("/api/advisor/start", post(advisor_start))
        .route("/api/advisor/answer", post(advisor_answer))
        .route("/api/advisor/chat", post(advisor_answer))
        // Files
        .nest_service("/exports", ServeDir::new(export_dir))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn create_case(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCaseBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let title = body
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Acción de Tutela".to_string());
    let case = state.db.create_case(&title)?;
    Ok((StatusCode::CREATED, Json(json!({ "case_id": case.id }))))
}

async fn list_cases(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let cases = state.db.list_cases()?;
    Ok(Json(json!(cases)))
}

async fn get_case(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let bundle = state.db.case_bundle(&id)?;
    Ok(Json(json!(bundle)))
}

async fn upsert_party(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PartyUpsert>,
) -> ApiResult<Json<Value>> {
    state.db.get_case(&id)?;
    let party = state.db.upsert_party(&id, &body)?;
    parties::refresh_after_party_change(&state.db, &id)?;
    state.db.touch_case(&id)?;
    Ok(Json(json!(party)))
}

async fn save_section(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
    Json(body): Json<SaveSectionBody>,
) -> ApiResult<Json<Value>> {
    let section = state
        .engine
        .save_section(&state.db, &id, &name, &body.text)
        .await?;
    Ok(Json(json!(section)))
}

async fn improve_section(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let section = state.engine.improve_section(&state.db, &id, &name).await?;
    state.db.touch_case(&id)?;
    Ok(Json(json!(section)))
}

async fn approve_section(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
    Json(body): Json<ApproveBody>,
) -> ApiResult<Json<Value>> {
    let from_ai = match body.source.as_deref() {
        None | Some("ai") => true,
        Some("user") => false,
        Some(other) => {
            return Err(
                DomainError::BadRequest(format!("source inválido: {other}")).into(),
            )
        }
    };
    let section = state.engine.approve(&state.db, &id, &name, from_ai)?;
    state.db.touch_case(&id)?;
    Ok(Json(json!(section)))
}

/// Generate-if-missing for the chained sections only. Anything already
/// resolved is returned as-is.
async fn ensure_section(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    const ENSURABLE: &[&str] = &[
        catalog::DERECHOS_VULNERADOS,
        catalog::FUNDAMENTOS_JURIDICOS,
        catalog::FUNDAMENTOS_DE_DERECHO,
        catalog::REF,
    ];
    if !ENSURABLE.contains(&name.as_str()) {
        return Err(DomainError::BadRequest(format!(
            "La sección {name} no admite generación bajo demanda"
        ))
        .into());
    }
    let existing = state.db.get_section(&id, &name)?;
    if !existing.resolved_text().trim().is_empty() {
        return Ok(Json(json!(existing)));
    }
    let section = state.engine.improve_section(&state.db, &id, &name).await?;
    state.db.touch_case(&id)?;
    Ok(Json(json!(section)))
}

async fn refresh_intro(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.db.get_case(&id)?;
    parties::refresh_intro(&state.db, &id).map_err(DomainError::Internal)?;
    let section = state.db.get_section(&id, catalog::INTRO)?;
    Ok(Json(json!(section)))
}

async fn list_rights(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.db.get_case(&id)?;
    let rights = state.db.list_rights(&id)?;
    Ok(Json(json!(rights)))
}

async fn detect_rights(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let rights = state.engine.detect_and_store_rights(&state.db, &id)?;
    Ok(Json(json!({ "rights": rights })))
}

async fn argue_right(
    State(state): State<Arc<AppState>>,
    Path((id, right_name)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let right = state.engine.argue_right(&state.db, &id, &right_name).await?;
    Ok(Json(json!(right)))
}

async fn chain_autogen(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let _lease = CaseLease::acquire(&state, &id)?;
    let generated = state.engine.chain(&state.db, &id).await?;
    Ok(Json(json!({ "ok": true, "generated": generated })))
}

async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let _lease = CaseLease::acquire(&state, &id)?;
    let ran = state.engine.run_pipeline(&state.db, &id).await?;
    Ok(Json(json!({ "ran": ran })))
}

async fn compose_final(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.db.get_case(&id)?;
    let full_text = compose::compose_full_text(&state.db, &id)?;
    Ok(Json(json!({ "full_text": full_text })))
}

async fn compose_structured(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.db.get_case(&id)?;
    let doc = compose::compose_structured(&state.db, &id)?;
    Ok(Json(json!(doc)))
}

async fn export_docx(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let urls = export::export_case(&state.db, &id, &state.export_dir)
        .map_err(DomainError::Internal)?;
    Ok(Json(json!(urls)))
}

async fn export_docx_shortcut(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Redirect> {
    let urls = export::export_case(&state.db, &id, &state.export_dir)
        .map_err(DomainError::Internal)?;
    Ok(Redirect::to(&urls.docx_url))
}

async fn export_json_shortcut(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Redirect> {
    let urls = export::export_case(&state.db, &id, &state.export_dir)
        .map_err(DomainError::Internal)?;
    Ok(Redirect::to(&urls.json_url))
}

async fn advisor_start(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AdvisorStartBody>,
) -> ApiResult<Json<Value>> {
    let (session_id, greeting) = state.advisor.start(body.system);
    Ok(Json(json!({ "session_id": session_id, "message": greeting })))
}

async fn advisor_answer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AdvisorAnswerBody>,
) -> ApiResult<Json<Value>> {
    let answer = state.advisor.answer(&body.session_id, &body.message).await?;
    Ok(Json(json!(answer)))
}
