use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;
use uuid::Uuid;

use triage_db::models::now;
use triage_types::api::{AddCommentRequest, AssignRequest, CreateReportRequest, UpdateStatusRequest};
use triage_types::events::ReportEvent;
use triage_types::models::{Comment, Report, ReportStatus};

use crate::error::{ApiError, require};
use crate::extract::ApiJson;
use crate::notify::notify;
use crate::state::AppState;

const REPORT_NOT_FOUND: &str = "report not found";

/// GET /reports — newest first.
pub async fn list_reports(State(state): State<AppState>) -> Result<Json<Vec<Report>>, ApiError> {
    let reports = state.db(|db| db.list_reports()).await?;
    Ok(Json(reports))
}

/// GET /reports/{id}
pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<Json<Report>, ApiError> {
    state
        .db(move |db| db.get_report(&report_id))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(REPORT_NOT_FOUND))
}

/// POST /reports — store a new report and alert the developers.
pub async fn create_report(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateReportRequest>,
) -> Result<(StatusCode, Json<Report>), ApiError> {
    require(&[("app", req.app.as_str())])?;

    let created_at = now();
    let report = Report {
        id: Uuid::new_v4().to_string(),
        reporter_id: req.reporter_id,
        reporter_name: req.reporter_name,
        app: req.app,
        page: req.page,
        url: req.url,
        description: req.description,
        screenshots: req.screenshots,
        severity: req.severity,
        status: ReportStatus::Open,
        assigned_to_id: None,
        assigned_to_name: None,
        created_at,
        updated_at: created_at,
        comments: vec![],
    };

    let stored = report.clone();
    state.db(move |db| db.insert_report(&stored)).await?;

    info!("Report {} submitted for {} ({})", report.id, report.app, report.severity);
    notify(&state, ReportEvent::Created, &report).await;

    Ok((StatusCode::CREATED, Json(report)))
}

/// PUT /reports/{id}/status — tells the reporter.
pub async fn update_status(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<Json<Report>, ApiError> {
    let status = req.status;
    let report = state
        .db(move |db| db.update_report_status(&report_id, status, now()))
        .await?
        .ok_or(ApiError::NotFound(REPORT_NOT_FOUND))?;

    info!("Report {} is now {}", report.id, status);
    notify(&state, ReportEvent::StatusChanged { status }, &report).await;

    Ok(Json(report))
}

/// PUT /reports/{id}/assign — tells the assignee.
pub async fn assign_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    ApiJson(req): ApiJson<AssignRequest>,
) -> Result<Json<Report>, ApiError> {
    require(&[("assignedToId", req.assigned_to_id.as_str())])?;

    let report = state
        .db(move |db| db.assign_report(&report_id, &req.assigned_to_id, &req.assigned_to_name, now()))
        .await?
        .ok_or(ApiError::NotFound(REPORT_NOT_FOUND))?;

    info!(
        "Report {} assigned to {}",
        report.id,
        report.assigned_to_name.as_deref().unwrap_or_default()
    );
    notify(&state, ReportEvent::Assigned, &report).await;

    Ok(Json(report))
}

/// POST /reports/{id}/comments — tells whichever of reporter and assignee
/// did not write the comment.
pub async fn add_comment(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    ApiJson(req): ApiJson<AddCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    require(&[("authorId", req.author_id.as_str()), ("message", req.message.as_str())])?;

    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        author_id: req.author_id,
        author_name: req.author_name,
        message: req.message,
        created_at: now(),
    };

    let stored = comment.clone();
    let report = state
        .db(move |db| db.append_comment(&report_id, &stored))
        .await?
        .ok_or(ApiError::NotFound(REPORT_NOT_FOUND))?;

    let event = ReportEvent::Commented {
        author_id: comment.author_id.clone(),
        author_name: comment.author_name.clone(),
    };
    notify(&state, event, &report).await;

    Ok((StatusCode::CREATED, Json(comment)))
}
