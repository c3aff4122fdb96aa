use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::access::AccessContext;
use super::departments::{self, Department};
use super::domain::{
    ApplicantId, ApplicantSubmission, ApplicationId, ApplicationUpdate, InterviewScoreId,
    InterviewerId, NewInterviewer,
};
use super::notifications::Mailer;
use super::repository::{RecruitmentRepository, RepositoryError};
use super::service::{RecruitmentError, RecruitmentService};
use super::views::{ApplicantQuery, ApplicationQuery, Selection};

pub const ACTOR_GROUPS_HEADER: &str = "x-actor-groups";
pub const ACTOR_SUPERUSER_HEADER: &str = "x-actor-superuser";
pub const ACTOR_PERMISSIONS_HEADER: &str = "x-actor-permissions";

type SharedService<R, M> = State<Arc<RecruitmentService<R, M>>>;

/// Router builder exposing the applicant intake and staff workflow endpoints.
pub fn recruitment_router<R, M>(service: Arc<RecruitmentService<R, M>>) -> Router
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    Router::new()
        .route(
            "/api/v1/applicants",
            post(submit_applicant_handler::<R, M>).get(list_applicants_handler::<R, M>),
        )
        .route(
            "/api/v1/applicants/:applicant_id",
            get(get_applicant_handler::<R, M>).delete(delete_applicant_handler::<R, M>),
        )
        .route(
            "/api/v1/applications",
            post(open_application_handler::<R, M>).get(list_applications_handler::<R, M>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(get_application_handler::<R, M>).patch(update_application_handler::<R, M>),
        )
        .route(
            "/api/v1/applications/:application_id/scores",
            post(record_score_handler::<R, M>),
        )
        .route(
            "/api/v1/scores/:score_id",
            patch(update_score_handler::<R, M>).delete(delete_score_handler::<R, M>),
        )
        .route(
            "/api/v1/actions/send-writing-task",
            post(send_writing_task_handler::<R, M>),
        )
        .route(
            "/api/v1/actions/expire-writing-tasks",
            post(expire_writing_tasks_handler::<R, M>),
        )
        .route(
            "/api/v1/actions/send-interview",
            post(send_interview_handler::<R, M>),
        )
        .route(
            "/api/v1/actions/send-decision",
            post(send_decision_handler::<R, M>),
        )
        .route(
            "/api/v1/interviewers",
            get(list_interviewers_handler::<R, M>).post(create_interviewer_handler::<R, M>),
        )
        .route(
            "/api/v1/interviewers/:interviewer_id",
            patch(update_interviewer_handler::<R, M>).delete(delete_interviewer_handler::<R, M>),
        )
        .route("/api/v1/departments", get(departments_handler))
        .route(
            "/api/v1/exports/applications.csv",
            get(export_applications_handler::<R, M>),
        )
        .with_state(service)
}

/// Operator identity forwarded by the authenticating proxy.
#[derive(Debug, Clone)]
pub struct Actor(pub AccessContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
            .map(Actor)
            .ok_or_else(|| {
                error_response(
                    StatusCode::UNAUTHORIZED,
                    "actor identity headers are missing".to_string(),
                )
            })
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Option<AccessContext> {
    let groups = header_text(headers, ACTOR_GROUPS_HEADER);
    let superuser = header_text(headers, ACTOR_SUPERUSER_HEADER);
    if groups.is_none() && superuser.is_none() {
        return None;
    }

    let superuser = superuser.is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));
    let permissions = header_text(headers, ACTOR_PERMISSIONS_HEADER).unwrap_or_default();
    Some(AccessContext::from_groups(
        groups.unwrap_or_default().split(','),
        superuser,
        permissions.split(','),
    ))
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenApplicationRequest {
    applicant_id: ApplicantId,
    department: Department,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreRequest {
    interviewer: String,
    score: f64,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreEdit {
    score: f64,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchRequest {
    application_ids: Vec<ApplicationId>,
}

pub(crate) async fn submit_applicant_handler<R, M>(
    State(service): SharedService<R, M>,
    Json(submission): Json<ApplicantSubmission>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    match service.submit_applicant(submission, Utc::now()) {
        Ok(applicant) => (StatusCode::CREATED, Json(applicant)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn list_applicants_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Query(query): Query<ApplicantQuery>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(StatusCode::OK, service.list_applicants(&ctx, &query))
}

async fn get_applicant_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Path(applicant_id): Path<ApplicantId>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(StatusCode::OK, service.get_applicant(&ctx, &applicant_id))
}

async fn delete_applicant_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Path(applicant_id): Path<ApplicantId>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    no_content(service.delete_applicant(&ctx, &applicant_id))
}

async fn open_application_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Json(request): Json<OpenApplicationRequest>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(
        StatusCode::CREATED,
        service.open_application(&ctx, &request.applicant_id, request.department, Utc::now()),
    )
}

async fn list_applications_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Query(query): Query<ApplicationQuery>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(StatusCode::OK, service.list_applications(&ctx, &query))
}

async fn get_application_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Path(application_id): Path<ApplicationId>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(StatusCode::OK, service.get_application(&ctx, &application_id))
}

async fn update_application_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Path(application_id): Path<ApplicationId>,
    Json(update): Json<ApplicationUpdate>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(
        StatusCode::OK,
        service.update_application(&ctx, &application_id, update, Utc::now()),
    )
}

async fn record_score_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Path(application_id): Path<ApplicationId>,
    Json(request): Json<ScoreRequest>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(
        StatusCode::CREATED,
        service.record_score(
            &ctx,
            &application_id,
            &request.interviewer,
            request.score,
            request.comment,
            Utc::now(),
        ),
    )
}

async fn update_score_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Path(score_id): Path<InterviewScoreId>,
    Json(edit): Json<ScoreEdit>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(
        StatusCode::OK,
        service.update_score(&ctx, &score_id, edit.score, edit.comment, Utc::now()),
    )
}

async fn delete_score_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Path(score_id): Path<InterviewScoreId>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    no_content(service.delete_score(&ctx, &score_id, Utc::now()))
}

async fn send_writing_task_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Json(request): Json<BatchRequest>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(
        StatusCode::OK,
        service.send_writing_task_emails(&ctx, &request.application_ids, Utc::now()),
    )
}

async fn expire_writing_tasks_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Json(selection): Json<Selection>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(
        StatusCode::OK,
        service.expire_writing_tasks(&ctx, &selection, Utc::now()),
    )
}

async fn send_interview_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Json(request): Json<BatchRequest>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(
        StatusCode::OK,
        service.send_interview_emails(&ctx, &request.application_ids, Utc::now()),
    )
}

async fn send_decision_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Json(request): Json<BatchRequest>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(
        StatusCode::OK,
        service.send_decision_emails(&ctx, &request.application_ids, Utc::now()),
    )
}

async fn list_interviewers_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(StatusCode::OK, service.list_interviewers(&ctx))
}

async fn create_interviewer_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Json(interviewer): Json<NewInterviewer>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(
        StatusCode::CREATED,
        service.create_interviewer(&ctx, interviewer),
    )
}

async fn update_interviewer_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Path(interviewer_id): Path<InterviewerId>,
    Json(changes): Json<NewInterviewer>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    respond(
        StatusCode::OK,
        service.update_interviewer(&ctx, &interviewer_id, changes),
    )
}

async fn delete_interviewer_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Path(interviewer_id): Path<InterviewerId>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    no_content(service.delete_interviewer(&ctx, &interviewer_id))
}

async fn departments_handler() -> Response {
    Json(departments::registry()).into_response()
}

async fn export_applications_handler<R, M>(
    State(service): SharedService<R, M>,
    Actor(ctx): Actor,
    Query(query): Query<ApplicationQuery>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    match service.export_applications(&ctx, &query) {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"applications.csv\"",
                ),
            ],
            body,
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

fn respond<T>(status: StatusCode, result: Result<T, RecruitmentError>) -> Response
where
    T: serde::Serialize,
{
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn no_content(result: Result<(), RecruitmentError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl RecruitmentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RecruitmentError::Intake(_)
            | RecruitmentError::InvalidScore(_)
            | RecruitmentError::InvalidInput(_)
            | RecruitmentError::UnknownInterviewer(_)
            | RecruitmentError::Repository(RepositoryError::UnknownInterviewer(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            RecruitmentError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            RecruitmentError::Repository(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,
            RecruitmentError::OutOfScope { .. } | RecruitmentError::PermissionDenied(_) => {
                StatusCode::FORBIDDEN
            }
            RecruitmentError::Repository(RepositoryError::Unavailable(_))
            | RecruitmentError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RecruitmentError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.to_string())
    }
}
