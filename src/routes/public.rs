use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use validator::Validate;

use crate::dto::public_dto::{AttemptSummary, StartAttemptResponse, SubmitAttemptRequest};
use crate::error::{Error, Result};
use crate::middleware::auth::Learner;
use crate::services::test_service::public_view;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/tests/{id}/public",
    params(
        ("id" = i64, Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "Test without answer keys", body = Json<crate::dto::public_dto::PublicTest>),
        (status = 403, description = "No course access or test not open"),
        (status = 404, description = "Test not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_public_test(
    State(state): State<AppState>,
    Extension(learner): Extension<Learner>,
    Path(test_id): Path<i64>,
) -> Result<Response> {
    let test = state
        .test_service
        .open_for_learner(learner.user_id, test_id, state.clock.now())
        .await?;
    let view = public_view(&test, &mut rand::thread_rng())?;
    Ok(Json(view).into_response())
}

#[utoipa::path(
    post,
    path = "/api/tests/{id}/attempts/start",
    params(
        ("id" = i64, Path, description = "Test ID")
    ),
    responses(
        (status = 201, description = "Attempt started", body = Json<StartAttemptResponse>),
        (status = 403, description = "Window closed, no course access or attempts exhausted"),
        (status = 404, description = "Test not found"),
        (status = 409, description = "Concurrent start could not be resolved")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(learner): Extension<Learner>,
    Path(test_id): Path<i64>,
) -> Result<Response> {
    let (attempt, test) = state.ledger.start_attempt(learner.user_id, test_id).await?;
    let body = StartAttemptResponse::new(&attempt, &test);
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/tests/{id}/attempts/{attempt_id}/submit",
    params(
        ("id" = i64, Path, description = "Test ID"),
        ("attempt_id" = i64, Path, description = "Attempt ID")
    ),
    request_body = SubmitAttemptRequest,
    responses(
        (status = 200, description = "Attempt graded or sent for review", body = Json<crate::dto::public_dto::AttemptResultResponse>),
        (status = 400, description = "Invalid answers or attempt already submitted"),
        (status = 404, description = "Attempt not found"),
        (status = 409, description = "Concurrent submit could not be resolved")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(learner): Extension<Learner>,
    Path((test_id, attempt_id)): Path<(i64, i64)>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<Response> {
    payload.validate()?;
    let result = state
        .grader
        .submit(learner.user_id, test_id, attempt_id, &payload.answers)
        .await?;
    Ok(Json(result).into_response())
}

#[utoipa::path(
    get,
    path = "/api/tests/{id}/attempts",
    params(
        ("id" = i64, Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "The learner's attempts, oldest first", body = [AttemptSummary]),
        (status = 403, description = "No course access"),
        (status = 404, description = "Test not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_attempts(
    State(state): State<AppState>,
    Extension(learner): Extension<Learner>,
    Path(test_id): Path<i64>,
) -> Result<Response> {
    let attempts = state.ledger.list_attempts(learner.user_id, test_id).await?;
    let summaries: Vec<AttemptSummary> = attempts.iter().map(AttemptSummary::from).collect();
    Ok(Json(summaries).into_response())
}

#[utoipa::path(
    get,
    path = "/api/tests/{id}/attempts/{attempt_id}",
    params(
        ("id" = i64, Path, description = "Test ID"),
        ("attempt_id" = i64, Path, description = "Attempt ID")
    ),
    responses(
        (status = 200, description = "Attempt result under the feedback policy", body = Json<crate::dto::public_dto::AttemptResultResponse>),
        (status = 404, description = "Attempt not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_attempt_result(
    State(state): State<AppState>,
    Extension(learner): Extension<Learner>,
    Path((test_id, attempt_id)): Path<(i64, i64)>,
) -> Result<Response> {
    let result = state
        .grader
        .result(learner.user_id, test_id, attempt_id)
        .await?;
    Ok(Json(result).into_response())
}

#[utoipa::path(
    get,
    path = "/api/lessons/{lesson_id}/test",
    params(
        ("lesson_id" = i64, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Published test of the lesson", body = Json<crate::dto::public_dto::PublicTest>),
        (status = 403, description = "No course access or test not open"),
        (status = 404, description = "Lesson has no published test")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_lesson_test(
    State(state): State<AppState>,
    Extension(learner): Extension<Learner>,
    Path(lesson_id): Path<i64>,
) -> Result<Response> {
    let test = state
        .test_service
        .lesson_test(lesson_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Lesson {} has no published test", lesson_id)))?;
    state
        .test_service
        .authorize(learner.user_id, &test, state.clock.now())
        .await?;
    let view = public_view(&test, &mut rand::thread_rng())?;
    Ok(Json(view).into_response())
}

#[utoipa::path(
    get,
    path = "/api/lessons/{lesson_id}/test/check",
    params(
        ("lesson_id" = i64, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Learner progress on the lesson test", body = Json<crate::dto::public_dto::LessonTestCheck>),
        (status = 403, description = "No course access")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn check_lesson_test(
    State(state): State<AppState>,
    Extension(learner): Extension<Learner>,
    Path(lesson_id): Path<i64>,
) -> Result<Response> {
    let check = state.ledger.check_lesson(learner.user_id, lesson_id).await?;
    Ok(Json(check).into_response())
}
