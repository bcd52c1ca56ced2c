use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::dto::authoring_dto::NewTest;
use crate::error::Result;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/authoring/tests",
    request_body = NewTest,
    responses(
        (status = 201, description = "Test created with its questions", body = Json<crate::models::test::Test>),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Caller is not an author")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create_test(
    State(state): State<AppState>,
    Json(payload): Json<NewTest>,
) -> Result<Response> {
    let test = state.test_service.create_test(payload).await?;
    Ok((StatusCode::CREATED, Json(test)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/authoring/tests/{id}",
    params(
        ("id" = i64, Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "Full test including answer keys", body = Json<crate::models::test::Test>),
        (status = 404, description = "Test not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_test(
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> Result<Response> {
    let test = state.test_service.get_test(test_id).await?;
    Ok(Json(test).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/authoring/tests/{id}",
    params(
        ("id" = i64, Path, description = "Test ID")
    ),
    responses(
        (status = 204, description = "Test deleted; attempts are kept"),
        (status = 404, description = "Test not found")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete_test(
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> Result<Response> {
    state.test_service.delete_test(test_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
