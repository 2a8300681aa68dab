use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    reviews::{
        dto::{CreateReviewRequest, DeleteReviewResponse, UpdateReviewRequest},
        repo_types::Review,
        services,
    },
    state::AppState,
};

// `/reviews/user` and `/reviews/movie/:movie_id` are literal prefixes; the router
// ranks them above `/reviews/:id` regardless of registration order.

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/reviews/movie/:movie_id", get(list_for_movie))
        .route("/reviews/user", get(list_mine))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/reviews", post(create_review))
        .route("/reviews/:id", put(update_review).delete(delete_review))
}

/// Ids that are not UUIDs cannot name an existing review.
fn parse_review_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("review not found".into()))
}

#[instrument(skip(state))]
pub async fn list_for_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> Result<Json<Vec<Review>>, AppError> {
    Ok(Json(services::list_by_movie(&state, &movie_id).await?))
}

#[instrument(skip(state))]
pub async fn list_mine(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Review>>, AppError> {
    Ok(Json(services::list_by_user(&state, user_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_review(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let Json(payload) = payload?;
    let review = services::create_review(&state, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[instrument(skip(state, payload))]
pub async fn update_review(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateReviewRequest>, JsonRejection>,
) -> Result<Json<Review>, AppError> {
    let id = parse_review_id(&id)?;
    let Json(payload) = payload?;
    Ok(Json(services::update_review(&state, user_id, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_review(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteReviewResponse>, AppError> {
    let id = parse_review_id(&id)?;
    services::delete_review(&state, user_id, id).await?;
    Ok(Json(DeleteReviewResponse {
        message: "Review deleted",
    }))
}
