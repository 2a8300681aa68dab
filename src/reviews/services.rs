use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::reviews::{
    dto::{CreateReviewRequest, UpdateReviewRequest},
    repo_types::{NewReview, Review, ReviewChanges},
};
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy)]
enum Action {
    Update,
    Delete,
}

impl Action {
    fn denied(self) -> AppError {
        match self {
            Action::Update => AppError::Forbidden("not authorized to update this review".into()),
            Action::Delete => AppError::Forbidden("not authorized to delete this review".into()),
        }
    }
}

fn review_missing(e: StoreError) -> AppError {
    match e {
        StoreError::NotFound => AppError::NotFound("review not found".into()),
        other => other.into(),
    }
}

/// Load a review and make sure `requester` owns it.
async fn load_owned(
    st: &AppState,
    requester: Uuid,
    review_id: Uuid,
    action: Action,
) -> Result<Review, AppError> {
    let review = st
        .reviews
        .find_by_id(review_id)
        .await?
        .ok_or_else(|| AppError::NotFound("review not found".into()))?;

    if review.user_id != requester {
        warn!(
            review_id = %review_id,
            owner = %review.user_id,
            requester = %requester,
            action = ?action,
            "ownership check failed"
        );
        return Err(action.denied());
    }
    Ok(review)
}

/// Counter drift is tolerated; the review write already happened.
async fn bump_review_count(st: &AppState, user_id: Uuid, delta: i32) {
    if let Err(e) = st.users.adjust_review_count(user_id, delta).await {
        warn!(error = %e, user_id = %user_id, delta, "review count not adjusted");
    }
}

pub async fn create_review(
    st: &AppState,
    user_id: Uuid,
    req: CreateReviewRequest,
) -> Result<Review, AppError> {
    let draft = NewReview::new(user_id, req.movie_id, req.movie_title, req.rating, req.comment)?;

    if st
        .reviews
        .find_by_user_and_movie(user_id, draft.movie_id())
        .await?
        .is_some()
    {
        return Err(AppError::DuplicateReview);
    }

    // The store enforces uniqueness again for racing requests.
    let review = st.reviews.insert(draft).await?;
    bump_review_count(st, user_id, 1).await;

    info!(review_id = %review.id, user_id = %user_id, movie_id = %review.movie_id, "review created");
    Ok(review)
}

pub async fn update_review(
    st: &AppState,
    requester: Uuid,
    review_id: Uuid,
    req: UpdateReviewRequest,
) -> Result<Review, AppError> {
    load_owned(st, requester, review_id, Action::Update).await?;
    let changes = ReviewChanges::new(req.rating, req.comment)?;
    let review = st
        .reviews
        .update(review_id, changes)
        .await
        .map_err(review_missing)?;

    info!(review_id = %review.id, rating = review.rating, "review updated");
    Ok(review)
}

pub async fn delete_review(st: &AppState, requester: Uuid, review_id: Uuid) -> Result<(), AppError> {
    let review = load_owned(st, requester, review_id, Action::Delete).await?;
    st.reviews.remove(review_id).await.map_err(review_missing)?;
    bump_review_count(st, review.user_id, -1).await;

    info!(review_id = %review_id, user_id = %requester, "review deleted");
    Ok(())
}

pub async fn list_by_movie(st: &AppState, movie_id: &str) -> Result<Vec<Review>, AppError> {
    let movie_id = movie_id.trim();
    if movie_id.is_empty() {
        return Err(AppError::Validation("movie id is required".into()));
    }
    Ok(st.reviews.find_by_movie(movie_id).await?)
}

pub async fn list_by_user(st: &AppState, user_id: Uuid) -> Result<Vec<Review>, AppError> {
    Ok(st.reviews.find_by_user(user_id).await?)
}
