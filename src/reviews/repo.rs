use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::reviews::repo_types::{NewReview, Review, ReviewChanges};
use crate::store::{backend, is_unique_violation, StoreError};

/// Review persistence. At most one review per (user, movie); a conflicting
/// insert fails with `DuplicateReview` even if the caller pre-checked.
/// Listings are newest first.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn insert(&self, review: NewReview) -> Result<Review, StoreError>;
    async fn find_by_movie(&self, movie_id: &str) -> Result<Vec<Review>, StoreError>;
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Review>, StoreError>;
    async fn find_by_user_and_movie(
        &self,
        user_id: Uuid,
        movie_id: &str,
    ) -> Result<Option<Review>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>, StoreError>;
    async fn update(&self, id: Uuid, changes: ReviewChanges) -> Result<Review, StoreError>;
    async fn remove(&self, id: Uuid) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgReviewStore {
    db: PgPool,
}

impl PgReviewStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    async fn insert(&self, review: NewReview) -> Result<Review, StoreError> {
        sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (id, user_id, movie_id, movie_title, rating, comment)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, movie_id, movie_title, rating, comment, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(review.user_id)
        .bind(&review.movie_id)
        .bind(&review.movie_title)
        .bind(review.rating.get())
        .bind(&review.comment)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateReview
            } else {
                backend(e, "insert review")
            }
        })
    }

    async fn find_by_movie(&self, movie_id: &str) -> Result<Vec<Review>, StoreError> {
        sqlx::query_as::<_, Review>(
            r#"
            SELECT id, user_id, movie_id, movie_title, rating, comment, created_at, updated_at
              FROM reviews
             WHERE movie_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(movie_id)
        .fetch_all(&self.db)
        .await
        .map_err(|e| backend(e, "list reviews by movie"))
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Review>, StoreError> {
        sqlx::query_as::<_, Review>(
            r#"
            SELECT id, user_id, movie_id, movie_title, rating, comment, created_at, updated_at
              FROM reviews
             WHERE user_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(|e| backend(e, "list reviews by user"))
    }

    async fn find_by_user_and_movie(
        &self,
        user_id: Uuid,
        movie_id: &str,
    ) -> Result<Option<Review>, StoreError> {
        sqlx::query_as::<_, Review>(
            r#"
            SELECT id, user_id, movie_id, movie_title, rating, comment, created_at, updated_at
              FROM reviews
             WHERE user_id = $1 AND movie_id = $2
            "#,
        )
        .bind(user_id)
        .bind(movie_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| backend(e, "find review by user and movie"))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>, StoreError> {
        sqlx::query_as::<_, Review>(
            r#"
            SELECT id, user_id, movie_id, movie_title, rating, comment, created_at, updated_at
              FROM reviews
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| backend(e, "find review"))
    }

    async fn update(&self, id: Uuid, changes: ReviewChanges) -> Result<Review, StoreError> {
        sqlx::query_as::<_, Review>(
            r#"
            UPDATE reviews
               SET rating = $2,
                   comment = COALESCE($3, comment),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, user_id, movie_id, movie_title, rating, comment, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.rating.get())
        .bind(changes.comment)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| backend(e, "update review"))?
        .ok_or(StoreError::NotFound)
    }

    async fn remove(&self, id: Uuid) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| backend(e, "delete review"))?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// In-process review store. Kept in insertion order; the uniqueness check
/// and the push happen under one write lock.
#[derive(Default)]
pub struct MemoryReviewStore {
    reviews: RwLock<Vec<Review>>,
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReviewStore for MemoryReviewStore {
    async fn insert(&self, review: NewReview) -> Result<Review, StoreError> {
        let mut reviews = self.reviews.write().await;
        if reviews
            .iter()
            .any(|r| r.user_id == review.user_id && r.movie_id == review.movie_id)
        {
            return Err(StoreError::DuplicateReview);
        }
        let now = OffsetDateTime::now_utc();
        let review = Review {
            id: Uuid::new_v4(),
            user_id: review.user_id,
            movie_id: review.movie_id,
            movie_title: review.movie_title,
            rating: review.rating.get(),
            comment: review.comment,
            created_at: now,
            updated_at: now,
        };
        reviews.push(review.clone());
        Ok(review)
    }

    async fn find_by_movie(&self, movie_id: &str) -> Result<Vec<Review>, StoreError> {
        let reviews = self.reviews.read().await;
        Ok(reviews
            .iter()
            .rev()
            .filter(|r| r.movie_id == movie_id)
            .cloned()
            .collect())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Review>, StoreError> {
        let reviews = self.reviews.read().await;
        Ok(reviews
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_user_and_movie(
        &self,
        user_id: Uuid,
        movie_id: &str,
    ) -> Result<Option<Review>, StoreError> {
        let reviews = self.reviews.read().await;
        Ok(reviews
            .iter()
            .find(|r| r.user_id == user_id && r.movie_id == movie_id)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>, StoreError> {
        let reviews = self.reviews.read().await;
        Ok(reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn update(&self, id: Uuid, changes: ReviewChanges) -> Result<Review, StoreError> {
        let mut reviews = self.reviews.write().await;
        let review = reviews
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound)?;
        review.rating = changes.rating.get();
        if let Some(comment) = changes.comment {
            review.comment = comment;
        }
        review.updated_at = OffsetDateTime::now_utc();
        Ok(review.clone())
    }

    async fn remove(&self, id: Uuid) -> Result<(), StoreError> {
        let mut reviews = self.reviews.write().await;
        let idx = reviews
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound)?;
        reviews.remove(idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn draft(user_id: Uuid, movie_id: &str, rating: i64) -> NewReview {
        NewReview::new(
            user_id,
            Some(movie_id.into()),
            Some(format!("Title of {movie_id}")),
            Some(rating),
            Some("fine".into()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn second_insert_for_same_pair_is_rejected() {
        let store = MemoryReviewStore::new();
        let user = Uuid::new_v4();
        store.insert(draft(user, "m1", 5)).await.unwrap();
        let err = store.insert(draft(user, "m1", 2)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateReview));

        // other user, same movie: fine
        store.insert(draft(Uuid::new_v4(), "m1", 2)).await.unwrap();
        assert_eq!(store.find_by_movie("m1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lookup_by_user_and_movie_matches_the_pair_only() {
        let store = MemoryReviewStore::new();
        let user = Uuid::new_v4();
        let mine = store.insert(draft(user, "m1", 4)).await.unwrap();
        store.insert(draft(Uuid::new_v4(), "m2", 2)).await.unwrap();

        let found = store.find_by_user_and_movie(user, "m1").await.unwrap().unwrap();
        assert_eq!(found.id, mine.id);
        assert!(store.find_by_user_and_movie(user, "m2").await.unwrap().is_none());
        assert!(store
            .find_by_user_and_movie(Uuid::new_v4(), "m1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn concurrent_inserts_leave_one_review() {
        let store = Arc::new(MemoryReviewStore::new());
        let user = Uuid::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.insert(draft(user, "m1", 1 + i % 5)).await })
            })
            .collect();

        let mut ok = 0;
        let mut dup = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::DuplicateReview) => dup += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((ok, dup), (1, 7));
        assert_eq!(store.find_by_user(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listings_are_newest_first() {
        let store = MemoryReviewStore::new();
        let user = Uuid::new_v4();
        let first = store.insert(draft(user, "m1", 3)).await.unwrap();
        let second = store.insert(draft(user, "m2", 4)).await.unwrap();

        let ids: Vec<Uuid> = store
            .find_by_user(user)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn update_and_remove_unknown_ids() {
        let store = MemoryReviewStore::new();
        let changes = ReviewChanges::new(Some(3), None).unwrap();
        assert!(matches!(
            store.update(Uuid::new_v4(), changes).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.remove(Uuid::new_v4()).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_keeps_comment_when_absent() {
        let store = MemoryReviewStore::new();
        let review = store.insert(draft(Uuid::new_v4(), "m1", 3)).await.unwrap();
        let updated = store
            .update(review.id, ReviewChanges::new(Some(1), None).unwrap())
            .await
            .unwrap();
        assert_eq!(updated.rating, 1);
        assert_eq!(updated.comment, "fine");
        assert_eq!(updated.user_id, review.user_id);
        assert_eq!(updated.created_at, review.created_at);
    }
}
