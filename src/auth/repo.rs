use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, ProfileChanges, User};
use crate::auth::services::normalize_email;
use crate::store::{backend, is_unique_violation, StoreError};

/// Credential store. Email uniqueness is enforced here, case-insensitively.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, StoreError>;
    /// Shift the denormalized review counter, never below zero.
    async fn adjust_review_count(&self, id: Uuid, delta: i32) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, profile_image, review_count,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateEmail
            } else {
                backend(e, "insert user")
            }
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, profile_image, review_count,
                   created_at, updated_at
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| backend(e, "find user by email"))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, profile_image, review_count,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| backend(e, "find user by id"))
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, StoreError> {
        let touch_image = changes.profile_image.is_some();
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   profile_image = CASE WHEN $3 THEN $4 ELSE profile_image END,
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, password_hash, profile_image, review_count,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(touch_image)
        .bind(changes.profile_image.flatten())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| backend(e, "update user profile"))?
        .ok_or(StoreError::NotFound)
    }

    async fn adjust_review_count(&self, id: Uuid, delta: i32) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET review_count = GREATEST(review_count + $2, 0)
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(delta)
        .execute(&self.db)
        .await
        .map_err(|e| backend(e, "adjust review count"))?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// In-process credential store for tests and database-less runs.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        // `NewUser` emails are already normalized.
        if users.values().any(|u| u.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            profile_image: None,
            review_count: 0,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = normalize_email(email);
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(image) = changes.profile_image {
            user.profile_image = image;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn adjust_review_count(&self, id: Uuid, delta: i32) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.review_count = (user.review_count + delta).max(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser::new(name, email, "$argon2id$stub".into()).expect("valid user")
    }

    #[tokio::test]
    async fn email_uniqueness_ignores_case() {
        let store = MemoryUserStore::new();
        store.create(new_user("Ann", "ann@x.com")).await.unwrap();
        let err = store
            .create(new_user("Other Ann", "ANN@X.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn find_by_email_is_case_insensitive() {
        let store = MemoryUserStore::new();
        let created = store.create(new_user("Ann", "ann@x.com")).await.unwrap();
        let found = store.find_by_email(" Ann@X.COM ").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(store.find_by_email("bob@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn email_lookup_folds_non_ascii_case() {
        let store = MemoryUserStore::new();
        let created = store.create(new_user("Élise", "Élise@x.com")).await.unwrap();
        assert_eq!(created.email, "élise@x.com");
        let found = store.find_by_email("ÉLISE@X.COM").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        let err = store
            .create(new_user("Other", "ÉLISE@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn update_profile_changes_only_given_fields() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("Ann", "ann@x.com")).await.unwrap();

        let updated = store
            .update_profile(
                user.id,
                ProfileChanges {
                    profile_image: Some(Some("https://img.example/ann.png".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Ann");
        assert_eq!(updated.profile_image.as_deref(), Some("https://img.example/ann.png"));

        let cleared = store
            .update_profile(
                user.id,
                ProfileChanges {
                    name: Some("Annie".into()),
                    profile_image: Some(None),
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.name, "Annie");
        assert!(cleared.profile_image.is_none());
        assert_eq!(cleared.email, "ann@x.com");
    }

    #[tokio::test]
    async fn update_profile_unknown_user_is_not_found() {
        let store = MemoryUserStore::new();
        let err = store
            .update_profile(Uuid::new_v4(), ProfileChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn review_count_never_goes_negative() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("Ann", "ann@x.com")).await.unwrap();
        store.adjust_review_count(user.id, 1).await.unwrap();
        store.adjust_review_count(user.id, -1).await.unwrap();
        store.adjust_review_count(user.id, -1).await.unwrap();
        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.review_count, 0);
    }
}
