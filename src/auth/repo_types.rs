use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::services::{is_valid_email, normalize_email, validate_name};
use crate::error::ValidationError;

/// User record as persisted. Never serialized directly; see `PublicUser`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,             // stored lower-cased
    pub password_hash: String,     // Argon2 PHC string
    pub profile_image: Option<String>,
    pub review_count: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A registration that already passed validation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) password_hash: String,
}

impl NewUser {
    pub fn new(name: &str, email: &str, password_hash: String) -> Result<Self, ValidationError> {
        let name = validate_name(name)?;
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(ValidationError::new("invalid email format"));
        }
        if password_hash.is_empty() {
            return Err(ValidationError::new("password hash is required"));
        }
        Ok(Self {
            name,
            email,
            password_hash,
        })
    }
}

/// Mutable profile fields. `profile_image: Some(None)` clears the picture.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub profile_image: Option<Option<String>>,
}
