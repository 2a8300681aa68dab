use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{
    dto::{LoginRequest, RegisterRequest},
    jwt::JwtKeys,
    password::{hash_password, verify_password, MIN_PASSWORD_LEN},
    repo_types::{NewUser, ProfileChanges, User},
};
use crate::error::{AppError, ValidationError};
use crate::state::AppState;

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 50;
/// Length bound on the encoded image string, roughly 1MB of binary.
pub const PROFILE_IMAGE_MAX_LEN: usize = 1_400_000;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    let len = name.chars().count();
    if len < NAME_MIN_CHARS || len > NAME_MAX_CHARS {
        return Err(ValidationError::new(format!(
            "name must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

/// Empty clears the picture; otherwise an http(s) URL or a `data:image/` payload.
pub(crate) fn validate_profile_image(
    image: Option<&str>,
) -> Result<Option<String>, ValidationError> {
    let Some(image) = image.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let allowed = image.starts_with("data:image/")
        || image.starts_with("https://")
        || image.starts_with("http://");
    if !allowed {
        return Err(ValidationError::new("invalid image format"));
    }
    if image.len() > PROFILE_IMAGE_MAX_LEN {
        return Err(ValidationError::new(
            "image too large, please use an image under 1MB",
        ));
    }
    Ok(Some(image.to_string()))
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

pub async fn register(st: &AppState, req: RegisterRequest) -> Result<User, AppError> {
    let (Some(name), Some(email), Some(password)) =
        (required(req.name), required(req.email), required(req.password))
    else {
        return Err(AppError::Validation("all fields are required".into()));
    };

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    // Validate before paying for the hash.
    NewUser::new(&name, &email, "pending".into())?;

    if st.users.find_by_email(&email).await?.is_some() {
        warn!(email = %normalize_email(&email), "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let hash = hash_password(password).await?;
    let user = st.users.create(NewUser::new(&name, &email, hash)?).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn login(st: &AppState, req: LoginRequest) -> Result<(String, User), AppError> {
    let (Some(email), Some(password)) = (required(req.email), required(req.password)) else {
        return Err(AppError::Validation("email and password are required".into()));
    };

    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!(email = %normalize_email(&email), "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = JwtKeys::from(&st.config.jwt).issue(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok((token, user))
}

pub async fn profile(st: &AppState, user_id: Uuid) -> Result<User, AppError> {
    st.users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))
}

pub async fn update_name(st: &AppState, user_id: Uuid, name: Option<&str>) -> Result<User, AppError> {
    let name = validate_name(name.unwrap_or_default())?;
    let changes = ProfileChanges {
        name: Some(name),
        ..Default::default()
    };
    let user = st.users.update_profile(user_id, changes).await.map_err(user_missing)?;
    info!(user_id = %user.id, "profile updated");
    Ok(user)
}

pub async fn update_picture(
    st: &AppState,
    user_id: Uuid,
    image: Option<&str>,
) -> Result<User, AppError> {
    let image = validate_profile_image(image)?;
    let changes = ProfileChanges {
        profile_image: Some(image),
        ..Default::default()
    };
    let user = st.users.update_profile(user_id, changes).await.map_err(user_missing)?;
    info!(user_id = %user.id, cleared = user.profile_image.is_none(), "profile picture updated");
    Ok(user)
}

fn user_missing(e: crate::store::StoreError) -> AppError {
    match e {
        crate::store::StoreError::NotFound => AppError::NotFound("user not found".into()),
        other => other.into(),
    }
}
