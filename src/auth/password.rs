use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Argon2 is deliberately slow, so both operations run on the blocking pool.
pub async fn hash_password(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })
    })
    .await
    .context("hash task panicked")?
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub async fn verify_password(plain: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .context("verify task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matching_password_verifies() {
        let hash = hash_password("secret1".into()).await.expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret1".into(), hash).await.expect("verify"));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected_without_error() {
        let hash = hash_password("secret1".into()).await.expect("hash");
        assert!(!verify_password("secret2".into(), hash).await.expect("verify"));
    }

    #[tokio::test]
    async fn same_password_hashes_differently() {
        let a = hash_password("secret1".into()).await.unwrap();
        let b = hash_password("secret1".into()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn unreadable_hash_is_an_error() {
        assert!(verify_password("x".into(), "plaintext".into()).await.is_err());
    }
}
