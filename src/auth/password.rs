//! bcrypt hashing, kept off the async executor.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::ApiError;

const DUMMY_PASSWORD: &str = "placeholder-password-never-matches";

/// Hash to verify against when the account does not exist. Built at the
/// same cost as real hashes so unknown emails cost as much as wrong
/// passwords; an unusable cost falls back to bcrypt's default.
pub fn dummy_hash(cost: u32) -> String {
    hash(DUMMY_PASSWORD, cost)
        .or_else(|_| hash(DUMMY_PASSWORD, DEFAULT_COST))
        .unwrap_or_default()
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    match tokio::task::spawn_blocking(move || hash(&password, cost)).await {
        Ok(Ok(h)) => Ok(h),
        Ok(Err(e)) => {
            tracing::error!("Failed to hash password: {}", e);
            Err(ApiError::Internal("Failed to process password".to_string()))
        }
        Err(e) => {
            tracing::error!("spawn_blocking panic during hash: {}", e);
            Err(ApiError::Internal("Failed to process password".to_string()))
        }
    }
}

/// Check `password` against `stored` on the blocking pool.
pub async fn verify_password(password: String, stored: String) -> bool {
    tokio::task::spawn_blocking(move || verify(&password, &stored).unwrap_or(false))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hashed = hash_password("correct horse".to_string(), 4).await.unwrap();
        assert!(verify_password("correct horse".to_string(), hashed.clone()).await);
        assert!(!verify_password("wrong".to_string(), hashed).await);
    }

    #[tokio::test]
    async fn test_dummy_hash_uses_configured_cost() {
        let dummy = dummy_hash(5);
        assert!(dummy.starts_with("$2b$05$"), "{}", dummy);
        assert!(!verify_password("anything".to_string(), dummy).await);

        let real = hash_password("anything".to_string(), 5).await.unwrap();
        assert_eq!(&real[..7], "$2b$05$");
    }

    #[test]
    fn test_dummy_hash_survives_bad_cost() {
        assert!(dummy_hash(99).starts_with("$2b$12$"));
    }
}
