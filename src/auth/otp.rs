//! One-time email verification codes.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::db::models::User;

pub const OTP_LENGTH: usize = 6;

/// A freshly issued code: `code` goes to the user, `digest` to the database.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub code: String,
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

pub fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{:0width$}", n, width = OTP_LENGTH)
}

/// Codes are stored as SHA-256 hex digests, never in plain text.
pub fn digest(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn issue(ttl_minutes: i64) -> IssuedOtp {
    let code = generate_code();
    IssuedOtp {
        digest: digest(&code),
        code,
        expires_at: Utc::now() + Duration::minutes(ttl_minutes),
    }
}

/// Whether `code` is the user's current, unexpired OTP.
pub fn matches(user: &User, code: &str, now: DateTime<Utc>) -> bool {
    match (&user.otp_code, user.otp_expires_at) {
        (Some(stored), Some(expires_at)) => expires_at > now && *stored == digest(code),
        _ => false,
    }
}

/// Mark the user verified and burn the code.
pub fn consume(user: &mut User) {
    user.is_verified = true;
    user.otp_code = None;
    user.otp_expires_at = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user_with(otp: &IssuedOtp) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            phone: None,
            bio: None,
            profile_image: None,
            role_id: None,
            is_verified: false,
            is_staff: false,
            otp_code: Some(otp.digest.clone()),
            otp_expires_at: Some(otp.expires_at),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_code_is_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), OTP_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_matches_only_current_code() {
        let otp = issue(10);
        let user = user_with(&otp);
        assert!(matches(&user, &otp.code, Utc::now()));
        assert!(!matches(&user, "not-it", Utc::now()));
    }

    #[test]
    fn test_expired_code_does_not_match() {
        let otp = issue(10);
        let user = user_with(&otp);
        assert!(!matches(&user, &otp.code, Utc::now() + Duration::minutes(11)));
    }

    #[test]
    fn test_consume_verifies_and_clears() {
        let otp = issue(10);
        let mut user = user_with(&otp);
        consume(&mut user);
        assert!(user.is_verified);
        assert!(user.otp_code.is_none());
        assert!(!matches(&user, &otp.code, Utc::now()));
    }
}
