/*!
 * Application Configuration
 * Settings read from the environment (and `.env`) once at startup
 */

/// Secret shipped for local development only; production refuses it.
pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub otp_expiry_minutes: i64,
    pub bcrypt_cost: u32,
    pub default_from_email: String,
    pub smtp: Option<SmtpConfig>,
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

impl Config {
    pub fn from_env() -> Self {
        let smtp = std::env::var("SMTP_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .map(|host| SmtpConfig {
                host,
                port: env_or("SMTP_PORT", 587),
                username: std::env::var("SMTP_USERNAME").ok(),
                password: std::env::var("SMTP_PASSWORD").ok(),
            });

        Self {
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
            access_token_minutes: env_or("ACCESS_TOKEN_EXPIRY_MINUTES", 15),
            refresh_token_days: env_or("REFRESH_TOKEN_EXPIRY_DAYS", 7),
            otp_expiry_minutes: env_or("OTP_EXPIRY_MINUTES", 10),
            bcrypt_cost: env_or("BCRYPT_COST", bcrypt::DEFAULT_COST),
            default_from_email: std::env::var("DEFAULT_FROM_EMAIL")
                .unwrap_or_else(|_| "no-reply@localhost".to_string()),
            smtp,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// True when the JWT secret is unset or still the development default.
    pub fn has_insecure_secret(&self) -> bool {
        self.jwt_secret.is_empty() || self.jwt_secret == DEFAULT_JWT_SECRET
    }

    /// Fast, deterministic settings for unit and router tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            environment: "test".to_string(),
            jwt_secret: "test-secret".to_string(),
            access_token_minutes: 15,
            refresh_token_days: 7,
            otp_expiry_minutes: 10,
            bcrypt_cost: 4,
            default_from_email: "no-reply@test.local".to_string(),
            smtp: None,
        }
    }
}
