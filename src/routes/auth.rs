/**
 * Authentication Routes
 * Registration with emailed OTP verification, login, and token refresh
 */
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::{otp, password, tokens};
use crate::auth::tokens::{TokenPair, TokenType};
use crate::db::models::NewUser;
use crate::error::{ApiError, ErrorCode, FieldError};
use crate::extract::{JsonBody, MaybeUser};
use crate::mail::{Email, MailError};
use crate::resources::fields::{is_valid_username, Fields};
use crate::routes::users::UserProfile;
use crate::routes::MessageResponse;
use crate::state::AppState;
use crate::store::{Store, StoreError};

// ============================================================================
// Configuration
// ============================================================================

/// Role every self-registered account receives.
pub const DEFAULT_ROLE: &str = "user";

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const ACCOUNT_EXISTS_MESSAGE: &str =
    "Your account already exists. Failed to create a new account.";

const INVALID_OTP_MESSAGE: &str = "Invalid email or OTP code.";
const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";
const INVALID_REFRESH_MESSAGE: &str = "Invalid or expired refresh token";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessToken {
    pub access: String,
}

/// Account fields shared by self-registration and staff user creation.
pub(crate) struct NewAccount {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Uniqueness problems win: any of them turns the whole rejection into a 409
/// listing only the conflicts. Everything else is a 400 list.
fn account_rejection(errors: Vec<FieldError>) -> ApiError {
    let (conflicts, others): (Vec<_>, Vec<_>) = errors
        .into_iter()
        .partition(|e| e.code == ErrorCode::Unique);
    if conflicts.is_empty() {
        ApiError::Validation(others)
    } else {
        ApiError::conflict(ACCOUNT_EXISTS_MESSAGE, conflicts)
    }
}

/// A unique index caught a duplicate the pre-check missed.
pub(crate) fn account_insert_error(error: StoreError) -> ApiError {
    match error {
        StoreError::Conflict(field) => ApiError::conflict(
            ACCOUNT_EXISTS_MESSAGE,
            vec![FieldError::unique(&field, "This value is already in use.")],
        ),
        other => other.into(),
    }
}

pub(crate) async fn read_account(
    store: &dyn Store,
    body: &Map<String, Value>,
) -> Result<NewAccount, ApiError> {
    let mut f = Fields::new(body);
    let email = f.email("email", true);
    let username = match f.required_text("username", 30) {
        Some(name) if !is_valid_username(&name) => {
            f.push(FieldError::invalid(
                "username",
                "Enter a valid username. Use 3-30 letters, numbers, and . _ - characters.",
            ));
            None
        }
        other => other,
    };
    let password = f.password("password", MIN_PASSWORD_LENGTH);
    let first_name = f.optional_text("first_name", 150);
    let last_name = f.optional_text("last_name", 150);
    let phone = f.optional_text("phone", 20);

    if let Some(email) = &email {
        if store.find_user_by_email(email).await?.is_some() {
            f.push(FieldError::unique("email", "user with this email already exists."));
        }
    }
    if let Some(username) = &username {
        if store.find_user_by_username(username).await?.is_some() {
            f.push(FieldError::unique(
                "username",
                "A user with that username already exists.",
            ));
        }
    }

    match f.finish((email, username, password)) {
        Ok((Some(email), Some(username), Some(password))) => Ok(NewAccount {
            email,
            username,
            password,
            first_name,
            last_name,
            phone,
        }),
        Ok(_) => Err(ApiError::Internal("account fields missing after validation".to_string())),
        Err(errors) => Err(account_rejection(errors)),
    }
}

pub(crate) async fn send_otp(state: &AppState, to: &str, code: &str) -> Result<(), MailError> {
    state
        .mailer
        .send(Email {
            from: state.config.default_from_email.clone(),
            to: to.to_string(),
            subject: "Your OTP Code".to_string(),
            body: format!(
                "Your OTP code is {}. It expires in {} minutes.",
                code, state.config.otp_expiry_minutes
            ),
        })
        .await
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/register
/// Create an unverified account and email it a one-time code
pub async fn register(
    State(state): State<AppState>,
    _caller: MaybeUser,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let account = read_account(state.store.as_ref(), &body).await?;

    let role = state
        .store
        .find_role_by_name(DEFAULT_ROLE)
        .await?
        .ok_or_else(|| ApiError::BadRequest(format!("Role '{}' does not exist.", DEFAULT_ROLE)))?;

    let password_hash = password::hash_password(account.password, state.config.bcrypt_cost).await?;
    let issued = otp::issue(state.config.otp_expiry_minutes);

    let user = state
        .store
        .insert_user(NewUser {
            email: account.email,
            username: account.username,
            password_hash,
            first_name: account.first_name,
            last_name: account.last_name,
            phone: account.phone,
            role_id: Some(role.id),
            is_verified: false,
            is_staff: false,
            otp_code: Some(issued.digest),
            otp_expires_at: Some(issued.expires_at),
        })
        .await
        .map_err(account_insert_error)?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    let response = match send_otp(&state, &user.email, &issued.code).await {
        Ok(()) => RegisterResponse {
            message: "User created. Check your email for the OTP code.".to_string(),
            user: UserProfile::from(&user),
            warning: None,
        },
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to send OTP email");
            RegisterResponse {
                message: "User created.".to_string(),
                user: UserProfile::from(&user),
                warning: Some(format!("User created but failed to send OTP email: {}", e)),
            }
        }
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/verify-otp
/// Mark the account verified when the code matches and has not expired
pub async fn verify_otp(
    State(state): State<AppState>,
    _caller: MaybeUser,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut f = Fields::new(&body);
    let email = f.required_text("email", 254).unwrap_or_default();
    let code = f.required_text("otp_code", 16).unwrap_or_default();
    f.finish(())?;

    let Some(mut user) = state.store.find_user_by_email(&email).await? else {
        tracing::debug!("OTP submitted for unknown email");
        return Err(ApiError::BadRequest(INVALID_OTP_MESSAGE.to_string()));
    };

    if !otp::matches(&user, &code, chrono::Utc::now()) {
        tracing::warn!(user_id = %user.id, "Rejected OTP code");
        return Err(ApiError::BadRequest(INVALID_OTP_MESSAGE.to_string()));
    }

    otp::consume(&mut user);
    state.store.save_user(&user).await?;
    tracing::info!(user_id = %user.id, "Email verified");

    Ok(Json(MessageResponse::new("Email verified successfully.")))
}

/// POST /api/resend-otp
/// Issue a fresh code to an unverified account. The answer never reveals
/// whether the email is registered.
pub async fn resend_otp(
    State(state): State<AppState>,
    _caller: MaybeUser,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut f = Fields::new(&body);
    let email = f.required_text("email", 254).unwrap_or_default();
    f.finish(())?;

    if let Some(mut user) = state.store.find_user_by_email(&email).await? {
        if !user.is_verified {
            let issued = otp::issue(state.config.otp_expiry_minutes);
            user.otp_code = Some(issued.digest);
            user.otp_expires_at = Some(issued.expires_at);
            state.store.save_user(&user).await?;

            if let Err(e) = send_otp(&state, &user.email, &issued.code).await {
                tracing::warn!(user_id = %user.id, error = %e, "Failed to resend OTP email");
            }
        }
    }

    Ok(Json(MessageResponse::new(
        "If the account exists and is not yet verified, a new OTP code has been sent.",
    )))
}

/// POST /api/login
/// Authenticate user and return tokens
pub async fn login(
    State(state): State<AppState>,
    _caller: MaybeUser,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Json<TokenPair>, ApiError> {
    let mut f = Fields::new(&body);
    let email = f.required_text("email", 254).unwrap_or_default();
    let password = f.password("password", 1).unwrap_or_default();
    f.finish(())?;

    let user = state.store.find_user_by_email(&email).await?;
    // Unknown emails still pay for a bcrypt verify against a dummy hash.
    let stored = match &user {
        Some(u) => u.password_hash.clone(),
        None => state.dummy_hash.to_string(),
    };
    let password_ok = password::verify_password(password, stored).await && user.is_some();

    match user {
        Some(user) if password_ok => {
            let pair = tokens::issue_pair(&user, &state.config).map_err(|e| {
                tracing::error!("Failed to create token pair: {}", e);
                ApiError::Internal("Failed to create token".to_string())
            })?;
            tracing::info!(user_id = %user.id, "Successful login");
            Ok(Json(pair))
        }
        Some(user) => {
            tracing::warn!(user_id = %user.id, "Failed login attempt");
            Err(ApiError::Unauthorized(INVALID_CREDENTIALS_MESSAGE.to_string()))
        }
        None => {
            tracing::warn!("Login attempt for unknown email");
            Err(ApiError::Unauthorized(INVALID_CREDENTIALS_MESSAGE.to_string()))
        }
    }
}

/// POST /api/token/refresh
/// Trade a refresh token for a new access token
pub async fn refresh_token(
    State(state): State<AppState>,
    _caller: MaybeUser,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Json<AccessToken>, ApiError> {
    let mut f = Fields::new(&body);
    let refresh = f.required_text("refresh", 4096).unwrap_or_default();
    f.finish(())?;

    let user_id = tokens::verify(&refresh, TokenType::Refresh, &state.config)
        .and_then(|claims| claims.user_id())
        .map_err(|e| {
            tracing::debug!("Refresh token rejected: {}", e);
            ApiError::Unauthorized(INVALID_REFRESH_MESSAGE.to_string())
        })?;

    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_REFRESH_MESSAGE.to_string()))?;

    let access = tokens::issue_access(&user, &state.config).map_err(|e| {
        tracing::error!("Failed to create access token: {}", e);
        ApiError::Internal("Failed to create token".to_string())
    })?;

    Ok(Json(AccessToken { access }))
}
