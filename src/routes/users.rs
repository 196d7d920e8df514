/**
 * User Routes
 * The caller's own profile, and staff administration of accounts
 */
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::password;
use crate::db::models::{NewUser, User};
use crate::error::{ApiError, FieldError};
use crate::extract::{AuthUser, JsonBody, PathId};
use crate::policy::{self, Action, Target};
use crate::resources::fields::{is_valid_username, Fields};
use crate::routes::auth::{account_insert_error, read_account, DEFAULT_ROLE, MIN_PASSWORD_LENGTH};
use crate::state::AppState;

/// Fields only staff may set on an account.
const STAFF_FIELDS: [&str; 3] = ["is_staff", "is_verified", "role"];

/// Public view of a user: everything except credentials and OTP state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub role: Option<Uuid>,
    pub is_verified: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone: user.phone.clone(),
            bio: user.bio.clone(),
            profile_image: user.profile_image.clone(),
            role: user.role_id,
            is_verified: user.is_verified,
            is_staff: user.is_staff,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileUpdated {
    pub message: String,
    pub data: UserProfile,
}

/// Apply a partial update to `user`. Absent keys are left alone; `null` or
/// blank clears an optional field. Email is fixed at registration.
async fn apply_changes(
    state: &AppState,
    user: &mut User,
    body: &Map<String, Value>,
    staff: bool,
) -> Result<(), ApiError> {
    let mut f = Fields::new(body);

    if body.contains_key("username") {
        match f.required_text("username", 30) {
            Some(name) if !is_valid_username(&name) => f.push(FieldError::invalid(
                "username",
                "Enter a valid username. Use 3-30 letters, numbers, and . _ - characters.",
            )),
            Some(name) if name != user.username => {
                if state.store.find_user_by_username(&name).await?.is_some() {
                    f.push(FieldError::unique(
                        "username",
                        "A user with that username already exists.",
                    ));
                } else {
                    user.username = name;
                }
            }
            _ => {}
        }
    }
    if body.contains_key("first_name") {
        user.first_name = f.optional_text("first_name", 150);
    }
    if body.contains_key("last_name") {
        user.last_name = f.optional_text("last_name", 150);
    }
    if body.contains_key("phone") {
        user.phone = f.optional_text("phone", 20);
    }
    if body.contains_key("bio") {
        user.bio = f.optional_text("bio", 2000);
    }
    if body.contains_key("profile_image") {
        user.profile_image = f.url("profile_image", false);
    }
    let new_password = if body.contains_key("password") {
        f.password("password", MIN_PASSWORD_LENGTH)
    } else {
        None
    };

    if staff {
        if let Some(flag) = f.flag("is_staff") {
            user.is_staff = flag;
        }
        if let Some(flag) = f.flag("is_verified") {
            user.is_verified = flag;
        }
        if body.contains_key("role") {
            match f.id("role", false) {
                Some(id) => {
                    if state.store.find_role(id).await?.is_some() {
                        user.role_id = Some(id);
                    } else {
                        f.push(FieldError::invalid(
                            "role",
                            format!("Invalid pk \"{}\" - object does not exist.", id),
                        ));
                    }
                }
                None if !f.has_error("role") => user.role_id = None,
                None => {}
            }
        }
    } else {
        for field in STAFF_FIELDS {
            if body.contains_key(field) {
                f.push(FieldError::invalid(field, "Only staff may change this field."));
            }
        }
    }

    f.finish(())?;

    if let Some(plain) = new_password {
        user.password_hash = password::hash_password(plain, state.config.bcrypt_cost).await?;
    }
    Ok(())
}

async fn load_user(state: &AppState, id: Uuid) -> Result<User, ApiError> {
    state.store.find_user(id).await?.ok_or(ApiError::NotFound)
}

// ============================================================================
// Profile
// ============================================================================

/// GET /api/profile
pub async fn get_profile(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}

/// PUT|PATCH /api/profile
/// Partial update of the caller's own profile
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Json<ProfileUpdated>, ApiError> {
    let staff = user.is_staff;
    apply_changes(&state, &mut user, &body, staff).await?;
    let saved = state.store.save_user(&user).await?;
    tracing::info!(user_id = %saved.id, "Profile updated");

    Ok(Json(ProfileUpdated {
        message: "Profile updated successfully".to_string(),
        data: UserProfile::from(&saved),
    }))
}

// ============================================================================
// Users collection
// ============================================================================

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let requester = caller.requester();
    policy::authorize(Some(&requester), &Target::Users, Action::List)?;

    let users = state.store.list_users(policy::user_scope(&requester)).await?;
    Ok(Json(users.iter().map(UserProfile::from).collect()))
}

/// POST /api/users
/// Staff-created accounts skip OTP verification
pub async fn create_user(
    State(state): State<AppState>,
    caller: AuthUser,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    policy::authorize(Some(&caller.requester()), &Target::Users, Action::Create)?;

    let mut f = Fields::new(&body);
    let is_staff = f.flag("is_staff").unwrap_or(false);
    f.finish(())?;

    let account = read_account(state.store.as_ref(), &body).await?;
    let role = state.store.find_role_by_name(DEFAULT_ROLE).await?;
    let password_hash = password::hash_password(account.password, state.config.bcrypt_cost).await?;

    let user = state
        .store
        .insert_user(NewUser {
            email: account.email,
            username: account.username,
            password_hash,
            first_name: account.first_name,
            last_name: account.last_name,
            phone: account.phone,
            role_id: role.map(|r| r.id),
            is_verified: true,
            is_staff,
            otp_code: None,
            otp_expires_at: None,
        })
        .await
        .map_err(account_insert_error)?;

    tracing::info!(user_id = %user.id, created_by = %caller.0.id, "User created by staff");
    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

// ============================================================================
// Single user
// ============================================================================

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    caller: AuthUser,
    PathId(id): PathId,
) -> Result<Json<UserProfile>, ApiError> {
    let user = load_user(&state, id).await?;
    policy::authorize(Some(&caller.requester()), &Target::User(user.id), Action::Retrieve)?;
    Ok(Json(UserProfile::from(&user)))
}

/// PUT|PATCH /api/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    PathId(id): PathId,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Json<UserProfile>, ApiError> {
    let mut user = load_user(&state, id).await?;
    let requester = caller.requester();
    policy::authorize(Some(&requester), &Target::User(user.id), Action::Update)?;

    apply_changes(&state, &mut user, &body, requester.is_staff).await?;
    let saved = state.store.save_user(&user).await?;
    tracing::info!(user_id = %saved.id, updated_by = %requester.id, "User updated");
    Ok(Json(UserProfile::from(&saved)))
}

/// DELETE /api/users/{id}
/// Removes the account and every record it owns
pub async fn delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    PathId(id): PathId,
) -> Result<StatusCode, ApiError> {
    let user = load_user(&state, id).await?;
    let requester = caller.requester();
    policy::authorize(Some(&requester), &Target::User(user.id), Action::Delete)?;

    state.store.delete_user(user.id).await?;
    tracing::info!(user_id = %user.id, deleted_by = %requester.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::TestApp;
    use crate::store::Store;
    use axum::http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_profile_requires_authentication() {
        let app = TestApp::new();
        let (status, body) = app.get("/api/profile", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Authentication credentials were not provided.");

        let (status, body) = app.get("/api/profile", Some("not-a-token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn test_profile_update_is_partial() {
        let app = TestApp::new();
        let (user, token) = app.user("ada", false).await;

        let (status, body) = app
            .call(
                Method::PATCH,
                "/api/profile",
                Some(&token),
                Some(json!({ "bio": "Analyst", "first_name": "Ada" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Profile updated successfully");
        assert_eq!(body["data"]["bio"], "Analyst");
        assert_eq!(body["data"]["username"], "ada");
        assert!(body["data"].get("password_hash").is_none());

        let stored = app.store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.first_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_non_staff_cannot_promote_themselves() {
        let app = TestApp::new();
        let (user, token) = app.user("ada", false).await;

        let (status, body) = app
            .call(
                Method::PUT,
                "/api/profile",
                Some(&token),
                Some(json!({ "is_staff": true })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "is_staff");
        assert!(!app.store.find_user(user.id).await.unwrap().unwrap().is_staff);
    }

    #[tokio::test]
    async fn test_username_change_checks_uniqueness() {
        let app = TestApp::new();
        app.user("grace", false).await;
        let (_, token) = app.user("ada", false).await;

        let (status, body) = app
            .call(
                Method::PATCH,
                "/api/profile",
                Some(&token),
                Some(json!({ "username": "grace" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "username");
    }

    #[tokio::test]
    async fn test_user_list_is_staff_only() {
        let app = TestApp::new();
        let (_, user_token) = app.user("ada", false).await;
        let (_, staff_token) = app.user("root", true).await;

        let (status, _) = app.get("/api/users", Some(&user_token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.get("/api/users", Some(&staff_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_user_detail_is_self_or_staff() {
        let app = TestApp::new();
        let (ada, ada_token) = app.user("ada", false).await;
        let (_, grace_token) = app.user("grace", false).await;
        let (_, staff_token) = app.user("root", true).await;
        let uri = format!("/api/users/{}", ada.id);

        assert_eq!(app.get(&uri, Some(&ada_token)).await.0, StatusCode::OK);
        assert_eq!(app.get(&uri, Some(&grace_token)).await.0, StatusCode::FORBIDDEN);
        assert_eq!(app.get(&uri, Some(&staff_token)).await.0, StatusCode::OK);

        let missing = format!("/api/users/{}", Uuid::new_v4());
        assert_eq!(app.get(&missing, Some(&staff_token)).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_staff_creates_verified_user() {
        let app = TestApp::new();
        let (_, staff_token) = app.user("root", true).await;

        let (status, body) = app
            .post(
                "/api/users",
                Some(&staff_token),
                json!({ "email": "new@example.com", "username": "newbie", "password": "long-enough" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["is_verified"], true);
        assert_eq!(body["is_staff"], false);
        assert!(app.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_staff_can_grant_staff() {
        let app = TestApp::new();
        let (ada, _) = app.user("ada", false).await;
        let (_, staff_token) = app.user("root", true).await;

        let (status, body) = app
            .call(
                Method::PATCH,
                &format!("/api/users/{}", ada.id),
                Some(&staff_token),
                Some(json!({ "is_staff": true })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_staff"], true);
    }

    #[tokio::test]
    async fn test_delete_self_then_token_is_rejected() {
        let app = TestApp::new();
        let (ada, token) = app.user("ada", false).await;

        let (status, _) = app
            .call(Method::DELETE, &format!("/api/users/{}", ada.id), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app.get("/api/profile", Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
