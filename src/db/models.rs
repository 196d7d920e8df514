//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::resources::ResourceKind;

/// User model. Never serialized directly: it carries the password hash and
/// OTP digest. Responses go through `routes::users::UserProfile`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub role_id: Option<Uuid>,
    pub is_verified: bool,
    pub is_staff: bool,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user for insertion
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role_id: Option<Uuid>,
    pub is_verified: bool,
    pub is_staff: bool,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
}

/// Role model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// New role for insertion
#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
}

/// A stored portfolio resource. `data` is the validated payload of its kind;
/// `is_public` and `unique_slug` are copies kept as columns for lookups.
#[derive(Debug, Clone)]
pub struct Record {
    pub id: Uuid,
    pub kind: ResourceKind,
    pub created_by: Uuid,
    pub is_public: bool,
    pub unique_slug: Option<String>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New record for insertion
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub kind: ResourceKind,
    pub created_by: Uuid,
    pub is_public: bool,
    pub unique_slug: Option<String>,
    pub data: serde_json::Value,
}
