//! PostgreSQL store backed by a `sqlx` pool.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::db::models::{NewRecord, NewRole, NewUser, Record, Role, User};
use crate::policy::ListScope;
use crate::resources::ResourceKind;

const USER_SELECT: &str = r#"
    SELECT id, email, username, password_hash, first_name, last_name, phone, bio,
           profile_image, role_id, is_verified, is_staff, otp_code, otp_expires_at,
           created_at, updated_at
    FROM users
"#;

const RECORD_SELECT: &str = r#"
    SELECT r.id, r.kind, r.created_by, r.is_public, r.unique_slug, r.data,
           r.created_at, r.updated_at
    FROM records r
"#;

#[derive(Debug, FromRow)]
struct RecordRow {
    id: Uuid,
    kind: String,
    created_by: Uuid,
    is_public: bool,
    unique_slug: Option<String>,
    data: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for Record {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse::<ResourceKind>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Record {
            id: row.id,
            kind,
            created_by: row.created_by,
            is_public: row.is_public,
            unique_slug: row.unique_slug,
            data: row.data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_records(rows: Vec<RecordRow>) -> StoreResult<Vec<Record>> {
    rows.into_iter().map(Record::try_from).collect()
}

/// Turn unique violations into `Conflict` naming the field behind the constraint.
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some("idx_users_email_lower") => "email",
                Some("users_username_key") => "username",
                Some("roles_name_key") => "name",
                Some("idx_records_owner_slug") => "unique_slug",
                _ => "non_field_errors",
            };
            return StoreError::Conflict(field.to_string());
        }
    }
    StoreError::Database(e)
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn insert_user(&self, new: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, username, password_hash, first_name, last_name, phone,
                               role_id, is_verified, is_staff, otp_code, otp_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, email, username, password_hash, first_name, last_name, phone, bio,
                      profile_image, role_id, is_verified, is_staff, otp_code, otp_expires_at,
                      created_at, updated_at
            "#,
        )
        .bind(&new.email)
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.phone)
        .bind(new.role_id)
        .bind(new.is_verified)
        .bind(new.is_staff)
        .bind(&new.otp_code)
        .bind(new.otp_expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("{USER_SELECT} WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("{USER_SELECT} WHERE LOWER(email) = LOWER($1)");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("{USER_SELECT} WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self, scope: ListScope) -> StoreResult<Vec<User>> {
        let users = match scope {
            ListScope::All => {
                let sql = format!("{USER_SELECT} ORDER BY created_at, id");
                sqlx::query_as::<_, User>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
            ListScope::Owner(id) => {
                let sql = format!("{USER_SELECT} WHERE id = $1");
                sqlx::query_as::<_, User>(&sql)
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(users)
    }

    async fn save_user(&self, user: &User) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = $2, username = $3, password_hash = $4, first_name = $5,
                last_name = $6, phone = $7, bio = $8, profile_image = $9, role_id = $10,
                is_verified = $11, is_staff = $12, otp_code = $13, otp_expires_at = $14,
                updated_at = now()
            WHERE id = $1
            RETURNING id, email, username, password_hash, first_name, last_name, phone, bio,
                      profile_image, role_id, is_verified, is_staff, otp_code, otp_expires_at,
                      created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(&user.bio)
        .bind(&user.profile_image)
        .bind(user.role_id)
        .bind(user.is_verified)
        .bind(user.is_staff)
        .bind(&user.otp_code)
        .bind(user.otp_expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_role(&self, new: NewRole) -> StoreResult<Role> {
        sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn find_role(&self, id: Uuid) -> StoreResult<Option<Role>> {
        Ok(sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at FROM roles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        Ok(sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        Ok(sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at FROM roles ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn save_role(&self, role: &Role) -> StoreResult<Role> {
        sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles SET name = $2, description = $3
            WHERE id = $1
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.description)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn delete_role(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_record(&self, new: NewRecord) -> StoreResult<Record> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            INSERT INTO records (kind, created_by, is_public, unique_slug, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, kind, created_by, is_public, unique_slug, data, created_at, updated_at
            "#,
        )
        .bind(new.kind.as_str())
        .bind(new.created_by)
        .bind(new.is_public)
        .bind(&new.unique_slug)
        .bind(&new.data)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;
        row.try_into()
    }

    async fn find_record(&self, kind: ResourceKind, id: Uuid) -> StoreResult<Option<Record>> {
        let sql = format!("{RECORD_SELECT} WHERE r.kind = $1 AND r.id = $2");
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(kind.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Record::try_from).transpose()
    }

    async fn list_records(&self, kind: ResourceKind, scope: ListScope) -> StoreResult<Vec<Record>> {
        let rows = match scope {
            ListScope::All => {
                let sql = format!("{RECORD_SELECT} WHERE r.kind = $1 ORDER BY r.created_at, r.id");
                sqlx::query_as::<_, RecordRow>(&sql)
                    .bind(kind.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            ListScope::Owner(owner) => {
                let sql = format!(
                    "{RECORD_SELECT} WHERE r.kind = $1 AND r.created_by = $2 ORDER BY r.created_at, r.id"
                );
                sqlx::query_as::<_, RecordRow>(&sql)
                    .bind(kind.as_str())
                    .bind(owner)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        into_records(rows)
    }

    async fn save_record(&self, record: &Record) -> StoreResult<Record> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            UPDATE records
            SET created_by = $3, is_public = $4, unique_slug = $5, data = $6, updated_at = now()
            WHERE kind = $1 AND id = $2
            RETURNING id, kind, created_by, is_public, unique_slug, data, created_at, updated_at
            "#,
        )
        .bind(record.kind.as_str())
        .bind(record.id)
        .bind(record.created_by)
        .bind(record.is_public)
        .bind(&record.unique_slug)
        .bind(&record.data)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;
        row.try_into()
    }

    async fn delete_record(&self, kind: ResourceKind, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM records WHERE kind = $1 AND id = $2")
            .bind(kind.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_portfolio_by_slug(&self, username: &str, slug: &str) -> StoreResult<Option<Record>> {
        let sql = format!(
            "{RECORD_SELECT} JOIN users u ON u.id = r.created_by \
             WHERE r.kind = $1 AND u.username = $2 AND r.unique_slug = $3"
        );
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(ResourceKind::TemplatePortfolio.as_str())
            .bind(username)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Record::try_from).transpose()
    }

    async fn slug_taken(&self, owner: Uuid, slug: &str, exclude: Option<Uuid>) -> StoreResult<bool> {
        let (taken,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM records
                WHERE kind = $1 AND created_by = $2 AND unique_slug = $3
                  AND ($4::uuid IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(ResourceKind::TemplatePortfolio.as_str())
        .bind(owner)
        .bind(slug)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn ping(&self) -> StoreResult<Duration> {
        let start = Instant::now();
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(start.elapsed())
    }
}
