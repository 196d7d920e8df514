//! In-memory store used when no database is configured, and by tests.

use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::db::models::{NewRecord, NewRole, NewUser, Record, Role, User};
use crate::db::DEFAULT_ROLES;
use crate::policy::ListScope;
use crate::resources::ResourceKind;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    roles: Vec<Role>,
    records: Vec<Record>,
}

/// Rows are kept in insertion order, which doubles as creation order.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the roles migrations would create.
    pub fn with_default_roles() -> Self {
        let now = Utc::now();
        let roles = DEFAULT_ROLES
            .iter()
            .map(|name| Role {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: None,
                created_at: now,
            })
            .collect();
        Self {
            tables: RwLock::new(Tables {
                roles,
                ..Tables::default()
            }),
        }
    }
}

fn email_conflict(users: &[User], email: &str, except: Option<Uuid>) -> bool {
    users
        .iter()
        .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
}

fn username_conflict(users: &[User], username: &str, except: Option<Uuid>) -> bool {
    users
        .iter()
        .any(|u| Some(u.id) != except && u.username == username)
}

fn slug_conflict(records: &[Record], owner: Uuid, slug: &str, except: Option<Uuid>) -> bool {
    records.iter().any(|r| {
        r.kind == ResourceKind::TemplatePortfolio
            && r.created_by == owner
            && Some(r.id) != except
            && r.unique_slug.as_deref() == Some(slug)
    })
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, new: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if email_conflict(&tables.users, &new.email, None) {
            return Err(StoreError::Conflict("email".to_string()));
        }
        if username_conflict(&tables.users, &new.username, None) {
            return Err(StoreError::Conflict("username".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            phone: new.phone,
            bio: None,
            profile_image: None,
            role_id: new.role_id,
            is_verified: new.is_verified,
            is_staff: new.is_staff,
            otp_code: new.otp_code,
            otp_expires_at: new.otp_expires_at,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self, scope: ListScope) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| scope.admits(u.id))
            .cloned()
            .collect())
    }

    async fn save_user(&self, user: &User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if email_conflict(&tables.users, &user.email, Some(user.id)) {
            return Err(StoreError::Conflict("email".to_string()));
        }
        if username_conflict(&tables.users, &user.username, Some(user.id)) {
            return Err(StoreError::Conflict("username".to_string()));
        }

        let Some(slot) = tables.users.iter_mut().find(|u| u.id == user.id) else {
            return Err(StoreError::Corrupt(format!("user {} vanished", user.id)));
        };
        let mut saved = user.clone();
        saved.created_at = slot.created_at;
        saved.updated_at = Utc::now();
        *slot = saved.clone();
        Ok(saved)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        let removed = tables.users.len() != before;
        if removed {
            tables.records.retain(|r| r.created_by != id);
        }
        Ok(removed)
    }

    async fn insert_role(&self, new: NewRole) -> StoreResult<Role> {
        let mut tables = self.tables.write().await;
        if tables.roles.iter().any(|r| r.name == new.name) {
            return Err(StoreError::Conflict("name".to_string()));
        }
        let role = Role {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            created_at: Utc::now(),
        };
        tables.roles.push(role.clone());
        Ok(role)
    }

    async fn find_role(&self, id: Uuid) -> StoreResult<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.iter().find(|r| r.id == id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.iter().find(|r| r.name == name).cloned())
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.clone())
    }

    async fn save_role(&self, role: &Role) -> StoreResult<Role> {
        let mut tables = self.tables.write().await;
        if tables
            .roles
            .iter()
            .any(|r| r.id != role.id && r.name == role.name)
        {
            return Err(StoreError::Conflict("name".to_string()));
        }
        let Some(slot) = tables.roles.iter_mut().find(|r| r.id == role.id) else {
            return Err(StoreError::Corrupt(format!("role {} vanished", role.id)));
        };
        slot.name = role.name.clone();
        slot.description = role.description.clone();
        Ok(slot.clone())
    }

    async fn delete_role(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.roles.len();
        tables.roles.retain(|r| r.id != id);
        let removed = tables.roles.len() != before;
        if removed {
            for user in tables.users.iter_mut().filter(|u| u.role_id == Some(id)) {
                user.role_id = None;
            }
        }
        Ok(removed)
    }

    async fn insert_record(&self, new: NewRecord) -> StoreResult<Record> {
        let mut tables = self.tables.write().await;
        if let Some(slug) = new.unique_slug.as_deref() {
            if new.kind == ResourceKind::TemplatePortfolio
                && slug_conflict(&tables.records, new.created_by, slug, None)
            {
                return Err(StoreError::Conflict("unique_slug".to_string()));
            }
        }

        let now = Utc::now();
        let record = Record {
            id: Uuid::new_v4(),
            kind: new.kind,
            created_by: new.created_by,
            is_public: new.is_public,
            unique_slug: new.unique_slug,
            data: new.data,
            created_at: now,
            updated_at: now,
        };
        tables.records.push(record.clone());
        Ok(record)
    }

    async fn find_record(&self, kind: ResourceKind, id: Uuid) -> StoreResult<Option<Record>> {
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .iter()
            .find(|r| r.kind == kind && r.id == id)
            .cloned())
    }

    async fn list_records(&self, kind: ResourceKind, scope: ListScope) -> StoreResult<Vec<Record>> {
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .iter()
            .filter(|r| r.kind == kind && scope.admits(r.created_by))
            .cloned()
            .collect())
    }

    async fn save_record(&self, record: &Record) -> StoreResult<Record> {
        let mut tables = self.tables.write().await;
        if let Some(slug) = record.unique_slug.as_deref() {
            if record.kind == ResourceKind::TemplatePortfolio
                && slug_conflict(&tables.records, record.created_by, slug, Some(record.id))
            {
                return Err(StoreError::Conflict("unique_slug".to_string()));
            }
        }

        let Some(slot) = tables
            .records
            .iter_mut()
            .find(|r| r.kind == record.kind && r.id == record.id)
        else {
            return Err(StoreError::Corrupt(format!("record {} vanished", record.id)));
        };
        slot.created_by = record.created_by;
        slot.is_public = record.is_public;
        slot.unique_slug = record.unique_slug.clone();
        slot.data = record.data.clone();
        slot.updated_at = Utc::now();
        Ok(slot.clone())
    }

    async fn delete_record(&self, kind: ResourceKind, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.records.len();
        tables.records.retain(|r| !(r.kind == kind && r.id == id));
        Ok(tables.records.len() != before)
    }

    async fn find_portfolio_by_slug(&self, username: &str, slug: &str) -> StoreResult<Option<Record>> {
        let tables = self.tables.read().await;
        let Some(owner) = tables.users.iter().find(|u| u.username == username) else {
            return Ok(None);
        };
        Ok(tables
            .records
            .iter()
            .find(|r| {
                r.kind == ResourceKind::TemplatePortfolio
                    && r.created_by == owner.id
                    && r.unique_slug.as_deref() == Some(slug)
            })
            .cloned())
    }

    async fn slug_taken(&self, owner: Uuid, slug: &str, exclude: Option<Uuid>) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(slug_conflict(&tables.records, owner, slug, exclude))
    }

    async fn ping(&self) -> StoreResult<Duration> {
        let start = Instant::now();
        let _tables = self.tables.read().await;
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            first_name: None,
            last_name: None,
            phone: None,
            role_id: None,
            is_verified: false,
            is_staff: false,
            otp_code: None,
            otp_expires_at: None,
        }
    }

    fn skill(owner: Uuid, name: &str) -> NewRecord {
        NewRecord {
            kind: ResourceKind::Skill,
            created_by: owner,
            is_public: false,
            unique_slug: None,
            data: json!({ "name": name }),
        }
    }

    #[tokio::test]
    async fn test_email_uniqueness_is_case_insensitive() {
        let store = MemoryStore::new();
        store.insert_user(new_user("ada@example.com", "ada")).await.unwrap();
        let err = store
            .insert_user(new_user("ADA@example.com", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(field) if field == "email"));
    }

    #[tokio::test]
    async fn test_list_records_respects_scope_and_order() {
        let store = MemoryStore::new();
        let a = store.insert_user(new_user("a@example.com", "aaa")).await.unwrap();
        let b = store.insert_user(new_user("b@example.com", "bbb")).await.unwrap();
        store.insert_record(skill(a.id, "first")).await.unwrap();
        store.insert_record(skill(b.id, "other")).await.unwrap();
        store.insert_record(skill(a.id, "second")).await.unwrap();

        let own = store
            .list_records(ResourceKind::Skill, ListScope::Owner(a.id))
            .await
            .unwrap();
        let names: Vec<_> = own.iter().map(|r| r.data["name"].clone()).collect();
        assert_eq!(names, vec![json!("first"), json!("second")]);

        let all = store
            .list_records(ResourceKind::Skill, ListScope::All)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(store
            .list_records(ResourceKind::Blog, ListScope::All)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_records() {
        let store = MemoryStore::new();
        let a = store.insert_user(new_user("a@example.com", "aaa")).await.unwrap();
        store.insert_record(skill(a.id, "rust")).await.unwrap();
        assert!(store.delete_user(a.id).await.unwrap());
        assert!(store
            .list_records(ResourceKind::Skill, ListScope::All)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_slug_unique_per_owner() {
        let store = MemoryStore::new();
        let a = store.insert_user(new_user("a@example.com", "aaa")).await.unwrap();
        let b = store.insert_user(new_user("b@example.com", "bbb")).await.unwrap();
        let portfolio = |owner| NewRecord {
            kind: ResourceKind::TemplatePortfolio,
            created_by: owner,
            is_public: true,
            unique_slug: Some("site".to_string()),
            data: json!({}),
        };

        let first = store.insert_record(portfolio(a.id)).await.unwrap();
        assert!(store.insert_record(portfolio(b.id)).await.is_ok());
        assert!(store.insert_record(portfolio(a.id)).await.is_err());

        assert!(store.slug_taken(a.id, "site", None).await.unwrap());
        assert!(!store.slug_taken(a.id, "site", Some(first.id)).await.unwrap());

        let found = store.find_portfolio_by_slug("aaa", "site").await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(first.id));
        assert!(store.find_portfolio_by_slug("zzz", "site").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_default_roles_seeded() {
        let store = MemoryStore::with_default_roles();
        assert!(store.find_role_by_name("user").await.unwrap().is_some());
        assert!(MemoryStore::new().find_role_by_name("user").await.unwrap().is_none());
    }
}
