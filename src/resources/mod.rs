/*!
 * Portfolio Resources
 * Kinds of records the service stores, and validation of their payloads
 */
pub mod fields;
pub mod payloads;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::db::models::Record;
use crate::error::FieldError;
use fields::Fields;
use payloads::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Contact,
    Blog,
    Skill,
    WorkExperience,
    Service,
    Project,
    Template,
    TemplatePortfolio,
    SelectTemplate,
    UploadPortfolio,
    DraftPortfolio,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::Contact,
        ResourceKind::Blog,
        ResourceKind::Skill,
        ResourceKind::WorkExperience,
        ResourceKind::Service,
        ResourceKind::Project,
        ResourceKind::Template,
        ResourceKind::TemplatePortfolio,
        ResourceKind::SelectTemplate,
        ResourceKind::UploadPortfolio,
        ResourceKind::DraftPortfolio,
    ];

    /// Value of the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Contact => "contact",
            ResourceKind::Blog => "blog",
            ResourceKind::Skill => "skill",
            ResourceKind::WorkExperience => "work_experience",
            ResourceKind::Service => "service",
            ResourceKind::Project => "project",
            ResourceKind::Template => "template",
            ResourceKind::TemplatePortfolio => "template_portfolio",
            ResourceKind::SelectTemplate => "select_template",
            ResourceKind::UploadPortfolio => "upload_portfolio",
            ResourceKind::DraftPortfolio => "draft_portfolio",
        }
    }

    /// URL segment of the collection.
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Contact => "contacts",
            ResourceKind::Blog => "blogs",
            ResourceKind::Skill => "skills",
            ResourceKind::WorkExperience => "work-experience",
            ResourceKind::Service => "services",
            ResourceKind::Project => "projects",
            ResourceKind::Template => "templates",
            ResourceKind::TemplatePortfolio => "template-portfolios",
            ResourceKind::SelectTemplate => "select-templates",
            ResourceKind::UploadPortfolio => "upload-portfolios",
            ResourceKind::DraftPortfolio => "draft-portfolios",
        }
    }

    /// Kinds whose `is_public` flag opens anonymous reads.
    pub fn has_visibility(&self) -> bool {
        matches!(self, ResourceKind::Service | ResourceKind::TemplatePortfolio)
    }

    /// Shared catalog: readable by anyone, curated by staff.
    pub fn is_catalog(&self) -> bool {
        matches!(self, ResourceKind::Template)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// A payload that passed field validation, ready to be stored.
#[derive(Debug, Clone)]
pub struct Validated {
    pub data: Value,
    pub is_public: bool,
    pub unique_slug: Option<String>,
    /// Template the payload points at, checked for existence by the caller.
    pub template: Option<Uuid>,
    /// User the payload points at (select-template ownership).
    pub user: Option<Uuid>,
}

fn seal<P: Payload>(payload: P) -> Result<Validated, Vec<FieldError>> {
    let is_public = payload.is_public();
    let unique_slug = payload.unique_slug().map(str::to_string);
    let template = payload.template();
    let user = payload.user();
    let data = serde_json::to_value(&payload)
        .map_err(|e| vec![FieldError::invalid("non_field_errors", e.to_string())])?;
    Ok(Validated {
        data,
        is_public,
        unique_slug,
        template,
        user,
    })
}

fn check<P: Payload>(
    body: &Map<String, Value>,
    build: fn(&mut Fields) -> P,
) -> Result<Validated, Vec<FieldError>> {
    let mut f = Fields::new(body);
    let payload = build(&mut f);
    f.finish(payload).and_then(seal)
}

/// Validate a complete payload for `kind`.
pub fn validate(kind: ResourceKind, body: &Map<String, Value>) -> Result<Validated, Vec<FieldError>> {
    match kind {
        ResourceKind::Contact => check(body, payloads::contact),
        ResourceKind::Blog => check(body, payloads::blog),
        ResourceKind::Skill => check(body, payloads::skill),
        ResourceKind::WorkExperience => check(body, payloads::work_experience),
        ResourceKind::Service => check(body, payloads::service),
        ResourceKind::Project => check(body, payloads::project),
        ResourceKind::Template => check(body, payloads::template),
        ResourceKind::TemplatePortfolio => check(body, payloads::template_portfolio),
        ResourceKind::SelectTemplate => check(body, payloads::select_template),
        ResourceKind::UploadPortfolio => check(body, payloads::upload_portfolio),
        ResourceKind::DraftPortfolio => check(body, payloads::draft_portfolio),
    }
}

/// Overlay a partial update on the stored payload.
pub fn merge(existing: &Value, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = existing.as_object().cloned().unwrap_or_default();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Keep only the fields the public-update endpoint may change.
pub fn public_update_fields(patch: &Map<String, Value>) -> Result<Map<String, Value>, Vec<FieldError>> {
    let mut f = Fields::new(patch);
    let is_public = f.flag("is_public");
    let unique_slug = f.slug("unique_slug", false);

    if is_public.is_none() && unique_slug.is_none() && !f.has_error("unique_slug") && !f.has_error("is_public") {
        f.push(FieldError::invalid(
            "non_field_errors",
            "Provide is_public or unique_slug.",
        ));
    }

    let mut allowed = Map::new();
    if let Some(flag) = is_public {
        allowed.insert("is_public".to_string(), Value::Bool(flag));
    }
    if let Some(slug) = unique_slug {
        allowed.insert("unique_slug".to_string(), Value::String(slug));
    }
    f.finish(allowed)
}

#[derive(Debug, Serialize)]
struct RecordBody<'a> {
    id: Uuid,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(flatten)]
    data: &'a Map<String, Value>,
}

/// JSON representation of a record: envelope fields plus its payload.
pub fn record_json(record: &Record) -> Value {
    let empty = Map::new();
    let data = record.data.as_object().unwrap_or(&empty);
    serde_json::to_value(RecordBody {
        id: record.id,
        created_by: record.created_by,
        created_at: record.created_at,
        updated_at: record.updated_at,
        data,
    })
    .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_kind_round_trips_through_column_value() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>(), Ok(kind));
        }
        assert!("widget".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_only_service_and_template_portfolio_have_visibility() {
        let visible: Vec<_> = ResourceKind::ALL
            .into_iter()
            .filter(ResourceKind::has_visibility)
            .collect();
        assert_eq!(
            visible,
            vec![ResourceKind::Service, ResourceKind::TemplatePortfolio]
        );
    }

    #[test]
    fn test_validate_extracts_slug_and_visibility() {
        let template = Uuid::new_v4();
        let validated = validate(
            ResourceKind::TemplatePortfolio,
            &map(json!({
                "template": template.to_string(),
                "title": "My site",
                "unique_slug": "my-site",
                "is_public": true
            })),
        )
        .unwrap();
        assert!(validated.is_public);
        assert_eq!(validated.unique_slug.as_deref(), Some("my-site"));
        assert_eq!(validated.template, Some(template));
        assert_eq!(validated.data["title"], "My site");
    }

    #[test]
    fn test_merge_overlays_patch() {
        let merged = merge(
            &json!({ "name": "Rust", "level": 60 }),
            &map(json!({ "level": 90 })),
        );
        assert_eq!(merged["name"], "Rust");
        assert_eq!(merged["level"], 90);
    }

    #[test]
    fn test_public_update_strips_other_fields() {
        let allowed = public_update_fields(&map(json!({ "is_public": true, "title": "x" }))).unwrap();
        assert_eq!(allowed.len(), 1);
        assert!(public_update_fields(&map(json!({ "title": "x" }))).is_err());
        assert!(public_update_fields(&map(json!({ "unique_slug": "Bad Slug" }))).is_err());
    }
}
