//! Typed payloads, one per resource kind.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::fields::Fields;
use crate::error::FieldError;

const SHORT: usize = 200;
const LONG: usize = 20_000;

/// Facts about a payload that live outside its JSON body.
pub trait Payload: Serialize {
    fn is_public(&self) -> bool {
        false
    }

    fn unique_slug(&self) -> Option<&str> {
        None
    }

    fn template(&self) -> Option<Uuid> {
        None
    }

    fn user(&self) -> Option<Uuid> {
        None
    }
}

/// Sanitize HTML content using ammonia
fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

#[derive(Debug, Serialize)]
pub struct ContactPayload {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
}

impl Payload for ContactPayload {}

pub fn contact(f: &mut Fields) -> ContactPayload {
    ContactPayload {
        full_name: f.required_text("full_name", SHORT).unwrap_or_default(),
        email: f.email("email", true).unwrap_or_default(),
        phone: f.optional_text("phone", 32),
        address: f.optional_text("address", 500),
        website: f.url("website", false),
        linkedin: f.url("linkedin", false),
        github: f.url("github", false),
    }
}

#[derive(Debug, Serialize)]
pub struct BlogPayload {
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub cover_image: Option<String>,
    pub published: bool,
}

impl Payload for BlogPayload {}

pub fn blog(f: &mut Fields) -> BlogPayload {
    BlogPayload {
        title: f.required_text("title", SHORT).unwrap_or_default(),
        content: f
            .required_text("content", LONG)
            .map(|c| sanitize_html(&c))
            .unwrap_or_default(),
        summary: f.optional_text("summary", 1000),
        cover_image: f.url("cover_image", false),
        published: f.flag("published").unwrap_or(false),
    }
}

#[derive(Debug, Serialize)]
pub struct SkillPayload {
    pub name: String,
    pub level: Option<i64>,
    pub category: Option<String>,
}

impl Payload for SkillPayload {}

pub fn skill(f: &mut Fields) -> SkillPayload {
    SkillPayload {
        name: f.required_text("name", 100).unwrap_or_default(),
        level: f.integer_in("level", 0..=100),
        category: f.optional_text("category", 100),
    }
}

#[derive(Debug, Serialize)]
pub struct WorkExperiencePayload {
    pub company: String,
    pub position: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub currently_working: bool,
    pub location: Option<String>,
    pub description: Option<String>,
}

impl Payload for WorkExperiencePayload {}

pub fn work_experience(f: &mut Fields) -> WorkExperiencePayload {
    let payload = WorkExperiencePayload {
        company: f.required_text("company", SHORT).unwrap_or_default(),
        position: f.required_text("position", SHORT).unwrap_or_default(),
        start_date: f.date("start_date", true),
        end_date: f.date("end_date", false),
        currently_working: f.flag("currently_working").unwrap_or(false),
        location: f.optional_text("location", SHORT),
        description: f.optional_text("description", LONG),
    };

    if let (Some(start), Some(end)) = (payload.start_date, payload.end_date) {
        if end < start {
            f.push(FieldError::invalid(
                "end_date",
                "End date cannot be before start date.",
            ));
        }
    }
    if payload.currently_working && payload.end_date.is_some() {
        f.push(FieldError::invalid(
            "end_date",
            "A current position cannot have an end date.",
        ));
    }
    payload
}

#[derive(Debug, Serialize)]
pub struct ServicePayload {
    pub title: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub is_public: bool,
}

impl Payload for ServicePayload {
    fn is_public(&self) -> bool {
        self.is_public
    }
}

pub fn service(f: &mut Fields) -> ServicePayload {
    ServicePayload {
        title: f.required_text("title", SHORT).unwrap_or_default(),
        description: f.optional_text("description", LONG),
        price: f.non_negative_number("price"),
        is_public: f.flag("is_public").unwrap_or(false),
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectPayload {
    pub title: String,
    pub description: Option<String>,
    pub technologies: Vec<String>,
    pub project_url: Option<String>,
    pub repository_url: Option<String>,
    pub image: Option<String>,
}

impl Payload for ProjectPayload {}

pub fn project(f: &mut Fields) -> ProjectPayload {
    ProjectPayload {
        title: f.required_text("title", SHORT).unwrap_or_default(),
        description: f.optional_text("description", LONG),
        technologies: f.string_list("technologies"),
        project_url: f.url("project_url", false),
        repository_url: f.url("repository_url", false),
        image: f.url("image", false),
    }
}

#[derive(Debug, Serialize)]
pub struct TemplatePayload {
    pub name: String,
    pub description: Option<String>,
    pub preview_image: Option<String>,
    pub category: Option<String>,
}

impl Payload for TemplatePayload {}

pub fn template(f: &mut Fields) -> TemplatePayload {
    TemplatePayload {
        name: f.required_text("name", SHORT).unwrap_or_default(),
        description: f.optional_text("description", LONG),
        preview_image: f.url("preview_image", false),
        category: f.optional_text("category", 100),
    }
}

#[derive(Debug, Serialize)]
pub struct TemplatePortfolioPayload {
    pub template: Option<Uuid>,
    pub title: String,
    pub unique_slug: String,
    pub is_public: bool,
    pub content: Map<String, Value>,
}

impl Payload for TemplatePortfolioPayload {
    fn is_public(&self) -> bool {
        self.is_public
    }

    fn unique_slug(&self) -> Option<&str> {
        Some(&self.unique_slug)
    }

    fn template(&self) -> Option<Uuid> {
        self.template
    }
}

pub fn template_portfolio(f: &mut Fields) -> TemplatePortfolioPayload {
    TemplatePortfolioPayload {
        template: f.id("template", true),
        title: f.required_text("title", SHORT).unwrap_or_default(),
        unique_slug: f.slug("unique_slug", true).unwrap_or_default(),
        is_public: f.flag("is_public").unwrap_or(false),
        content: f.object("content").unwrap_or_default(),
    }
}

#[derive(Debug, Serialize)]
pub struct SelectTemplatePayload {
    pub user: Option<Uuid>,
    pub template: Option<Uuid>,
}

impl Payload for SelectTemplatePayload {
    fn template(&self) -> Option<Uuid> {
        self.template
    }

    fn user(&self) -> Option<Uuid> {
        self.user
    }
}

pub fn select_template(f: &mut Fields) -> SelectTemplatePayload {
    SelectTemplatePayload {
        user: f.id("user", true),
        template: f.id("template", true),
    }
}

#[derive(Debug, Serialize)]
pub struct UploadPortfolioPayload {
    pub title: String,
    pub file_url: String,
    pub description: Option<String>,
}

impl Payload for UploadPortfolioPayload {}

pub fn upload_portfolio(f: &mut Fields) -> UploadPortfolioPayload {
    UploadPortfolioPayload {
        title: f.required_text("title", SHORT).unwrap_or_default(),
        file_url: f.url("file_url", true).unwrap_or_default(),
        description: f.optional_text("description", LONG),
    }
}

#[derive(Debug, Serialize)]
pub struct DraftPortfolioPayload {
    pub title: String,
    pub template: Option<Uuid>,
    pub content: Map<String, Value>,
}

impl Payload for DraftPortfolioPayload {
    fn template(&self) -> Option<Uuid> {
        self.template
    }
}

pub fn draft_portfolio(f: &mut Fields) -> DraftPortfolioPayload {
    DraftPortfolioPayload {
        title: f.required_text("title", SHORT).unwrap_or_default(),
        template: f.id("template", false),
        content: f.object("content").unwrap_or_default(),
    }
}
