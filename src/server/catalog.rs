//! In-memory course and resource catalogs standing in for the document store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::gate::{require_text, EntityLoader, OwnedEntity, Validate};

pub const COURSE_CATEGORIES: &[&str] = &[
    "Quran Studies", "Hadith Studies", "Arabic Language", "Fiqh Studies", "Islamic History",
    "Statistics", "English", "Computer Science", "Mathematics", "Programming", "Other",
];
pub const COURSE_LEVELS: &[&str] = &["Beginner", "Intermediate", "Advanced"];
pub const RESOURCE_CATEGORIES: &[&str] = &["faith", "other", "academic", "technical", "general"];
pub const RESOURCE_TYPES: &[&str] = &["pdf", "video", "audio", "document", "link", "course-material", "ebook"];

pub trait Keyed {
    fn key(&self) -> &str;
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn check_choice(errors: &mut Vec<FieldError>, field: &str, value: &str, allowed: &[&str]) {
    if !allowed.contains(&value) {
        errors.push(FieldError::new(field, format!("'{}' is not one of: {}", value, allowed.join(", "))));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub level: String,
    pub instructor: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Keyed for Course {
    fn key(&self) -> &str { &self.id }
}

impl OwnedEntity for Course {
    fn owner_field(&self, field: &str) -> Option<&str> {
        match field {
            "instructor" => Some(&self.instructor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub category: String,
    pub level: String,
    #[serde(default)]
    pub published: bool,
}

impl Validate for NewCourse {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "title", &self.title, "Course title", 200);
        require_text(&mut errors, "description", &self.description, "Course description", 1000);
        check_choice(&mut errors, "category", &self.category, COURSE_CATEGORIES);
        check_choice(&mut errors, "level", &self.level, COURSE_LEVELS);
        errors
    }
}

impl NewCourse {
    pub fn into_course(self, instructor: &str) -> Course {
        let now = Utc::now();
        Course {
            id: new_id(),
            title: self.title.trim().to_string(),
            description: self.description,
            category: self.category,
            level: self.level,
            instructor: instructor.to_string(),
            published: self.published,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; the instructor field is deliberately not patchable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    pub published: Option<bool>,
}

impl Validate for CourseUpdate {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let Some(t) = &self.title { require_text(&mut errors, "title", t, "Course title", 200); }
        if let Some(d) = &self.description { require_text(&mut errors, "description", d, "Course description", 1000); }
        if let Some(c) = &self.category { check_choice(&mut errors, "category", c, COURSE_CATEGORIES); }
        if let Some(l) = &self.level { check_choice(&mut errors, "level", l, COURSE_LEVELS); }
        errors
    }
}

impl CourseUpdate {
    pub fn apply(self, course: &mut Course) {
        if let Some(t) = self.title { course.title = t.trim().to_string(); }
        if let Some(d) = self.description { course.description = d; }
        if let Some(c) = self.category { course.category = c; }
        if let Some(l) = self.level { course.level = l; }
        if let Some(p) = self.published { course.published = p; }
        course.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub author: Option<String>,
    #[serde(default)]
    pub liked_by: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Keyed for Resource {
    fn key(&self) -> &str { &self.id }
}

impl OwnedEntity for Resource {
    fn owner_field(&self, field: &str) -> Option<&str> {
        match field {
            "author" => self.author.as_deref(),
            _ => None,
        }
    }
}

impl Resource {
    pub fn new(title: &str, description: &str, category: &str, kind: &str, author: Option<&str>) -> Self {
        Self {
            id: new_id(),
            title: title.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            kind: kind.to_string(),
            author: author.map(str::to_string),
            liked_by: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Returns true when the user now likes the resource.
    pub fn toggle_like(&mut self, user_id: &str) -> bool {
        if let Some(pos) = self.liked_by.iter().position(|u| u == user_id) {
            self.liked_by.remove(pos);
            false
        } else {
            self.liked_by.push(user_id.to_string());
            true
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl Validate for ResourceUpdate {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let Some(t) = &self.title { require_text(&mut errors, "title", t, "Resource title", 200); }
        if let Some(d) = &self.description { require_text(&mut errors, "description", d, "Resource description", 500); }
        if let Some(c) = &self.category { check_choice(&mut errors, "category", c, RESOURCE_CATEGORIES); }
        if let Some(k) = &self.kind { check_choice(&mut errors, "type", k, RESOURCE_TYPES); }
        errors
    }
}

impl ResourceUpdate {
    pub fn apply(self, resource: &mut Resource) {
        if let Some(t) = self.title { resource.title = t.trim().to_string(); }
        if let Some(d) = self.description { resource.description = d; }
        if let Some(c) = self.category { resource.category = c; }
        if let Some(k) = self.kind { resource.kind = k; }
        resource.updated_at = Utc::now();
    }
}

/// Keyed in-memory collection.
#[derive(Debug)]
pub struct Catalog<E> {
    items: RwLock<HashMap<String, E>>,
}

impl<E> Default for Catalog<E> {
    fn default() -> Self {
        Self { items: RwLock::new(HashMap::new()) }
    }
}

impl<E: Clone + Keyed> Catalog<E> {
    pub fn new() -> Self { Self::default() }

    pub fn upsert(&self, item: E) {
        self.items.write().insert(item.key().to_string(), item);
    }

    pub fn get(&self, id: &str) -> Option<E> {
        self.items.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<E> {
        self.items.write().remove(id)
    }

    /// Read-modify-write under one lock; `None` when the id is unknown.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut E) -> R) -> Option<(E, R)> {
        let mut items = self.items.write();
        let item = items.get_mut(id)?;
        let r = f(item);
        Some((item.clone(), r))
    }

    pub fn list(&self) -> Vec<E> {
        let mut out: Vec<E> = self.items.read().values().cloned().collect();
        out.sort_by(|a, b| a.key().cmp(b.key()));
        out
    }
}

#[async_trait]
impl<E> EntityLoader<E> for Catalog<E>
where
    E: Clone + Keyed + Send + Sync + 'static,
{
    async fn load(&self, id: &str) -> anyhow::Result<Option<E>> {
        Ok(self.get(id))
    }
}
