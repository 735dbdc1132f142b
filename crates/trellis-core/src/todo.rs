use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{double_option, Field, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: &[Priority] = &[Priority::Low, Priority::Medium, Priority::High];

    pub const NAMES: &'static [&'static str] = &["low", "medium", "high"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub project_id: i64,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodo {
    pub project_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Quick update from the todo table: toggle completion or change priority.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTodo {
    pub id: i64,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
}

/// Full edit from the todo detail form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditTodo {
    pub id: i64,
    pub title: String,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub priority: Priority,
    pub completed: bool,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,
}

/// Partial update applied by the store. `None` leaves a column unchanged;
/// `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }
}

impl From<&UpdateTodo> for TodoPatch {
    fn from(u: &UpdateTodo) -> Self {
        TodoPatch {
            completed: u.completed,
            priority: u.priority,
            ..Default::default()
        }
    }
}

impl From<&EditTodo> for TodoPatch {
    fn from(e: &EditTodo) -> Self {
        TodoPatch {
            title: Some(e.title.clone()),
            description: e.description.clone(),
            completed: Some(e.completed),
            priority: Some(e.priority),
            due_date: e.due_date,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TodoFilter {
    pub project_id: Option<i64>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
}

pub fn create_schema() -> Schema {
    Schema::object([
        Field::integer("projectId"),
        Field::text("title")
            .min(1, "Title is required")
            .max(200, "Title too long"),
        Field::text("description")
            .max(1000, "Description too long")
            .optional()
            .empty_as_absent(),
        Field::choice("priority", Priority::NAMES).default_value("medium"),
        Field::date("dueDate").optional().empty_as_absent(),
    ])
}

pub fn update_schema() -> Schema {
    Schema::object([
        Field::integer("id"),
        Field::boolean("completed", "true").optional(),
        Field::choice("priority", Priority::NAMES).optional(),
    ])
}

pub fn edit_schema() -> Schema {
    Schema::object([
        Field::integer("id"),
        Field::text("title")
            .min(1, "Title is required")
            .max(200, "Title too long"),
        Field::text("description")
            .max(1000, "Description too long")
            .optional()
            .empty_as_null(),
        Field::choice("priority", Priority::NAMES),
        Field::boolean("completed", "on").default_value(false),
        Field::date("dueDate").optional().empty_as_null(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormSubmission;

    #[test]
    fn create_defaults() {
        let form = FormSubmission::new()
            .with("projectId", "7")
            .with("title", "Buy milk");
        let parsed = create_schema().parse::<CreateTodo>(&form).unwrap().input;
        assert_eq!(parsed.project_id, 7);
        assert_eq!(parsed.priority, Priority::Medium);
        assert_eq!(parsed.description, None);
        assert_eq!(parsed.due_date, None);
    }

    #[test]
    fn create_requires_title() {
        let form = FormSubmission::new().with("projectId", "7").with("title", "");
        let errors = create_schema().parse::<CreateTodo>(&form).unwrap_err();
        assert_eq!(errors.get("title"), Some(&["Title is required".to_string()][..]));
    }

    #[test]
    fn update_with_only_completed() {
        let form = FormSubmission::new()
            .with("id", "1")
            .with("completed", "true");
        let parsed = update_schema().parse::<UpdateTodo>(&form).unwrap().input;
        let patch = TodoPatch::from(&parsed);
        assert_eq!(
            patch,
            TodoPatch {
                completed: Some(true),
                ..Default::default()
            }
        );
    }

    #[test]
    fn edit_checkbox_absent_means_not_completed() {
        let form = FormSubmission::new()
            .with("id", "1")
            .with("title", "Renamed")
            .with("priority", "high")
            .with("dueDate", "");
        let parsed = edit_schema().parse::<EditTodo>(&form).unwrap().input;
        assert!(!parsed.completed);
        assert_eq!(parsed.due_date, Some(None));
        assert_eq!(parsed.description, None);

        let patch = TodoPatch::from(&parsed);
        assert_eq!(patch.title.as_deref(), Some("Renamed"));
        assert_eq!(patch.priority, Some(Priority::High));
        assert_eq!(patch.description, None);
    }

    #[test]
    fn priority_round_trips_names() {
        for (p, name) in Priority::ALL.iter().zip(Priority::NAMES) {
            assert_eq!(Priority::parse_str(name), Some(*p));
        }
    }
}
