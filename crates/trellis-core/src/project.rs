use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{double_option, Field, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    #[default]
    Blue,
    Green,
    Red,
    Yellow,
    Purple,
    Gray,
}

impl Color {
    pub const ALL: &[Color] = &[
        Color::Blue,
        Color::Green,
        Color::Red,
        Color::Yellow,
        Color::Purple,
        Color::Gray,
    ];

    pub const NAMES: &'static [&'static str] =
        &["blue", "green", "red", "yellow", "purple", "gray"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Red => "red",
            Color::Yellow => "yellow",
            Color::Purple => "purple",
            Color::Gray => "gray",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "blue" => Some(Color::Blue),
            "green" => Some(Color::Green),
            "red" => Some(Color::Red),
            "yellow" => Some(Color::Yellow),
            "purple" => Some(Color::Purple),
            "gray" => Some(Color::Gray),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: Color,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Color,
}

/// Partial update: `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub id: i64,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub color: Option<Color>,
}

impl UpdateProject {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.color.is_none()
    }
}

pub fn create_schema() -> Schema {
    Schema::object([
        Field::text("name")
            .min(1, "Name is required")
            .max(100, "Name too long"),
        Field::text("description")
            .max(500, "Description too long")
            .optional()
            .empty_as_absent(),
        Field::choice("color", Color::NAMES).default_value("blue"),
    ])
}

pub fn update_schema() -> Schema {
    Schema::object([
        Field::integer("id"),
        Field::text("name")
            .min(1, "Name is required")
            .max(100, "Name too long")
            .optional(),
        Field::text("description")
            .max(500, "Description too long")
            .optional()
            .empty_as_null(),
        Field::choice("color", Color::NAMES).optional(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormSubmission;

    #[test]
    fn color_names_match_variants() {
        for (color, name) in Color::ALL.iter().zip(Color::NAMES) {
            assert_eq!(color.as_str(), *name);
            assert_eq!(Color::parse_str(name), Some(*color));
        }
        assert_eq!(Color::parse_str("mauve"), None);
    }

    #[test]
    fn create_defaults_color_to_blue() {
        let form = FormSubmission::new().with("name", "Home");
        let parsed = create_schema().parse::<CreateProject>(&form).unwrap();
        assert_eq!(parsed.input.name, "Home");
        assert_eq!(parsed.input.color, Color::Blue);
        assert_eq!(parsed.input.description, None);
    }

    #[test]
    fn create_rejects_long_name() {
        let form = FormSubmission::new().with("name", "x".repeat(101));
        let errors = create_schema().parse::<CreateProject>(&form).unwrap_err();
        assert_eq!(errors.get("name"), Some(&["Name too long".to_string()][..]));
    }

    #[test]
    fn update_only_carries_submitted_fields() {
        let form = FormSubmission::new().with("id", "3").with("color", "red");
        let parsed = update_schema().parse::<UpdateProject>(&form).unwrap();
        assert_eq!(parsed.input.id, 3);
        assert_eq!(parsed.input.color, Some(Color::Red));
        assert!(parsed.input.name.is_none());
        assert!(parsed.input.description.is_none());

        let form = FormSubmission::new().with("id", "3").with("description", "");
        let parsed = update_schema().parse::<UpdateProject>(&form).unwrap();
        assert_eq!(parsed.input.description, Some(None));
    }
}
