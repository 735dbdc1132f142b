use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{Field, Schema};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub todo_id: i64,
    pub user_id: String,
    pub assigned_by: String,
    pub created_at: DateTime<Utc>,
}

/// Payload of both `assignUser` and `unassignUser`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignUser {
    pub todo_id: i64,
    pub user_id: String,
}

pub fn assign_schema() -> Schema {
    Schema::object([
        Field::integer("todoId"),
        Field::text("userId").min(1, "User is required"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormSubmission;

    #[test]
    fn requires_user() {
        let form = FormSubmission::new().with("todoId", "1").with("userId", "");
        let errors = assign_schema().parse::<AssignUser>(&form).unwrap_err();
        assert_eq!(errors.get("userId"), Some(&["User is required".to_string()][..]));

        let form = FormSubmission::new().with("todoId", "1");
        let errors = assign_schema().parse::<AssignUser>(&form).unwrap_err();
        assert!(errors.get("userId").is_some());
    }

    #[test]
    fn parses() {
        let form = FormSubmission::new().with("todoId", "9").with("userId", "u-1");
        let parsed = assign_schema().parse::<AssignUser>(&form).unwrap().input;
        assert_eq!(parsed.todo_id, 9);
        assert_eq!(parsed.user_id, "u-1");
    }
}
