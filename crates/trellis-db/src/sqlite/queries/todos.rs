use chrono::Utc;
use rusqlite::{params, Row};

use trellis_core::todo::{CreateTodo, Priority, Todo, TodoFilter, TodoPatch};

use super::super::{NotFoundExt, SqliteDatabase, SqliteResultExt};
use crate::{DbError, Scope};

/// Visibility predicate over `todos t`; `?1` is the scoped user id or NULL.
/// A todo is visible to its creator, the project owner, and its assignees.
const VISIBLE: &str = "(?1 IS NULL
    OR t.owner_id = ?1
    OR EXISTS (SELECT 1 FROM projects p WHERE p.id = t.project_id AND p.owner_id = ?1)
    OR EXISTS (SELECT 1 FROM assignments a WHERE a.todo_id = t.id AND a.user_id = ?1))";

fn row_to_todo(row: &Row) -> rusqlite::Result<Todo> {
    let priority_str: String = row.get("priority")?;
    let completed: i64 = row.get("completed")?;
    Ok(Todo {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        owner_id: row.get("owner_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        completed: completed != 0,
        priority: Priority::parse_str(&priority_str).unwrap_or_default(),
        due_date: row.get("due_date")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_todo_sync(&self, owner_id: &str, input: &CreateTodo) -> Result<Todo, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "INSERT INTO todos (project_id, owner_id, title, description, completed, priority, due_date, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)
                 RETURNING *",
                params![
                    input.project_id,
                    owner_id,
                    input.title,
                    input.description,
                    input.priority.as_str(),
                    input.due_date,
                    Utc::now(),
                ],
                row_to_todo,
            )
            .to_db()
        })
    }

    pub fn get_todo_sync(&self, scope: &Scope, id: i64) -> Result<Todo, DbError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT t.* FROM todos t WHERE {VISIBLE} AND t.id = ?2");
            conn.query_row(&sql, params![scope.user_id(), id], row_to_todo)
                .or_not_found(|| format!("todo {id}"))
        })
    }

    pub fn list_todos_sync(&self, scope: &Scope, filter: &TodoFilter) -> Result<Vec<Todo>, DbError> {
        self.with_conn(|conn| {
            let mut sql = format!("SELECT t.* FROM todos t WHERE {VISIBLE}");
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
                vec![Box::new(scope.user_id().map(str::to_string))];

            if let Some(project_id) = filter.project_id {
                param_values.push(Box::new(project_id));
                sql.push_str(&format!(" AND t.project_id = ?{}", param_values.len()));
            }
            if let Some(completed) = filter.completed {
                param_values.push(Box::new(completed as i64));
                sql.push_str(&format!(" AND t.completed = ?{}", param_values.len()));
            }
            if let Some(priority) = filter.priority {
                param_values.push(Box::new(priority.as_str()));
                sql.push_str(&format!(" AND t.priority = ?{}", param_values.len()));
            }
            sql.push_str(" ORDER BY t.created_at DESC, t.id DESC");

            let params: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|b| b.as_ref()).collect();
            let mut stmt = conn.prepare(&sql).to_db()?;
            let todos = stmt
                .query_map(params.as_slice(), row_to_todo)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(todos)
        })
    }

    pub fn update_todo_sync(&self, id: i64, patch: &TodoPatch) -> Result<Todo, DbError> {
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(ref title) = patch.title {
                sets.push("title = ?");
                values.push(Box::new(title.clone()));
            }
            if let Some(ref description) = patch.description {
                sets.push("description = ?");
                values.push(Box::new(description.clone()));
            }
            if let Some(completed) = patch.completed {
                sets.push("completed = ?");
                values.push(Box::new(completed as i64));
            }
            if let Some(priority) = patch.priority {
                sets.push("priority = ?");
                values.push(Box::new(priority.as_str()));
            }
            if let Some(due_date) = patch.due_date {
                sets.push("due_date = ?");
                values.push(Box::new(due_date));
            }

            if sets.is_empty() {
                return conn
                    .query_row("SELECT * FROM todos WHERE id = ?1", params![id], row_to_todo)
                    .or_not_found(|| format!("todo {id}"));
            }

            values.push(Box::new(id));
            let sql = format!("UPDATE todos SET {} WHERE id = ? RETURNING *", sets.join(", "));
            let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
            conn.query_row(&sql, params.as_slice(), row_to_todo)
                .or_not_found(|| format!("todo {id}"))
        })
    }

    pub fn delete_todo_sync(&self, id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM todos WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("todo {id}")));
            }
            Ok(())
        })
    }
}
