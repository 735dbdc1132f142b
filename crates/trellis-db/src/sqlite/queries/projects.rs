use chrono::Utc;
use rusqlite::{params, Row};

use trellis_core::project::{Color, CreateProject, Project, UpdateProject};

use super::super::{NotFoundExt, SqliteDatabase, SqliteResultExt};
use crate::{DbError, Scope};

pub(crate) fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
    let color_str: String = row.get("color")?;
    Ok(Project {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        color: Color::parse_str(&color_str).unwrap_or_default(),
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_project_sync(
        &self,
        owner_id: &str,
        input: &CreateProject,
    ) -> Result<Project, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "INSERT INTO projects (owner_id, name, description, color, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING *",
                params![
                    owner_id,
                    input.name,
                    input.description,
                    input.color.as_str(),
                    Utc::now()
                ],
                row_to_project,
            )
            .to_db()
        })
    }

    pub fn get_project_sync(&self, scope: &Scope, id: i64) -> Result<Project, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM projects
                 WHERE id = ?1 AND (?2 IS NULL OR owner_id = ?2)",
                params![id, scope.user_id()],
                row_to_project,
            )
            .or_not_found(|| format!("project {id}"))
        })
    }

    pub fn list_projects_sync(&self, scope: &Scope) -> Result<Vec<Project>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM projects
                     WHERE ?1 IS NULL OR owner_id = ?1
                     ORDER BY created_at DESC, id DESC",
                )
                .to_db()?;
            let projects = stmt
                .query_map(params![scope.user_id()], row_to_project)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(projects)
        })
    }

    pub fn update_project_sync(&self, update: &UpdateProject) -> Result<Project, DbError> {
        let id = update.id;
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(ref name) = update.name {
                sets.push("name = ?");
                values.push(Box::new(name.clone()));
            }
            if let Some(ref description) = update.description {
                sets.push("description = ?");
                values.push(Box::new(description.clone()));
            }
            if let Some(color) = update.color {
                sets.push("color = ?");
                values.push(Box::new(color.as_str()));
            }

            if sets.is_empty() {
                return conn
                    .query_row(
                        "SELECT * FROM projects WHERE id = ?1",
                        params![id],
                        row_to_project,
                    )
                    .or_not_found(|| format!("project {id}"));
            }

            values.push(Box::new(id));
            let sql = format!(
                "UPDATE projects SET {} WHERE id = ? RETURNING *",
                sets.join(", ")
            );
            let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
            conn.query_row(&sql, params.as_slice(), row_to_project)
                .or_not_found(|| format!("project {id}"))
        })
    }

    pub fn delete_project_sync(&self, id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM projects WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("project {id}")));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(db: &SqliteDatabase, owner: &str, name: &str) -> Project {
        db.create_project_sync(
            owner,
            &CreateProject {
                name: name.into(),
                description: None,
                color: Color::Green,
            },
        )
        .unwrap()
    }

    #[test]
    fn project_crud() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let project = make(&db, "u1", "Home");
        assert_eq!(project.name, "Home");
        assert_eq!(project.color, Color::Green);
        assert_eq!(project.owner_id, "u1");

        let fetched = db.get_project_sync(&Scope::All, project.id).unwrap();
        assert_eq!(fetched.id, project.id);

        db.delete_project_sync(project.id).unwrap();
        assert!(matches!(
            db.get_project_sync(&Scope::All, project.id),
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            db.delete_project_sync(project.id),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn scope_limits_visibility() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let mine = make(&db, "u1", "Mine");
        let theirs = make(&db, "u2", "Theirs");
        let me = Scope::User("u1".into());

        assert!(db.get_project_sync(&me, mine.id).is_ok());
        assert!(matches!(
            db.get_project_sync(&me, theirs.id),
            Err(DbError::NotFound(_))
        ));

        let listed: Vec<_> = db
            .list_projects_sync(&me)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(listed, vec![mine.id]);
        assert_eq!(db.list_projects_sync(&Scope::All).unwrap().len(), 2);
    }

    #[test]
    fn partial_update_touches_only_given_fields() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let project = db
            .create_project_sync(
                "u1",
                &CreateProject {
                    name: "Work".into(),
                    description: Some("desk stuff".into()),
                    color: Color::Blue,
                },
            )
            .unwrap();

        let updated = db
            .update_project_sync(&UpdateProject {
                id: project.id,
                color: Some(Color::Red),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.color, Color::Red);
        assert_eq!(updated.name, "Work");
        assert_eq!(updated.description.as_deref(), Some("desk stuff"));

        let cleared = db
            .update_project_sync(&UpdateProject {
                id: project.id,
                description: Some(None),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(cleared.description, None);
        assert_eq!(cleared.color, Color::Red);

        let missing = db.update_project_sync(&UpdateProject {
            id: 4242,
            name: Some("x".into()),
            ..Default::default()
        });
        assert!(matches!(missing, Err(DbError::NotFound(_))));
    }
}
