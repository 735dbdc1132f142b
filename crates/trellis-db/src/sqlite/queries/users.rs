use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use trellis_core::user::{normalize_roles, NewUser, Role, User, UserPatch};

use super::super::{NotFoundExt, SqliteDatabase, SqliteResultExt};
use crate::DbError;

pub(crate) fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    let roles_json: String = row.get("roles")?;
    let roles: Vec<Role> = serde_json::from_str(&roles_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        roles,
        created_at: row.get("created_at")?,
    })
}

fn roles_json(roles: &[Role]) -> Result<String, DbError> {
    serde_json::to_string(&normalize_roles(roles.to_vec()))
        .map_err(|e| DbError::Internal(e.to_string()))
}

impl SqliteDatabase {
    /// Fails with `Conflict` when the email is taken (case-insensitive).
    pub fn create_user_sync(&self, input: &NewUser) -> Result<User, DbError> {
        let roles = roles_json(&input.roles)?;
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            conn.query_row(
                "INSERT INTO users (id, name, email, password_hash, roles, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING *",
                params![
                    id,
                    input.name,
                    input.email,
                    input.password_hash,
                    roles,
                    Utc::now()
                ],
                row_to_user,
            )
            .to_db()
        })
    }

    pub fn get_user_sync(&self, id: &str) -> Result<User, DbError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
                .or_not_found(|| format!("user {id}"))
        })
    }

    pub fn find_user_by_email_sync(&self, email: &str) -> Result<Option<User>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM users WHERE email = ?1",
                params![email],
                row_to_user,
            )
            .optional()
            .to_db()
        })
    }

    pub fn list_users_sync(&self) -> Result<Vec<User>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM users ORDER BY created_at DESC, name")
                .to_db()?;
            let users = stmt
                .query_map([], row_to_user)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(users)
        })
    }

    pub fn update_user_sync(&self, id: &str, patch: &UserPatch) -> Result<User, DbError> {
        let roles = patch.roles.as_deref().map(roles_json).transpose()?;
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(ref name) = patch.name {
                sets.push("name = ?");
                values.push(Box::new(name.clone()));
            }
            if let Some(ref email) = patch.email {
                sets.push("email = ?");
                values.push(Box::new(email.clone()));
            }
            if let Some(ref password_hash) = patch.password_hash {
                sets.push("password_hash = ?");
                values.push(Box::new(password_hash.clone()));
            }
            if let Some(roles) = roles {
                sets.push("roles = ?");
                values.push(Box::new(roles));
            }

            if sets.is_empty() {
                return conn
                    .query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
                    .or_not_found(|| format!("user {id}"));
            }

            values.push(Box::new(id.to_string()));
            let sql = format!("UPDATE users SET {} WHERE id = ? RETURNING *", sets.join(", "));
            let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
            conn.query_row(&sql, params.as_slice(), row_to_user)
                .or_not_found(|| format!("user {id}"))
        })
    }

    pub fn delete_user_sync(&self, id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM users WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("user {id}")));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, roles: Vec<Role>) -> NewUser {
        NewUser {
            name: "Test".into(),
            email: email.into(),
            password_hash: "hash".into(),
            roles,
        }
    }

    #[test]
    fn user_crud() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let user = db
            .create_user_sync(&new_user("a@example.com", vec![Role::Admin, Role::User, Role::Admin]))
            .unwrap();
        assert_eq!(user.roles, vec![Role::User, Role::Admin]);
        assert_eq!(uuid::Uuid::parse_str(&user.id).unwrap().get_version_num(), 4);

        let by_email = db.find_user_by_email_sync("A@Example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(db.find_user_by_email_sync("nobody@example.com").unwrap().is_none());

        db.delete_user_sync(&user.id).unwrap();
        assert!(matches!(db.get_user_sync(&user.id), Err(DbError::NotFound(_))));
    }

    #[test]
    fn duplicate_email_conflicts() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.create_user_sync(&new_user("a@example.com", vec![Role::User])).unwrap();
        let err = db
            .create_user_sync(&new_user("A@EXAMPLE.COM", vec![Role::User]))
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[test]
    fn patch_keeps_password_when_absent() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let user = db.create_user_sync(&new_user("a@example.com", vec![Role::User])).unwrap();
        let updated = db
            .update_user_sync(
                &user.id,
                &UserPatch {
                    name: Some("Renamed".into()),
                    roles: Some(vec![Role::Admin]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.roles, vec![Role::Admin]);
        assert_eq!(updated.password_hash, "hash");
        assert_eq!(updated.email, "a@example.com");
    }

    #[test]
    fn update_to_taken_email_conflicts() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.create_user_sync(&new_user("a@example.com", vec![Role::User])).unwrap();
        let b = db.create_user_sync(&new_user("b@example.com", vec![Role::User])).unwrap();
        let err = db
            .update_user_sync(
                &b.id,
                &UserPatch {
                    email: Some("a@example.com".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }
}
