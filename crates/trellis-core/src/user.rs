use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{Field, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub const ALL: &[Role] = &[Role::User, Role::Admin];

    pub const NAMES: &'static [&'static str] = &["user", "admin"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sorted, deduplicated role set.
pub fn normalize_roles(mut roles: Vec<Role>) -> Vec<Role> {
    roles.sort();
    roles.dedup();
    roles
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
}

/// Stored-side user update. `password_hash: None` keeps the current hash.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub roles: Option<Vec<Role>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUser {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteUser {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

/// The signed-in identity a request acts as. Built from the session only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }
}

impl From<&User> for Actor {
    fn from(u: &User) -> Self {
        Actor {
            user_id: u.id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            roles: u.roles.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

pub fn create_schema() -> Schema {
    Schema::object([
        Field::text("name")
            .min(1, "Name is required")
            .max(100, "Name too long"),
        Field::text("email").email("Invalid email"),
        Field::text("password").min(6, "Password must be at least 6 characters"),
        Field::choice("roles", Role::NAMES)
            .list()
            .min(1, "At least one role required"),
    ])
}

pub fn update_schema() -> Schema {
    Schema::object([
        Field::text("id").min(1, "Required"),
        Field::text("name")
            .min(1, "Name is required")
            .max(100, "Name too long"),
        Field::text("email").email("Invalid email"),
        Field::text("password")
            .min(6, "Password must be at least 6 characters")
            .optional()
            .empty_as_absent(),
        Field::choice("roles", Role::NAMES)
            .list()
            .min(1, "At least one role required"),
    ])
}

pub fn delete_schema() -> Schema {
    Schema::object([Field::text("id").min(1, "Required")])
}

pub fn sign_in_schema() -> Schema {
    Schema::object([
        Field::text("email").email("Invalid email"),
        Field::text("password").min(1, "Password is required"),
    ])
}
