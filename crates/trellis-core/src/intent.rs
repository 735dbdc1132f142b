//! Intent discriminators, one closed enum per resource endpoint.
//!
//! Every mutating form carries an `intent` field naming the operation. The
//! enums below are the complete set of operations each endpoint accepts;
//! handlers match on them exhaustively.

use serde::Deserialize;

use crate::error::FormError;
use crate::form::FormSubmission;
use crate::schema::{Field, Schema};

pub const INTENT_FIELD: &str = "intent";

pub trait Intent: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    /// Exact, case-sensitive match against the wire names.
    fn parse_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|i| i.as_str() == s)
    }
}

/// Read the discriminator. Follows the decoder: the first `intent` value wins.
pub fn read_intent<I: Intent>(submission: &FormSubmission) -> Result<I, FormError> {
    match submission.first_text(INTENT_FIELD) {
        None => Err(FormError::MissingIntent),
        Some(raw) => I::parse_str(raw).ok_or_else(|| FormError::UnknownIntent(raw.to_string())),
    }
}

macro_rules! intent_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl Intent for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

intent_enum! {
    /// `POST /projects`
    ProjectIntent {
        Create => "createProject",
        Update => "updateProject",
        Delete => "deleteProject",
    }
}

intent_enum! {
    /// `POST /todos`
    TodoIntent {
        Create => "createTodo",
        Update => "updateTodo",
        Edit => "editTodo",
        Delete => "deleteTodo",
        Assign => "assignUser",
        Unassign => "unassignUser",
    }
}

intent_enum! {
    /// `POST /attachments`
    AttachmentIntent {
        Upload => "uploadAttachment",
        Delete => "deleteAttachment",
    }
}

intent_enum! {
    /// `POST /admin/users`
    UserIntent {
        Create => "createUser",
        Update => "updateUser",
        Delete => "deleteUser",
    }
}

/// Payload of the integer-keyed delete intents.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ById {
    pub id: i64,
}

pub fn by_id_schema() -> Schema {
    Schema::object([Field::integer("id")])
}
