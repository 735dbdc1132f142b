pub mod assignment;
pub mod attachment;
pub mod error;
pub mod form;
pub mod intent;
pub mod job;
pub mod page;
pub mod project;
pub mod schema;
pub mod todo;
pub mod user;

pub use assignment::{AssignUser, Assignment};
pub use attachment::{Attachment, NewAttachment};
pub use error::FormError;
pub use form::{FileBlob, FormSubmission, FormValue};
pub use intent::{AttachmentIntent, Intent, ProjectIntent, TodoIntent, UserIntent};
pub use job::{Job, JobRecord, JobStatus};
pub use page::{Page, PageRequest};
pub use project::{Color, Project};
pub use schema::{FieldErrors, Schema, Validated};
pub use todo::{Priority, Todo, TodoPatch};
pub use user::{Actor, Role, Session, User};
