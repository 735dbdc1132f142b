pub mod assignments;
pub mod attachments;
pub mod jobs;
pub mod projects;
pub mod sessions;
pub mod todos;
pub mod users;
