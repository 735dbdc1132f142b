use axum::response::Redirect;

use trellis_core::intent::read_intent;
use trellis_core::user::{self, normalize_roles, CreateUser, DeleteUser, NewUser, UpdateUser, UserPatch};
use trellis_core::{FormSubmission, Role, UserIntent};
use trellis_db::DbError;

use super::{see_other, validate, ActionContext};
use crate::auth::hash_password;
use crate::error::ActionError;

const USERS_PAGE: &str = "/admin/users";

/// `POST /admin/users`. Admins only, checked before the intent is read.
pub async fn dispatch(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    if !ctx.actor.is_admin() {
        return Err(ActionError::Forbidden);
    }
    match read_intent::<UserIntent>(form)? {
        UserIntent::Create => create(ctx, form).await,
        UserIntent::Update => update(ctx, form).await,
        UserIntent::Delete => delete(ctx, form).await,
    }
}

fn email_taken() -> ActionError {
    ActionError::field("email", "Email already in use")
}

async fn create(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    let input: CreateUser = validate(user::create_schema(), form)?.input;
    if ctx.db.find_user_by_email(&input.email).await?.is_some() {
        return Err(email_taken());
    }

    let new = NewUser {
        name: input.name,
        email: input.email,
        password_hash: hash_password(&input.password).await?,
        roles: normalize_roles(input.roles),
    };
    let created = match ctx.db.create_user(&new).await {
        Ok(u) => u,
        Err(DbError::Conflict(_)) => return Err(email_taken()),
        Err(e) => return Err(e.into()),
    };
    tracing::info!(user_id = %created.id, by = %ctx.actor.user_id, "user created");

    Ok(see_other(USERS_PAGE))
}

async fn update(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    let input: UpdateUser = validate(user::update_schema(), form)?.input;
    ctx.db.get_user(&input.id).await?;

    if ctx.is(&input.id) && !input.roles.contains(&Role::Admin) {
        return Err(ActionError::field(
            "roles",
            "You cannot remove your own admin role",
        ));
    }
    if let Some(other) = ctx.db.find_user_by_email(&input.email).await? {
        if other.id != input.id {
            return Err(email_taken());
        }
    }

    let password_hash = match input.password.as_deref() {
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };
    let patch = UserPatch {
        name: Some(input.name),
        email: Some(input.email),
        password_hash,
        roles: Some(normalize_roles(input.roles)),
    };
    match ctx.db.update_user(&input.id, &patch).await {
        Ok(_) => {}
        Err(DbError::Conflict(_)) => return Err(email_taken()),
        Err(e) => return Err(e.into()),
    }

    Ok(see_other(USERS_PAGE))
}

async fn delete(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    let input: DeleteUser = validate(user::delete_schema(), form)?.input;
    if ctx.is(&input.id) {
        return Err(ActionError::field("id", "You cannot delete your own account"));
    }
    ctx.db.delete_user(&input.id).await?;
    tracing::info!(user_id = %input.id, by = %ctx.actor.user_id, "user deleted");
    Ok(see_other(USERS_PAGE))
}
