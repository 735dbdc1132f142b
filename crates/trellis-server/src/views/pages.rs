use std::fmt::Write;

use trellis_core::project::Color;
use trellis_core::{Actor, Attachment, Page, Priority, Project, Role, Todo, User};

use super::{html_escape, intent_form, layout, Column, Table};

fn color_options(selected: Color) -> String {
    Color::ALL
        .iter()
        .map(|c| {
            let sel = if *c == selected { " selected" } else { "" };
            format!(r#"<option value="{c}"{sel}>{c}</option>"#, c = c.as_str())
        })
        .collect()
}

fn priority_options(selected: Priority) -> String {
    Priority::ALL
        .iter()
        .map(|p| {
            let sel = if *p == selected { " selected" } else { "" };
            format!(
                r#"<option value="{}"{sel}>{}</option>"#,
                p.as_str(),
                p.display_name()
            )
        })
        .collect()
}

fn role_checkboxes(checked: &[Role]) -> String {
    Role::ALL
        .iter()
        .map(|r| {
            let on = if checked.contains(r) { " checked" } else { "" };
            format!(
                r#"<label><input type="checkbox" name="roles" value="{r}"{on}> {r}</label> "#,
                r = r.as_str()
            )
        })
        .collect()
}

pub fn sign_in(from: &str, error: Option<&str>) -> String {
    let error = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, html_escape(e)))
        .unwrap_or_default();
    let body = format!(
        r#"<h1>Sign in</h1>{error}<form method="post" action="/auth/signin">
<input type="hidden" name="from" value="{}">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Sign in</button></form>"#,
        html_escape(from)
    );
    layout("Sign in", None, &body)
}

pub fn projects(actor: &Actor, page: &Page<Project>) -> String {
    let table = Table::new("/")
        .empty_message("No projects yet.")
        .column(Column::html("Name", |p: &Project| {
            format!(r#"<a href="/projects/{}">{}</a>"#, p.id, html_escape(&p.name))
        }))
        .column(Column::text("Color", |p: &Project| p.color.to_string()))
        .column(Column::text("Description", |p: &Project| {
            p.description.clone().unwrap_or_default()
        }))
        .column(Column::text("Created", |p: &Project| {
            p.created_at.format("%Y-%m-%d").to_string()
        }))
        .column(Column::html("", |p: &Project| {
            intent_form("/projects", "deleteProject", &[("id", p.id.to_string())], "Delete")
        }));

    let body = format!(
        r#"<h1>Projects</h1>{}
<h2>New project</h2>
<form method="post" action="/projects"><input type="hidden" name="intent" value="createProject">
<label>Name <input name="name" required maxlength="100"></label>
<label>Description <input name="description" maxlength="500"></label>
<label>Color <select name="color">{}</select></label>
<button type="submit">Create</button></form>"#,
        table.render(page),
        color_options(Color::default())
    );
    layout("Projects", Some(actor), &body)
}

pub fn project(actor: &Actor, project: &Project, page: &Page<Todo>) -> String {
    let table = Table::new(format!("/projects/{}", project.id))
        .empty_message("No todos yet.")
        .column(Column::html("Title", |t: &Todo| {
            format!(r#"<a href="/todos/{}">{}</a>"#, t.id, html_escape(&t.title))
        }))
        .column(Column::text("Priority", |t: &Todo| t.priority.to_string()))
        .column(Column::text("Due", |t: &Todo| {
            t.due_date.map(|d| d.to_string()).unwrap_or_default()
        }))
        .column(Column::html("Done", |t: &Todo| {
            let (next, label) = if t.completed { ("false", "Reopen") } else { ("true", "Complete") };
            intent_form(
                "/todos",
                "updateTodo",
                &[("id", t.id.to_string()), ("completed", next.to_string())],
                label,
            )
        }))
        .column(Column::html("", |t: &Todo| {
            intent_form("/todos", "deleteTodo", &[("id", t.id.to_string())], "Delete")
        }));

    let description = project
        .description
        .as_deref()
        .map(|d| format!("<p>{}</p>", html_escape(d)))
        .unwrap_or_default();
    let body = format!(
        r#"<h1>{name}</h1>{description}{table}
<h2>New todo</h2>
<form method="post" action="/todos"><input type="hidden" name="intent" value="createTodo">
<input type="hidden" name="projectId" value="{id}">
<label>Title <input name="title" required maxlength="200"></label>
<label>Description <input name="description" maxlength="1000"></label>
<label>Priority <select name="priority">{priorities}</select></label>
<label>Due <input type="date" name="dueDate"></label>
<button type="submit">Add</button></form>
<h2>Edit project</h2>
<form method="post" action="/projects"><input type="hidden" name="intent" value="updateProject">
<input type="hidden" name="id" value="{id}">
<label>Name <input name="name" value="{name}" maxlength="100"></label>
<label>Description <input name="description" value="{raw_description}" maxlength="500"></label>
<label>Color <select name="color">{colors}</select></label>
<button type="submit">Save</button></form>"#,
        name = html_escape(&project.name),
        table = table.render(page),
        id = project.id,
        priorities = priority_options(Priority::default()),
        raw_description = html_escape(project.description.as_deref().unwrap_or_default()),
        colors = color_options(project.color),
    );
    layout(&project.name, Some(actor), &body)
}

pub struct TodoView<'a> {
    pub todo: &'a Todo,
    pub attachments: &'a [Attachment],
    pub assignees: &'a [User],
    /// Users the owner may assign. Empty for everyone else.
    pub candidates: &'a [User],
}

pub fn todo(actor: &Actor, view: &TodoView<'_>) -> String {
    let todo = view.todo;
    let is_owner = actor.user_id == todo.owner_id;
    let mut body = format!(
        r#"<p><a href="/projects/{}">Back to project</a></p><h1>{}</h1>"#,
        todo.project_id,
        html_escape(&todo.title)
    );

    let checked = if todo.completed { " checked" } else { "" };
    let _ = write!(
        body,
        r#"<form method="post" action="/todos"><input type="hidden" name="intent" value="editTodo">
<input type="hidden" name="id" value="{id}">
<label>Title <input name="title" value="{title}" required maxlength="200"></label>
<label>Description <textarea name="description" maxlength="1000">{description}</textarea></label>
<label>Priority <select name="priority">{priorities}</select></label>
<label>Due <input type="date" name="dueDate" value="{due}"></label>
<label><input type="checkbox" name="completed"{checked}> Completed</label>
<button type="submit">Save</button></form>"#,
        id = todo.id,
        title = html_escape(&todo.title),
        description = html_escape(todo.description.as_deref().unwrap_or_default()),
        priorities = priority_options(todo.priority),
        due = todo.due_date.map(|d| d.to_string()).unwrap_or_default(),
    );

    body.push_str("<h2>Attachments</h2><ul>");
    for a in view.attachments {
        let thumb = a
            .thumbnail_path
            .as_deref()
            .map(|t| format!(r#"<img src="/{}" width="50" height="50" alt=""> "#, html_escape(t)))
            .unwrap_or_default();
        let delete = if is_owner || actor.user_id == a.uploader_id {
            intent_form("/attachments", "deleteAttachment", &[("id", a.id.to_string())], "Delete")
        } else {
            String::new()
        };
        let _ = write!(
            body,
            r#"<li>{thumb}<a href="/{}">{}</a> ({} bytes) {delete}</li>"#,
            html_escape(&a.stored_path),
            html_escape(&a.filename),
            a.size_bytes
        );
    }
    let _ = write!(
        body,
        r#"</ul><form method="post" action="/attachments" enctype="multipart/form-data">
<input type="hidden" name="intent" value="uploadAttachment"><input type="hidden" name="todoId" value="{}">
<input type="file" name="file" required> <button type="submit">Upload</button></form>"#,
        todo.id
    );

    body.push_str("<h2>Assignees</h2><ul>");
    for u in view.assignees {
        let remove = if is_owner {
            intent_form(
                "/todos",
                "unassignUser",
                &[("todoId", todo.id.to_string()), ("userId", u.id.clone())],
                "Remove",
            )
        } else {
            String::new()
        };
        let _ = write!(body, "<li>{} {remove}</li>", html_escape(&u.name));
    }
    body.push_str("</ul>");

    if is_owner && !view.candidates.is_empty() {
        let options: String = view
            .candidates
            .iter()
            .map(|u| {
                format!(
                    r#"<option value="{}">{} ({})</option>"#,
                    html_escape(&u.id),
                    html_escape(&u.name),
                    html_escape(&u.email)
                )
            })
            .collect();
        let _ = write!(
            body,
            r#"<form method="post" action="/todos"><input type="hidden" name="intent" value="assignUser">
<input type="hidden" name="todoId" value="{}"><select name="userId">{options}</select>
<button type="submit">Assign</button></form>"#,
            todo.id
        );
    }

    layout(&todo.title, Some(actor), &body)
}

pub fn users(actor: &Actor, page: &Page<User>, editing: Option<&User>) -> String {
    let table = Table::new("/admin/users")
        .empty_message("No users.")
        .column(Column::text("Name", |u: &User| u.name.clone()))
        .column(Column::text("Email", |u: &User| u.email.clone()))
        .column(Column::text("Roles", |u: &User| {
            u.roles.iter().map(Role::as_str).collect::<Vec<_>>().join(", ")
        }))
        .column(Column::text("Created", |u: &User| {
            u.created_at.format("%Y-%m-%d").to_string()
        }))
        .column(Column::html("", |u: &User| {
            let edit = format!(r#"<a href="/admin/users?edit={}">Edit</a> "#, html_escape(&u.id));
            if u.id == actor.user_id {
                edit
            } else {
                edit + &intent_form("/admin/users", "deleteUser", &[("id", u.id.clone())], "Delete")
            }
        }));

    let mut body = format!("<h1>Users</h1>{}", table.render(page));

    if let Some(user) = editing {
        let _ = write!(
            body,
            r#"<h2>Edit {name}</h2>
<form method="post" action="/admin/users"><input type="hidden" name="intent" value="updateUser">
<input type="hidden" name="id" value="{id}">
<label>Name <input name="name" value="{name}" required maxlength="100"></label>
<label>Email <input type="email" name="email" value="{email}" required></label>
<label>New password <input type="password" name="password" placeholder="unchanged"></label>
{roles}<button type="submit">Save</button></form>"#,
            id = html_escape(&user.id),
            name = html_escape(&user.name),
            email = html_escape(&user.email),
            roles = role_checkboxes(&user.roles),
        );
    }

    let _ = write!(
        body,
        r#"<h2>New user</h2>
<form method="post" action="/admin/users"><input type="hidden" name="intent" value="createUser">
<label>Name <input name="name" required maxlength="100"></label>
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required minlength="6"></label>
{}<button type="submit">Create</button></form>"#,
        role_checkboxes(&[Role::User])
    );

    layout("Users", Some(actor), &body)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use trellis_core::PageRequest;

    use super::*;

    fn actor(admin: bool) -> Actor {
        Actor {
            user_id: "u1".into(),
            name: "Ada <Admin>".into(),
            email: "ada@example.com".into(),
            roles: if admin { vec![Role::Admin] } else { vec![Role::User] },
        }
    }

    #[test]
    fn sign_in_keeps_from() {
        let html = sign_in("/projects/3", Some("Invalid email or password"));
        assert!(html.contains(r#"name="from" value="/projects/3""#));
        assert!(html.contains("Invalid email or password"));
    }

    #[test]
    fn layout_escapes_actor_and_gates_admin_link() {
        let page = Page::paginate(Vec::<Project>::new(), PageRequest::default());
        let html = projects(&actor(false), &page);
        assert!(html.contains("Ada &lt;Admin&gt;"));
        assert!(!html.contains(r#"href="/admin/users""#));
        assert!(projects(&actor(true), &page).contains(r#"href="/admin/users""#));
    }

    #[test]
    fn project_rows_link_to_todos_page() {
        let p = Project {
            id: 9,
            owner_id: "u1".into(),
            name: "Garden".into(),
            description: None,
            color: Color::Green,
            created_at: Utc::now(),
        };
        let page = Page::paginate(vec![p], PageRequest::default());
        let html = projects(&actor(false), &page);
        assert!(html.contains(r#"<a href="/projects/9">Garden</a>"#));
        assert!(html.contains(r#"name="intent" value="deleteProject""#));
    }

    #[test]
    fn users_page_hides_self_delete() {
        let me = User {
            id: "u1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            roles: vec![Role::Admin],
            created_at: Utc::now(),
        };
        let page = Page::paginate(vec![me.clone()], PageRequest::default());
        let html = users(&actor(true), &page, Some(&me));
        assert!(!html.contains(r#"value="deleteUser""#));
        assert!(html.contains(r#"value="updateUser""#));
        assert!(html.contains(r#"name="roles" value="admin" checked"#));
    }
}
