//! Server-rendered HTML.

pub mod pages;
pub mod table;

use std::borrow::Cow;
use std::fmt::Write;

use trellis_core::Actor;

pub use table::{Column, Table};

/// Escape text for use in HTML element content and quoted attributes.
pub fn html_escape(s: &str) -> Cow<'_, str> {
    if s.contains(['&', '<', '>', '"', '\'']) {
        let mut escaped = String::with_capacity(s.len() + 8);
        for c in s.chars() {
            match c {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&#x27;"),
                _ => escaped.push(c),
            }
        }
        Cow::Owned(escaped)
    } else {
        Cow::Borrowed(s)
    }
}

/// A `<form method="post">` carrying an `intent` and hidden fields.
pub fn intent_form(action: &str, intent: &str, hidden: &[(&str, String)], label: &str) -> String {
    let mut html = format!(
        r#"<form method="post" action="{}" class="inline"><input type="hidden" name="intent" value="{}">"#,
        html_escape(action),
        html_escape(intent)
    );
    for (name, value) in hidden {
        let _ = write!(
            html,
            r#"<input type="hidden" name="{}" value="{}">"#,
            html_escape(name),
            html_escape(value)
        );
    }
    let _ = write!(html, r#"<button type="submit">{}</button></form>"#, html_escape(label));
    html
}

pub fn layout(title: &str, actor: Option<&Actor>, body: &str) -> String {
    let nav = match actor {
        Some(actor) => {
            let admin = if actor.is_admin() {
                r#" <a href="/admin/users">Users</a>"#
            } else {
                ""
            };
            format!(
                r#"<nav><a href="/">Projects</a>{admin} <span class="who">{}</span> <form method="post" action="/auth/signout" class="inline"><button type="submit">Sign out</button></form></nav>"#,
                html_escape(&actor.name)
            )
        }
        None => String::new(),
    };
    format!(
        "<!doctype html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>{} - Trellis</title></head><body>{nav}<main>{body}</main></body></html>",
        html_escape(title)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_passes_plain_text_through() {
        assert!(matches!(html_escape("Hello World"), Cow::Borrowed(_)));
    }

    #[test]
    fn escape_special_chars() {
        assert_eq!(
            html_escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn intent_form_escapes_values() {
        let html = intent_form("/todos", "deleteTodo", &[("id", "4\"".into())], "Delete");
        assert!(html.contains(r#"name="intent" value="deleteTodo""#));
        assert!(html.contains(r#"name="id" value="4&quot;""#));
    }
}
