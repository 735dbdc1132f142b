//! One paginated table for every listing page, parameterised by row type
//! and column descriptors.

use std::fmt::Write;

use trellis_core::Page;

use super::html_escape;

pub struct Column<'a, T> {
    header: &'static str,
    cell: Box<dyn Fn(&T) -> String + 'a>,
}

impl<'a, T> Column<'a, T> {
    /// A cell whose text is escaped.
    pub fn text(header: &'static str, f: impl Fn(&T) -> String + 'a) -> Self {
        Self {
            header,
            cell: Box::new(move |row| html_escape(&f(row)).into_owned()),
        }
    }

    /// A cell that is already HTML. The closure escapes what it embeds.
    pub fn html(header: &'static str, f: impl Fn(&T) -> String + 'a) -> Self {
        Self {
            header,
            cell: Box::new(f),
        }
    }
}

pub struct Table<'a, T> {
    base_path: String,
    columns: Vec<Column<'a, T>>,
    empty_message: &'static str,
}

impl<'a, T> Table<'a, T> {
    /// `base_path` is where the page links point; `page` and `perPage` are
    /// appended to it.
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            columns: Vec::new(),
            empty_message: "Nothing here yet.",
        }
    }

    pub fn column(mut self, column: Column<'a, T>) -> Self {
        self.columns.push(column);
        self
    }

    pub fn empty_message(mut self, message: &'static str) -> Self {
        self.empty_message = message;
        self
    }

    fn page_href(&self, page: usize, per_page: usize) -> String {
        let sep = if self.base_path.contains('?') { '&' } else { '?' };
        format!("{}{sep}page={page}&perPage={per_page}", self.base_path)
    }

    pub fn render(&self, page: &Page<T>) -> String {
        let mut html = String::from("<table><thead><tr>");
        for column in &self.columns {
            let _ = write!(html, "<th>{}</th>", html_escape(column.header));
        }
        html.push_str("</tr></thead><tbody>");

        if page.is_empty() {
            let _ = write!(
                html,
                r#"<tr><td colspan="{}" class="empty">{}</td></tr>"#,
                self.columns.len().max(1),
                html_escape(self.empty_message)
            );
        }
        for row in &page.items {
            html.push_str("<tr>");
            for column in &self.columns {
                let _ = write!(html, "<td>{}</td>", (column.cell)(row));
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table>");

        html.push_str(r#"<nav class="pagination">"#);
        if page.has_prev() {
            let _ = write!(
                html,
                r#"<a rel="prev" href="{}">Previous</a> "#,
                html_escape(&self.page_href(page.page - 1, page.per_page))
            );
        }
        let _ = write!(
            html,
            "<span>Page {} of {} ({} total)</span>",
            page.page,
            page.total_pages(),
            page.total
        );
        if page.has_next() {
            let _ = write!(
                html,
                r#" <a rel="next" href="{}">Next</a>"#,
                html_escape(&self.page_href(page.page + 1, page.per_page))
            );
        }
        html.push_str("</nav>");
        html
    }
}
