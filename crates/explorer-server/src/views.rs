//! HTML rendering.
//!
//! Every function here is a pure function of its arguments and returns a
//! complete document. All interpolated text goes through [`text`] or
//! [`attr`]; all links are built with [`path`], which percent-encodes each
//! segment.

use crate::session::Notice;
use explorer_types::{DatabaseName, Row, TableData};
use url::Url;

const STYLE: &str = r#"
    <style>
        body { font-family: Arial, sans-serif; background: #1e1e1e; color: white; text-align: center; display: grid; place-items: center; min-height: 100vh; }
        .container { width: 90%; max-width: 600px; margin: auto; padding: 20px; background: #2e2e2e; border-radius: 20px; }
        .notice { padding: 10px; margin: 10px 0; border-radius: 8px; }
        .notice.error { background: #5c1f1f; }
        .notice.info { background: #1f3d5c; }
        input, button { padding: 10px; margin: 5px; border: none; border-radius: 4px; }
        input { background: #333; color: white; }
        button { background: #00adb5; color: white; cursor: pointer; }
        table { width: 100%; border-collapse: collapse; margin-top: 10px; }
        th, td { padding: 10px; border: 1px solid white; text-align: center; }
        a { color: #00C3CC; text-decoration: none; }
        li { list-style-type: none; }
    </style>
"#;

/// Escapes text content.
fn text(s: &str) -> String {
    htmlescape::encode_minimal(s)
}

/// Escapes an attribute value. Values are always emitted double-quoted and
/// `encode_minimal` covers both quote characters.
fn attr(s: &str) -> String {
    htmlescape::encode_minimal(s)
}

/// Builds an absolute path from raw segments, percent-encoding each one.
pub fn path(segments: &[&str]) -> String {
    let mut url = match Url::parse("http://localhost/") {
        Ok(url) => url,
        Err(_) => return "/".to_string(),
    };
    if let Ok(mut parts) = url.path_segments_mut() {
        parts.pop_if_empty().extend(segments);
    }
    url.path().to_string()
}

pub fn table_path(table: &str) -> String {
    path(&["table", table])
}

pub fn edit_path(table: &str, row_id: i64) -> String {
    path(&["edit", table, &row_id.to_string()])
}

pub fn delete_path(table: &str, row_id: i64) -> String {
    path(&["delete", table, &row_id.to_string()])
}

pub fn switch_path(database: &str) -> String {
    path(&["switch_db", database])
}

fn layout(title: &str, notices: &[Notice], body: &str) -> String {
    let notices = notices
        .iter()
        .map(|n| {
            format!(
                r#"<div class="notice {}">{}</div>"#,
                n.level.as_str(),
                text(&n.message)
            )
        })
        .collect::<String>();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    {STYLE}
</head>
<body>
    <div class="container">
        {notices}
        {body}
    </div>
</body>
</html>
"#,
        title = text(title),
    )
}

/// A text input in a dynamically built form.
///
/// Forms over user tables are driven by the column list discovered at
/// request time, so fields are described at runtime rather than fixed.
#[derive(Debug, Clone, Copy)]
pub struct FormField<'a> {
    /// Form field name; also used as the placeholder.
    pub name: &'a str,
    /// Pre-filled value.
    pub value: Option<&'a str>,
    /// Whether to render a `<label>` before the input.
    pub labelled: bool,
}

impl<'a> FormField<'a> {
    pub fn blank(name: &'a str) -> Self {
        Self {
            name,
            value: None,
            labelled: false,
        }
    }

    pub fn filled(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            value: Some(value),
            labelled: true,
        }
    }

    fn render(&self) -> String {
        let label = if self.labelled {
            format!("<label>{}</label>", text(self.name))
        } else {
            String::new()
        };
        let value = self
            .value
            .map(|v| format!(r#" value="{}""#, attr(v)))
            .unwrap_or_default();
        format!(
            r#"{label}<input type="text" name="{name}" placeholder="{name}"{value} required>"#,
            name = attr(self.name),
        )
    }
}

fn render_fields(fields: &[FormField<'_>]) -> String {
    fields.iter().map(FormField::render).collect::<Vec<_>>().join("\n")
}

/// Landing page: database list, selection form, and the active database's
/// tables.
pub fn home_page(
    databases: &[DatabaseName],
    active: Option<&DatabaseName>,
    tables: &[String],
    notices: &[Notice],
) -> String {
    let database_items = databases
        .iter()
        .map(|db| {
            format!(
                r#"<li><a href="{}">{}</a></li>"#,
                attr(&switch_path(db.as_str())),
                text(db.as_str())
            )
        })
        .collect::<String>();

    let tables_section = match active {
        Some(db) => {
            let table_items = tables
                .iter()
                .map(|t| {
                    format!(
                        r#"<li><a href="{}">{}</a></li>"#,
                        attr(&table_path(t)),
                        text(t)
                    )
                })
                .collect::<String>();
            format!(
                r#"<h2>Tables in {}</h2>
        <a href="/create_table">Create New Table</a>
        <ul>{table_items}</ul>"#,
                text(db.as_str())
            )
        }
        None => String::new(),
    };

    let body = format!(
        r#"<h1>SQLite Explorer</h1>
        <form method="post" action="/">
            <input type="text" name="db_name" required placeholder="Database name">
            <button type="submit">Set Database</button>
        </form>
        <h2>Databases</h2>
        <ul>{database_items}</ul>
        {tables_section}"#
    );

    layout("SQLite Explorer", notices, &body)
}

/// Create-table form with a client-side "Add Column" button.
pub fn create_table_page(notices: &[Notice]) -> String {
    let body = r#"<h1>Create Table</h1>
        <form method="post" action="/create_table">
            <input type="text" name="table_name" required placeholder="Table name">
            <div id="columns">
                <input type="text" name="columns" required placeholder="Column name">
            </div>
            <button type="button" onclick="addColumn()">Add Column</button>
            <button type="submit">Create Table</button>
        </form>
        <a href="/">Back</a>
        <script>
            function addColumn() {
                let div = document.createElement("div");
                div.innerHTML = '<input type="text" name="columns" required placeholder="Column name">';
                document.getElementById("columns").appendChild(div);
            }
        </script>"#;

    layout("Create Table", notices, body)
}

fn row_html(table: &str, row: &Row, width: usize) -> String {
    let cells = (0..width)
        .map(|i| format!("<td>{}</td>", text(row.value_or_empty(i))))
        .collect::<String>();
    format!(
        r#"<tr><td>{id}</td>{cells}<td><a href="{edit}">Edit</a> | <a href="{delete}">Delete</a></td></tr>"#,
        id = row.id,
        edit = attr(&edit_path(table, row.id)),
        delete = attr(&delete_path(table, row.id)),
    )
}

/// Table view: insert form followed by every row.
pub fn table_page(table: &str, data: &TableData, notices: &[Notice]) -> String {
    let fields = data
        .columns
        .iter()
        .map(|c| FormField::blank(c))
        .collect::<Vec<_>>();
    let headers = data
        .columns
        .iter()
        .map(|c| format!("<th>{}</th>", text(c)))
        .collect::<String>();
    let rows = data
        .rows
        .iter()
        .map(|r| row_html(table, r, data.columns.len()))
        .collect::<Vec<_>>()
        .join("\n");

    let body = format!(
        r#"<h1>Table: {name}</h1>
        <form method="post" action="{action}">
            {fields}
            <button type="submit">Add Row</button>
        </form>
        <table>
            <tr><th>ID</th>{headers}<th>Actions</th></tr>
            {rows}
        </table>
        <a href="/">Back</a>"#,
        name = text(table),
        action = attr(&table_path(table)),
        fields = render_fields(&fields),
    );

    layout(&format!("Table: {table}"), notices, &body)
}

/// Edit form pre-filled with the row's current values.
pub fn edit_page(table: &str, columns: &[String], row: &Row, notices: &[Notice]) -> String {
    let fields = columns
        .iter()
        .enumerate()
        .map(|(i, c)| FormField::filled(c, row.value_or_empty(i)))
        .collect::<Vec<_>>();

    let body = format!(
        r#"<h1>Edit Row in {name}</h1>
        <form method="post" action="{action}">
            {fields}
            <button type="submit">Save Changes</button>
        </form>
        <a href="{back}">Back</a>"#,
        name = text(table),
        action = attr(&edit_path(table, row.id)),
        fields = render_fields(&fields),
        back = attr(&table_path(table)),
    );

    layout(&format!("Edit Row in {table}"), notices, &body)
}

/// Minimal page for failures that cannot be turned into a redirect.
pub fn error_page(title: &str, message: &str) -> String {
    let body = format!(
        r#"<h1>{}</h1>
        <p>{}</p>
        <a href="/">Home</a>"#,
        text(title),
        text(message)
    );
    layout(title, &[], &body)
}
