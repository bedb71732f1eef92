//! HTML for every page. All user-supplied text goes through [`escape`].

use std::fmt::Write;

use crate::task::{Category, Task};

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn layout(title: &str, user: Option<&str>, flashes: &[String], body: &str) -> String {
    let nav = match user {
        Some(user) => format!(
            r#"<a href="/get_tasks">Home</a>
<a href="/profile/{user}">Profile</a>
<a href="/add_task">New Task</a>
<a href="/categories">Manage Categories</a>
<a href="/logout">Log Out</a>"#,
            user = escape(user),
        ),
        None => r#"<a href="/get_tasks">Home</a>
<a href="/categories">Categories</a>
<a href="/login">Log In</a>
<a href="/register">Register</a>"#
            .into(),
    };

    let mut flash_html = String::new();
    for flash in flashes {
        let _ = writeln!(flash_html, r#"<p class="flash">{}</p>"#, escape(flash));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | Task Manager</title>
</head>
<body>
<nav>
{nav}
</nav>
<section class="flashes">
{flash_html}</section>
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
    )
}

pub fn tasks(tasks: &[Task], user: Option<&str>, query: Option<&str>) -> String {
    let mut html = format!(
        r#"<form action="/search" method="post">
<input type="text" name="query" value="{}" placeholder="Search tasks">
<button type="submit">Search</button>
<a href="/get_tasks">Reset</a>
</form>
"#,
        escape(query.unwrap_or("")),
    );

    if tasks.is_empty() {
        html.push_str("<p>No results found</p>\n");
        return html;
    }

    html.push_str("<ul class=\"tasks\">\n");
    for task in tasks {
        let urgent = if task.is_urgent {
            r#" <strong class="urgent">urgent</strong>"#
        } else {
            ""
        };

        let _ = write!(
            html,
            r#"<li>
<h2>{name}{urgent}</h2>
<p class="due">Due {due}</p>
<p class="category">{category}</p>
<p>{description}</p>
<p class="by">By {by}, added {added}</p>
"#,
            name = escape(&task.task_name),
            due = escape(&task.due_date),
            category = escape(&task.category_name),
            description = escape(&task.task_description),
            by = escape(&task.created_by),
            added = task.created.date(),
        );

        if user == Some(task.created_by.as_str()) {
            let _ = write!(
                html,
                r#"<a href="/edit_task/{id}">Edit</a>
<a href="/delete_task/{id}">Delete</a>
"#,
                id = task.id,
            );
        }
        html.push_str("</li>\n");
    }
    html.push_str("</ul>\n");

    html
}

fn credentials_form(action: &str, submit: &str, other: &str) -> String {
    format!(
        r#"<form action="{action}" method="post">
<label>Username <input type="text" name="username" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">{submit}</button>
</form>
{other}
"#
    )
}

pub fn register_form() -> String {
    credentials_form(
        "/register",
        "Register",
        r#"<p>Already registered? <a href="/login">Log In</a></p>"#,
    )
}

pub fn login_form() -> String {
    credentials_form(
        "/login",
        "Log In",
        r#"<p>New here? <a href="/register">Register Account</a></p>"#,
    )
}

pub fn profile(username: &str) -> String {
    format!(
        "<p class=\"profile\">{}'s Profile</p>\n",
        escape(username)
    )
}

pub fn task_form(action: &str, submit: &str, task: Option<&Task>, categories: &[Category]) -> String {
    let current = task.map(|t| t.category_name.as_str());

    let mut options = String::new();
    if current.is_none() {
        options.push_str("<option value=\"\" disabled selected>Choose Category</option>\n");
    }
    for category in categories {
        let name = escape(&category.category_name);
        let selected = if current == Some(category.category_name.as_str()) {
            " selected"
        } else {
            ""
        };
        let _ = writeln!(options, r#"<option value="{name}"{selected}>{name}</option>"#);
    }

    let field = |f: fn(&Task) -> &str| task.map(f).map(escape).unwrap_or_default();
    let checked = match task {
        Some(t) if t.is_urgent => " checked",
        _ => "",
    };

    format!(
        r#"<form action="{action}" method="post">
<label>Category <select name="category_name" required>
{options}</select></label>
<label>Task Name <input type="text" name="task_name" maxlength="50" value="{name}" required></label>
<label>Task Description <textarea name="task_description" maxlength="200" required>{description}</textarea></label>
<label>Due Date <input type="text" name="due_date" value="{due}" required></label>
<label><input type="checkbox" name="is_urgent"{checked}> Is Urgent</label>
<a href="/get_tasks">Cancel</a>
<button type="submit">{submit}</button>
</form>
"#,
        name = field(|t| t.task_name.as_str()),
        description = field(|t| t.task_description.as_str()),
        due = field(|t| t.due_date.as_str()),
    )
}

pub fn categories(categories: &[Category], user: Option<&str>) -> String {
    let mut html = String::new();

    if user.is_some() {
        html.push_str("<a href=\"/add_category\">Add Category</a>\n");
    }

    html.push_str("<ul class=\"categories\">\n");
    for category in categories {
        let _ = write!(html, "<li>{}", escape(&category.category_name));
        if user.is_some() {
            let _ = write!(
                html,
                r#" <a href="/edit_category/{id}">Edit</a> <a href="/delete_category/{id}">Delete</a>"#,
                id = category.id,
            );
        }
        html.push_str("</li>\n");
    }
    html.push_str("</ul>\n");

    html
}

pub fn category_form(action: &str, submit: &str, category: Option<&Category>) -> String {
    let name = category
        .map(|c| escape(&c.category_name))
        .unwrap_or_default();

    format!(
        r#"<form action="{action}" method="post">
<label>Category Name <input type="text" name="category_name" maxlength="50" value="{name}" required></label>
<a href="/categories">Cancel</a>
<button type="submit">{submit}</button>
</form>
"#
    )
}

pub fn error(message: &str) -> String {
    format!(
        "<p class=\"error\">{}</p>\n<a href=\"/get_tasks\">Back to tasks</a>\n",
        escape(message)
    )
}
