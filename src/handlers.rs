use std::sync::Arc;

use log::error;
use serde::Deserialize;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::reply::Response;

use crate::auth::AuthAttempt;
use crate::context::Context;
use crate::tasklist::{Error, TaskList};
use crate::task::{CategoryForm, TaskForm};
use crate::views;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    query: String,
}

/// Turns a failed flow into a response: user mistakes are flashed and sent
/// back to `back`, anything else gets an error page.
fn recover(mut ctx: Context, e: Error, back: &str) -> Response {
    match e {
        Error::NotAuthenticated => {
            ctx.flash(e.message());
            ctx.redirect("/login")
        }
        Error::DuplicateUsername | Error::InvalidCredentials | Error::InvalidForm(_) => {
            ctx.flash(e.message());
            ctx.redirect(back)
        }
        Error::NotFound | Error::Internal => {
            let status: StatusCode = e.into();
            ctx.page_with_status(status, "Oops", views::error(e.message()))
        }
    }
}

pub async fn tasks(list: Arc<TaskList>, ctx: Context) -> Response {
    match list.tasks().await {
        Ok(tasks) => {
            let body = views::tasks(&tasks, ctx.user(), None);
            ctx.page("Tasks", body)
        }
        Err(e) => recover(ctx, e, "/"),
    }
}

pub async fn search(query: SearchQuery, list: Arc<TaskList>, ctx: Context) -> Response {
    match list.search(&query.query).await {
        Ok(tasks) => {
            let body = views::tasks(&tasks, ctx.user(), Some(&query.query));
            ctx.page("Tasks", body)
        }
        Err(e) => recover(ctx, e, "/"),
    }
}

pub async fn register_page(ctx: Context) -> Response {
    ctx.page("Register", views::register_form())
}

pub async fn register(list: Arc<TaskList>, mut ctx: Context, attempt: AuthAttempt) -> Response {
    match list.register(attempt, &mut ctx.session).await {
        Ok(authed) => {
            let location = format!("/profile/{}", authed.username());
            ctx.flash("Registration Successful!");
            ctx.redirect(&location)
        }
        Err(e) => recover(ctx, e, "/register"),
    }
}

pub async fn login_page(ctx: Context) -> Response {
    ctx.page("Log In", views::login_form())
}

pub async fn login(list: Arc<TaskList>, mut ctx: Context, attempt: AuthAttempt) -> Response {
    let typed = attempt.typed_user().trim().to_string();

    match list.login(attempt, &mut ctx.session).await {
        Ok(authed) => {
            let location = format!("/profile/{}", authed.username());
            ctx.flash(format!("Welcome, {typed}"));
            ctx.redirect(&location)
        }
        Err(e) => recover(ctx, e, "/login"),
    }
}

pub async fn logout(mut ctx: Context) -> Response {
    TaskList::logout(&mut ctx.session);
    ctx.flash("You have been logged out!");
    ctx.redirect("/login")
}

/// The path's username is ignored: it's always the session owner's profile.
pub async fn profile(_username: String, list: Arc<TaskList>, mut ctx: Context) -> Response {
    let result = async {
        let authed = list.authenticate(&mut ctx.session).await?;
        authed.profile().await
    }
    .await;

    match result {
        Ok(user) => ctx.page("Profile", views::profile(&user.username)),
        Err(e) => recover(ctx, e, "/login"),
    }
}

pub async fn add_task_page(list: Arc<TaskList>, mut ctx: Context) -> Response {
    let result = async {
        let authed = list.authenticate(&mut ctx.session).await?;
        authed.categories().await
    }
    .await;

    match result {
        Ok(categories) => {
            let body = views::task_form("/add_task", "Add Task", None, &categories);
            ctx.page("Add Task", body)
        }
        Err(e) => recover(ctx, e, "/get_tasks"),
    }
}

pub async fn add_task(list: Arc<TaskList>, mut ctx: Context, form: TaskForm) -> Response {
    let result = async {
        let authed = list.authenticate(&mut ctx.session).await?;
        authed.add_task(form).await
    }
    .await;

    match result {
        Ok(_) => {
            ctx.flash("Task Successfully Added");
            ctx.redirect("/get_tasks")
        }
        Err(e) => recover(ctx, e, "/add_task"),
    }
}

pub async fn edit_task_page(id: Uuid, list: Arc<TaskList>, mut ctx: Context) -> Response {
    let result = async {
        let authed = list.authenticate(&mut ctx.session).await?;
        let task = authed.task(id).await?;
        let categories = authed.categories().await?;
        Ok::<_, Error>((task, categories))
    }
    .await;

    match result {
        Ok((task, categories)) => {
            let action = format!("/edit_task/{id}");
            let body = views::task_form(&action, "Edit Task", Some(&task), &categories);
            ctx.page("Edit Task", body)
        }
        Err(e) => recover(ctx, e, "/get_tasks"),
    }
}

pub async fn edit_task(id: Uuid, list: Arc<TaskList>, mut ctx: Context, form: TaskForm) -> Response {
    let result = async {
        let authed = list.authenticate(&mut ctx.session).await?;
        authed.edit_task(id, form).await
    }
    .await;

    match result {
        Ok(_) => {
            ctx.flash("Task Successfully Updated");
            ctx.redirect("/get_tasks")
        }
        Err(e) => recover(ctx, e, &format!("/edit_task/{id}")),
    }
}

pub async fn delete_task(id: Uuid, list: Arc<TaskList>, mut ctx: Context) -> Response {
    let result = async {
        let authed = list.authenticate(&mut ctx.session).await?;
        authed.delete_task(id).await
    }
    .await;

    match result {
        Ok(()) => {
            ctx.flash("Task Successfully Deleted");
            ctx.redirect("/get_tasks")
        }
        Err(e) => recover(ctx, e, "/get_tasks"),
    }
}

pub async fn categories(list: Arc<TaskList>, ctx: Context) -> Response {
    match list.categories().await {
        Ok(categories) => {
            let body = views::categories(&categories, ctx.user());
            ctx.page("Categories", body)
        }
        Err(e) => recover(ctx, e, "/get_tasks"),
    }
}

pub async fn add_category_page(list: Arc<TaskList>, mut ctx: Context) -> Response {
    match list.authenticate(&mut ctx.session).await {
        Ok(_) => ctx.page(
            "Add Category",
            views::category_form("/add_category", "Add Category", None),
        ),
        Err(e) => recover(ctx, e, "/categories"),
    }
}

pub async fn add_category(list: Arc<TaskList>, mut ctx: Context, form: CategoryForm) -> Response {
    let result = async {
        let authed = list.authenticate(&mut ctx.session).await?;
        authed.add_category(form).await
    }
    .await;

    match result {
        Ok(_) => {
            ctx.flash("New Category Added");
            ctx.redirect("/categories")
        }
        Err(e) => recover(ctx, e, "/add_category"),
    }
}

pub async fn edit_category_page(id: Uuid, list: Arc<TaskList>, mut ctx: Context) -> Response {
    let result = async {
        let authed = list.authenticate(&mut ctx.session).await?;
        authed.category(id).await
    }
    .await;

    match result {
        Ok(category) => {
            let action = format!("/edit_category/{id}");
            let body = views::category_form(&action, "Edit Category", Some(&category));
            ctx.page("Edit Category", body)
        }
        Err(e) => recover(ctx, e, "/categories"),
    }
}

pub async fn edit_category(
    id: Uuid,
    list: Arc<TaskList>,
    mut ctx: Context,
    form: CategoryForm,
) -> Response {
    let result = async {
        let authed = list.authenticate(&mut ctx.session).await?;
        authed.edit_category(id, form).await
    }
    .await;

    match result {
        Ok(_) => {
            ctx.flash("Category Successfully Updated");
            ctx.redirect("/categories")
        }
        Err(e) => recover(ctx, e, &format!("/edit_category/{id}")),
    }
}

pub async fn delete_category(id: Uuid, list: Arc<TaskList>, mut ctx: Context) -> Response {
    let result = async {
        let authed = list.authenticate(&mut ctx.session).await?;
        authed.delete_category(id).await
    }
    .await;

    match result {
        Ok(()) => {
            ctx.flash("Category Successfully Deleted");
            ctx.redirect("/categories")
        }
        Err(e) => recover(ctx, e, "/categories"),
    }
}

/// Rejections from warp itself: unknown paths, wrong methods, unparseable forms.
pub async fn rejection(err: warp::Rejection) -> Result<Response, std::convert::Infallible> {
    use warp::Reply;

    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Form too large")
    } else if err.find::<warp::reject::InvalidQuery>().is_some()
        || err.find::<warp::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::LengthRequired>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        (StatusCode::BAD_REQUEST, "Incomplete form")
    } else {
        error!("unhandled rejection: {err:?}");
        (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
    };

    let html = views::layout("Oops", None, &[], &views::error(message));
    Ok(warp::reply::with_status(warp::reply::html(html), status).into_response())
}
