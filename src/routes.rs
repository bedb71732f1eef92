use std::convert::Infallible;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use uuid::Uuid;
use warp::{Filter, Rejection, Reply};

use crate::context::with_context;
use crate::handlers::{self, SearchQuery};
use crate::session::SessionKey;
use crate::tasklist::TaskList;

const FORM_LIMIT: u64 = 16 * 1024;

fn form<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(FORM_LIMIT).and(warp::body::form())
}

pub fn routes(
    list: Arc<TaskList>,
    key: Arc<SessionKey>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let list = warp::any().map(move || Arc::clone(&list));
    let ctx = with_context(key);

    let tasks = warp::get()
        .and(warp::path::end().or(warp::path!("get_tasks")).unify())
        .and(list.clone())
        .and(ctx.clone())
        .then(handlers::tasks);

    let search = warp::path!("search")
        .and(
            warp::get()
                .and(warp::query::<SearchQuery>())
                .or(warp::post().and(form::<SearchQuery>()))
                .unify(),
        )
        .and(list.clone())
        .and(ctx.clone())
        .then(handlers::search);

    let auth = {
        let register_page = warp::path!("register")
            .and(warp::get())
            .and(ctx.clone())
            .then(handlers::register_page);

        let register = warp::path!("register")
            .and(warp::post())
            .and(list.clone())
            .and(ctx.clone())
            .and(form())
            .then(handlers::register);

        let login_page = warp::path!("login")
            .and(warp::get())
            .and(ctx.clone())
            .then(handlers::login_page);

        let login = warp::path!("login")
            .and(warp::post())
            .and(list.clone())
            .and(ctx.clone())
            .and(form())
            .then(handlers::login);

        let logout = warp::path!("logout")
            .and(warp::get())
            .and(ctx.clone())
            .then(handlers::logout);

        let profile = warp::path!("profile" / String)
            .and(warp::get().or(warp::post()).unify())
            .and(list.clone())
            .and(ctx.clone())
            .then(handlers::profile);

        register_page
            .or(register)
            .unify()
            .or(login_page)
            .unify()
            .or(login)
            .unify()
            .or(logout)
            .unify()
            .or(profile)
            .unify()
            .boxed()
    };

    let task_crud = {
        let add_page = warp::path!("add_task")
            .and(warp::get())
            .and(list.clone())
            .and(ctx.clone())
            .then(handlers::add_task_page);

        let add = warp::path!("add_task")
            .and(warp::post())
            .and(list.clone())
            .and(ctx.clone())
            .and(form())
            .then(handlers::add_task);

        let edit_page = warp::path!("edit_task" / Uuid)
            .and(warp::get())
            .and(list.clone())
            .and(ctx.clone())
            .then(handlers::edit_task_page);

        let edit = warp::path!("edit_task" / Uuid)
            .and(warp::post())
            .and(list.clone())
            .and(ctx.clone())
            .and(form())
            .then(handlers::edit_task);

        let delete = warp::path!("delete_task" / Uuid)
            .and(warp::get())
            .and(list.clone())
            .and(ctx.clone())
            .then(handlers::delete_task);

        add_page
            .or(add)
            .unify()
            .or(edit_page)
            .unify()
            .or(edit)
            .unify()
            .or(delete)
            .unify()
            .boxed()
    };

    let category_crud = {
        let list_all = warp::path!("categories")
            .and(warp::get())
            .and(list.clone())
            .and(ctx.clone())
            .then(handlers::categories);

        let add_page = warp::path!("add_category")
            .and(warp::get())
            .and(list.clone())
            .and(ctx.clone())
            .then(handlers::add_category_page);

        let add = warp::path!("add_category")
            .and(warp::post())
            .and(list.clone())
            .and(ctx.clone())
            .and(form())
            .then(handlers::add_category);

        let edit_page = warp::path!("edit_category" / Uuid)
            .and(warp::get())
            .and(list.clone())
            .and(ctx.clone())
            .then(handlers::edit_category_page);

        let edit = warp::path!("edit_category" / Uuid)
            .and(warp::post())
            .and(list.clone())
            .and(ctx.clone())
            .and(form())
            .then(handlers::edit_category);

        let delete = warp::path!("delete_category" / Uuid)
            .and(warp::get())
            .and(list.clone())
            .and(ctx.clone())
            .then(handlers::delete_category);

        list_all
            .or(add_page)
            .unify()
            .or(add)
            .unify()
            .or(edit_page)
            .unify()
            .or(edit)
            .unify()
            .or(delete)
            .unify()
            .boxed()
    };

    tasks
        .or(search)
        .unify()
        .or(auth)
        .unify()
        .or(task_crud)
        .unify()
        .or(category_crud)
        .unify()
        .recover(handlers::rejection)
        .unify()
        .with(warp::log("tasklist"))
}
