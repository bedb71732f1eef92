use std::{result, sync::Arc};

use log::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::auth::{verify_password, AuthAttempt};
use crate::backend::{Backend, FindError, InsertError};
use crate::session::Session;
use crate::task::{search_terms, Category, CategoryForm, Task, TaskForm};
use crate::time::Timestamp;
use crate::user::User;

pub struct TaskList(Backend);

/// Proof that the request's session names a user who exists. Only
/// [`TaskList::authenticate`], [`TaskList::login`] and [`TaskList::register`] make one.
pub struct TaskListAuthed {
    list: Arc<TaskList>,
    username: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    DuplicateUsername,
    InvalidCredentials,
    NotAuthenticated,
    InvalidForm(&'static str),
    NotFound,
    Internal,
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    /// What the user is told. Internal details stay in the log.
    pub fn message(&self) -> &'static str {
        match self {
            Self::DuplicateUsername => "Username already exists!",
            Self::InvalidCredentials => "Incorrect Username and/or Password",
            Self::NotAuthenticated => "Please log in first",
            Self::InvalidForm(complaint) => *complaint,
            Self::NotFound => "Not found",
            Self::Internal => "Something went wrong",
        }
    }
}

impl From<Error> for warp::http::StatusCode {
    fn from(e: Error) -> Self {
        use warp::http::StatusCode;

        match e {
            Error::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::InvalidForm(_) => StatusCode::BAD_REQUEST,
            Error::NotAuthenticated | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::DuplicateUsername => StatusCode::CONFLICT,
        }
    }
}

fn internal<E: std::fmt::Debug>(what: &str) -> impl FnOnce(E) -> Error + '_ {
    move |e| {
        error!("{what}: {e:?}");
        Error::Internal
    }
}

impl From<FindError> for Error {
    fn from(e: FindError) -> Self {
        match e {
            FindError::NotFound => Error::NotFound,
            FindError::Internal => Error::Internal,
        }
    }
}

impl TaskList {
    pub fn new(backend: Backend) -> Self {
        Self(backend)
    }

    fn authed(self: &Arc<Self>, username: String) -> TaskListAuthed {
        TaskListAuthed {
            list: Arc::clone(self),
            username,
        }
    }

    pub async fn register(
        self: &Arc<Self>,
        attempt: AuthAttempt,
        session: &mut Session,
    ) -> Result<TaskListAuthed> {
        attempt.validate_new()?;
        let username = attempt.user();

        match self.0.find_user(&username).await {
            Ok(_) => {
                info!("rejecting registration of existing user {username}");
                return Err(Error::DuplicateUsername);
            }
            Err(FindError::NotFound) => {}
            Err(e) => return Err(internal("registration lookup")(e)),
        }

        let user = User {
            username,
            pwhash: attempt.calc_pwhash()?,
        };
        self.insert_new_user(user, session).await
    }

    /// The lookup in `register` can race with another registration, the
    /// store's uniqueness has the final say.
    async fn insert_new_user(
        self: &Arc<Self>,
        user: User,
        session: &mut Session,
    ) -> Result<TaskListAuthed> {
        self.0.insert_user(&user).await.map_err(|e| match e {
            InsertError::Duplicate => {
                info!("{} was registered concurrently", user.username);
                Error::DuplicateUsername
            }
            InsertError::Internal => {
                error!("couldn't register user {}", user.username);
                Error::Internal
            }
        })?;

        info!("{} registered", user.username);
        session.set_user(&user.username);
        Ok(self.authed(user.username))
    }

    /// Unknown user and wrong password are indistinguishable to the caller.
    pub async fn login(
        self: &Arc<Self>,
        attempt: AuthAttempt,
        session: &mut Session,
    ) -> Result<TaskListAuthed> {
        let username = attempt.user();

        let user = self.0.find_user(&username).await.map_err(|e| {
            if matches!(e, FindError::NotFound) {
                info!("rejecting non-existent user {username}");
                Error::InvalidCredentials
            } else {
                error!("couldn't authenticate user {username}: {e:?}");
                Error::Internal
            }
        })?;

        if !verify_password(&user.pwhash, attempt.pass()) {
            info!("wrong password for user {username}");
            return Err(Error::InvalidCredentials);
        }

        info!("{username} login");
        session.set_user(&user.username);
        Ok(self.authed(user.username))
    }

    /// The session's user must still be in the store. One that isn't is
    /// dropped from the session.
    pub async fn authenticate(self: &Arc<Self>, session: &mut Session) -> Result<TaskListAuthed> {
        let Some(username) = session.user().map(str::to_string) else {
            debug!("no user in session");
            return Err(Error::NotAuthenticated);
        };

        match self.0.find_user(&username).await {
            Ok(user) => {
                trace!("session user {username} still exists");
                Ok(self.authed(user.username))
            }
            Err(FindError::NotFound) => {
                warn!("session names unknown user {username}, dropping it");
                session.clear_user();
                Err(Error::NotAuthenticated)
            }
            Err(e) => Err(internal("session user lookup")(e)),
        }
    }

    pub fn logout(session: &mut Session) {
        match session.user() {
            Some(username) => info!("{username} logout"),
            None => debug!("logout without a session"),
        }
        session.clear_user();
    }
}

impl TaskList {
    pub async fn tasks(&self) -> Result<Vec<Task>> {
        self.0.tasks().await.map_err(internal("listing tasks"))
    }

    /// A blank query finds everything.
    pub async fn search(&self, query: &str) -> Result<Vec<Task>> {
        let terms = search_terms(query);
        let tasks = self.tasks().await?;

        if terms.is_empty() {
            return Ok(tasks);
        }

        let found: Vec<_> = tasks.into_iter().filter(|t| t.matches(&terms)).collect();
        debug!("search {terms:?}: {} tasks", found.len());
        Ok(found)
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.0.categories().await.map_err(internal("listing categories"))
    }
}

impl TaskListAuthed {
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Always the session owner's profile.
    pub async fn profile(&self) -> Result<User> {
        Ok(self.list.0.find_user(&self.username).await?)
    }

    pub async fn task(&self, id: Uuid) -> Result<Task> {
        Ok(self.list.0.find_task(id).await?)
    }

    pub async fn add_task(&self, form: TaskForm) -> Result<Task> {
        let created = Timestamp::now().map_err(|()| Error::Internal)?;
        let task = form.into_task(Uuid::new_v4(), &self.username, created)?;

        self.list
            .0
            .insert_task(&task)
            .await
            .map_err(internal("adding task"))?;

        info!("{} added task {} at {created}", self.username, task.id);
        Ok(task)
    }

    /// Replaces every field; the editor becomes `created_by`.
    pub async fn edit_task(&self, id: Uuid, form: TaskForm) -> Result<Task> {
        let existing = self.task(id).await?;
        let task = form.into_task(id, &self.username, existing.created)?;

        self.list.0.update_task(&task).await?;

        info!("{} edited task {id}", self.username);
        Ok(task)
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<()> {
        self.list.0.delete_task(id).await?;

        info!("{} deleted task {id}", self.username);
        Ok(())
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.list.categories().await
    }

    pub async fn category(&self, id: Uuid) -> Result<Category> {
        Ok(self.list.0.find_category(id).await?)
    }

    pub async fn add_category(&self, form: CategoryForm) -> Result<Category> {
        let category = form.into_category(Uuid::new_v4())?;

        self.list
            .0
            .insert_category(&category)
            .await
            .map_err(internal("adding category"))?;

        info!(
            "{} added category {:?} ({})",
            self.username, category.category_name, category.id
        );
        Ok(category)
    }

    pub async fn edit_category(&self, id: Uuid, form: CategoryForm) -> Result<Category> {
        let category = form.into_category(id)?;

        self.list.0.update_category(&category).await?;

        info!("{} renamed category {id} to {:?}", self.username, category.category_name);
        Ok(category)
    }

    /// Tasks filed under the category keep their category name.
    pub async fn delete_category(&self, id: Uuid) -> Result<()> {
        self.list.0.delete_category(id).await?;

        info!("{} deleted category {id}", self.username);
        Ok(())
    }
}
