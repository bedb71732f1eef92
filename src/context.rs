use std::convert::Infallible;
use std::sync::Arc;

use log::error;
use warp::http::{header, HeaderValue, Response as HttpResponse, StatusCode};
use warp::reply::{Reply, Response};
use warp::Filter;

use crate::session::{Session, SessionKey, SESSION_COOKIE};
use crate::views;

/// Everything a handler knows about the request's identity. Built fresh per
/// request from the session cookie and written back when the response is made.
pub struct Context {
    pub session: Session,
    key: Arc<SessionKey>,
}

pub fn with_context(
    key: Arc<SessionKey>,
) -> impl Filter<Extract = (Context,), Error = Infallible> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE).map(move |raw: Option<String>| Context {
        session: Session::from_cookie(raw.as_deref(), &key),
        key: Arc::clone(&key),
    })
}

impl Context {
    /// The session's claimed user. Only for display, gated routes go through
    /// [`crate::tasklist::TaskList::authenticate`].
    pub fn user(&self) -> Option<&str> {
        self.session.user()
    }

    pub fn flash(&mut self, message: impl Into<String>) {
        self.session.flash(message)
    }

    pub fn page(self, title: &str, body: String) -> Response {
        self.page_with_status(StatusCode::OK, title, body)
    }

    pub fn page_with_status(mut self, status: StatusCode, title: &str, body: String) -> Response {
        let flashes = self.session.take_flashes();
        let html = views::layout(title, self.user(), &flashes, &body);
        let reply = warp::reply::with_status(warp::reply::html(html), status);

        self.finish(reply.into_response())
    }

    /// 303, so a POSTed form is followed by a GET.
    pub fn redirect(self, location: &str) -> Response {
        let response = HttpResponse::builder()
            .status(StatusCode::SEE_OTHER)
            .header(header::LOCATION, location)
            .body(Default::default());

        match response {
            Ok(response) => self.finish(response),
            Err(e) => {
                error!("couldn't redirect to {location:?}: {e}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    fn finish(self, mut response: Response) -> Response {
        let Some(cookie) = self.session.cookie(&self.key) else {
            return response;
        };

        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => error!("unsendable session cookie: {e}"),
        }
        response
    }
}
