use base64_light::{base64_decode, base64_encode};
use cookie::{Cookie, CookieJar, Key, SameSite};
use log::{trace, warn};
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "session";

/// Signing key for the session cookie, derived from the configured secret.
pub struct SessionKey {
    key: Key,
    secure: bool,
}

impl SessionKey {
    /// Any length of secret is stretched through sha256 before key derivation.
    pub fn new(secret: &str, secure: bool) -> Self {
        let digest = sha256::digest(secret);

        Self {
            key: Key::derive_from(digest.as_bytes()),
            secure,
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
struct SessionData {
    user: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    flashes: Vec<String>,
}

/// The request's view of the session cookie. Changes are written back with [`Session::cookie`].
#[derive(Debug, Default)]
pub struct Session {
    data: SessionData,
    dirty: bool,
}

impl Session {
    /// Anything that doesn't verify against `key` is an empty session.
    pub fn from_cookie(raw: Option<&str>, key: &SessionKey) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };

        let mut jar = CookieJar::new();
        jar.add_original(Cookie::new(SESSION_COOKIE, raw.to_string()));

        let Some(verified) = jar.signed(&key.key).get(SESSION_COOKIE) else {
            warn!("session cookie failed verification, ignoring");
            // rewrite so the client stops sending it
            return Self {
                data: SessionData::default(),
                dirty: true,
            };
        };

        let data = serde_json::from_slice(&base64_decode(verified.value())).unwrap_or_else(|e| {
            warn!("signed session cookie has a bad payload: {e}");
            SessionData::default()
        });

        trace!("session: {data:?}");
        Self { data, dirty: false }
    }

    pub fn user(&self) -> Option<&str> {
        self.data.user.as_deref()
    }

    pub fn set_user(&mut self, username: &str) {
        self.data.user = Some(username.into());
        self.dirty = true;
    }

    /// Removes the user. No-op (and no cookie rewrite) for an anonymous session.
    pub fn clear_user(&mut self) {
        if self.data.user.take().is_some() {
            self.dirty = true;
        }
    }

    pub fn flash(&mut self, message: impl Into<String>) {
        self.data.flashes.push(message.into());
        self.dirty = true;
    }

    pub fn take_flashes(&mut self) -> Vec<String> {
        if self.data.flashes.is_empty() {
            return vec![];
        }
        self.dirty = true;
        std::mem::take(&mut self.data.flashes)
    }

    /// The `Set-Cookie` to send back, if this request changed anything.
    /// An emptied session removes the cookie altogether.
    pub fn cookie(&self, key: &SessionKey) -> Option<Cookie<'static>> {
        if !self.dirty {
            return None;
        }

        if self.data == SessionData::default() {
            let removal = Cookie::build((SESSION_COOKIE, ""))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(key.secure)
                .removal()
                .build();
            return Some(removal);
        }

        let json = serde_json::to_string(&self.data).ok()?;
        let plain = Cookie::build((SESSION_COOKIE, base64_encode(&json)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(key.secure)
            .build();

        let mut jar = CookieJar::new();
        jar.signed_mut(&key.key).add(plain);
        jar.get(SESSION_COOKIE).cloned()
    }
}
