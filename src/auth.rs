use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use log::error;
use serde::Deserialize;

use crate::tasklist::Error;

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 5..=15;
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 1..=64;

/// Username and password as posted by the login and register forms.
#[derive(Deserialize)]
pub struct AuthAttempt {
    username: String,
    password: String,
}

impl AuthAttempt {
    #[cfg(test)]
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The username as typed, before normalisation.
    pub fn typed_user(&self) -> &str {
        &self.username
    }

    pub fn user(&self) -> String {
        normalise_username(&self.username)
    }

    pub fn pass(&self) -> &str {
        &self.password
    }

    /// Form rules for new accounts. Login attempts are not validated, a bad
    /// username simply fails to match.
    pub fn validate_new(&self) -> Result<(), Error> {
        if !is_valid_username(&self.user()) {
            return Err(Error::InvalidForm(
                "Usernames are 5 to 15 letters or digits",
            ));
        }

        if !PASSWORD_LEN.contains(&self.password.chars().count()) {
            return Err(Error::InvalidForm("Passwords are 1 to 64 characters"));
        }

        Ok(())
    }

    pub fn calc_pwhash(&self) -> Result<String, Error> {
        hash_password(&self.password)
    }
}

impl std::fmt::Debug for AuthAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthAttempt")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

pub fn normalise_username(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Usernames double as store keys (and file names), so only a small alphabet is accepted.
pub fn is_valid_username(name: &str) -> bool {
    USERNAME_LEN.contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Argon2id with a fresh random salt, returned in PHC string format.
pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("couldn't hash password: {e}");
            Error::Internal
        })
}

/// A malformed stored hash is a mismatch, not an error.
pub fn verify_password(pwhash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(pwhash) else {
        error!("stored password hash is malformed");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("hunter22").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&hash, "hunter22"));
        assert!(!verify_password(&hash, "hunter23"));
        assert!(!verify_password(&hash, ""));
    }

    #[test]
    fn salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();

        assert_ne!(a, b);
        assert!(verify_password(&a, "same-password"));
        assert!(verify_password(&b, "same-password"));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("", "pw"));
        assert!(!verify_password("not-a-phc-string", "pw"));
        assert!(!verify_password("$argon2id$v=19$garbage", "pw"));
    }

    #[test]
    fn usernames_normalise_to_lowercase() {
        let attempt = AuthAttempt::new("  Alice01 ", "pw");

        assert_eq!(attempt.user(), "alice01");
        assert_eq!(attempt.typed_user(), "  Alice01 ");
    }

    #[test]
    fn username_alphabet() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("bob123456789012"));
        assert!(!is_valid_username("bob"));
        assert!(!is_valid_username("bob1234567890123"));
        assert!(!is_valid_username("../etc"));
        assert!(!is_valid_username("ali ce"));
        assert!(!is_valid_username("Alice"));
    }

    #[test]
    fn new_account_rules() {
        assert!(AuthAttempt::new("Alice", "secret").validate_new().is_ok());
        assert!(matches!(
            AuthAttempt::new("al", "secret").validate_new(),
            Err(Error::InvalidForm(_))
        ));
        assert!(matches!(
            AuthAttempt::new("alice", "").validate_new(),
            Err(Error::InvalidForm(_))
        ));
    }

    #[test]
    fn debug_hides_password() {
        let attempt = AuthAttempt::new("alice", "topsecret");

        assert!(!format!("{attempt:?}").contains("topsecret"));
    }
}
