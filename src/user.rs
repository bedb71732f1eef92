#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "backend-sql", derive(sqlx::FromRow))]
pub struct User {
    pub username: String,
    pub pwhash: String,
}
