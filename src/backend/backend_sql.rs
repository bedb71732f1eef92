use std::path::{Path, PathBuf};

use sqlx::{
    migrate::MigrateDatabase, query, query_as, sqlite::SqliteQueryResult, Pool, Sqlite, SqlitePool,
};
use uuid::Uuid;

use log::{error, info};

use crate::backend::{FindError, InsertError};
use crate::task::{Category, Task};
use crate::user::User;

type Result<T> = std::result::Result<T, ()>;

pub struct Backend(pub Pool<Sqlite>);

fn into_sql(path: &Path) -> PathBuf {
    path.join("tasks.sql")
}

async fn init(url: &str) -> Result<()> {
    Sqlite::create_database(url).await.map_err(|e| {
        error!("error creating database {url}: {e}");
    })?;
    info!("Created {url}");
    Ok(())
}

impl Backend {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        let db_pathbuf = into_sql(data_dir);
        let Some(db_path) = db_pathbuf.to_str() else {
            error!("non utf-8 data directory: {data_dir:?}");
            return Err(());
        };
        let url = format!("sqlite://{db_path}");

        if !Sqlite::database_exists(&url).await.unwrap_or(false) {
            init(&url).await?;
        }

        let pool = SqlitePool::connect(&url).await.map_err(|e| {
            error!("db connection: {e}");
        })?;
        info!("Using {url}");

        Self::migrated(pool).await
    }

    async fn migrated(pool: Pool<Sqlite>) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                error!("migration: {e}");
            })?;

        Ok(Self(pool))
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = e else {
        return false;
    };

    // SQLITE_CONSTRAINT_PRIMARYKEY, SQLITE_CONSTRAINT_UNIQUE
    matches!(db_err.code().as_deref(), Some("1555") | Some("2067"))
        || db_err.message().contains("UNIQUE constraint failed")
}

fn expect_one(result: std::result::Result<SqliteQueryResult, sqlx::Error>, what: &str) -> std::result::Result<(), FindError> {
    match result {
        Ok(r) if r.rows_affected() == 0 => Err(FindError::NotFound),
        Ok(_) => Ok(()),
        Err(e) => {
            error!("{what}: {e:?}");
            Err(FindError::Internal)
        }
    }
}

fn find_one<T>(result: std::result::Result<T, sqlx::Error>, what: &str) -> std::result::Result<T, FindError> {
    result.map_err(|e| {
        if matches!(e, sqlx::Error::RowNotFound) {
            FindError::NotFound
        } else {
            error!("{what}: {e:?}");
            FindError::Internal
        }
    })
}

impl Backend {
    pub async fn find_user(&self, username: &str) -> std::result::Result<User, FindError> {
        let user = query_as::<_, User>(
            "
            SELECT username, pwhash
            FROM users
            WHERE username = ?
            ",
        )
        .bind(username)
        .fetch_one(&self.0)
        .await;

        find_one(user, "find user")
    }

    /// The primary key is what keeps usernames unique.
    pub async fn insert_user(&self, user: &User) -> std::result::Result<(), InsertError> {
        query(
            "
            INSERT INTO users
            (username, pwhash)
            VALUES
            (?, ?)
            ",
        )
        .bind(&user.username)
        .bind(&user.pwhash)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            if is_unique_violation(&e) {
                InsertError::Duplicate
            } else {
                error!("insert user: {e:?}");
                InsertError::Internal
            }
        })
    }
}

impl Backend {
    pub async fn tasks(&self) -> Result<Vec<Task>> {
        query_as::<_, Task>(
            "
            SELECT *
            FROM tasks
            ORDER BY created, id
            ",
        )
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting tasks: {e:?}");
        })
    }

    pub async fn find_task(&self, id: Uuid) -> std::result::Result<Task, FindError> {
        let task = query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_one(&self.0)
            .await;

        find_one(task, "find task")
    }

    pub async fn insert_task(&self, task: &Task) -> Result<()> {
        query(
            "
            INSERT INTO tasks
            (
                id, category_name,
                task_name, task_description,
                is_urgent, due_date,
                created_by, created
            )
            VALUES
            (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(task.id)
        .bind(&task.category_name)
        .bind(&task.task_name)
        .bind(&task.task_description)
        .bind(task.is_urgent)
        .bind(&task.due_date)
        .bind(&task.created_by)
        .bind(task.created)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            error!("error inserting task: {e:?}");
        })
    }

    pub async fn update_task(&self, task: &Task) -> std::result::Result<(), FindError> {
        let result = query(
            "
            UPDATE tasks
            SET
                category_name = ?,
                task_name = ?,
                task_description = ?,
                is_urgent = ?,
                due_date = ?,
                created_by = ?
            WHERE id = ?
            ",
        )
        .bind(&task.category_name)
        .bind(&task.task_name)
        .bind(&task.task_description)
        .bind(task.is_urgent)
        .bind(&task.due_date)
        .bind(&task.created_by)
        .bind(task.id)
        .execute(&self.0)
        .await;

        expect_one(result, "update task")
    }

    pub async fn delete_task(&self, id: Uuid) -> std::result::Result<(), FindError> {
        let result = query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.0)
            .await;

        expect_one(result, "delete task")
    }
}

impl Backend {
    pub async fn categories(&self) -> Result<Vec<Category>> {
        query_as::<_, Category>(
            "
            SELECT id, category_name
            FROM categories
            ORDER BY category_name
            ",
        )
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting categories: {e:?}");
        })
    }

    pub async fn find_category(&self, id: Uuid) -> std::result::Result<Category, FindError> {
        let category = query_as::<_, Category>("SELECT id, category_name FROM categories WHERE id = ?")
            .bind(id)
            .fetch_one(&self.0)
            .await;

        find_one(category, "find category")
    }

    pub async fn insert_category(&self, category: &Category) -> Result<()> {
        query("INSERT INTO categories (id, category_name) VALUES (?, ?)")
            .bind(category.id)
            .bind(&category.category_name)
            .execute(&self.0)
            .await
            .map(|_| ())
            .map_err(|e| {
                error!("error inserting category: {e:?}");
            })
    }

    pub async fn update_category(&self, category: &Category) -> std::result::Result<(), FindError> {
        let result = query("UPDATE categories SET category_name = ? WHERE id = ?")
            .bind(&category.category_name)
            .bind(category.id)
            .execute(&self.0)
            .await;

        expect_one(result, "update category")
    }

    pub async fn delete_category(&self, id: Uuid) -> std::result::Result<(), FindError> {
        let result = query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.0)
            .await;

        expect_one(result, "delete category")
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    use sqlx::sqlite::SqlitePoolOptions;

    use crate::time::Timestamp;

    pub async fn create_db() -> Backend {
        // one connection, or each would get its own empty in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        Backend::migrated(pool).await.unwrap()
    }

    #[tokio::test]
    async fn users_are_unique() {
        let db = create_db().await;
        let alice = User {
            username: "alice".into(),
            pwhash: "hash".into(),
        };

        assert!(matches!(
            db.find_user("alice").await,
            Err(FindError::NotFound)
        ));

        db.insert_user(&alice).await.unwrap();
        assert_eq!(db.find_user("alice").await.unwrap(), alice);

        assert!(matches!(
            db.insert_user(&alice).await,
            Err(InsertError::Duplicate)
        ));
    }

    #[tokio::test]
    async fn task_rows() {
        let db = create_db().await;
        let task = Task {
            id: Uuid::new_v4(),
            category_name: "Home".into(),
            task_name: "Water plants".into(),
            task_description: "balcony".into(),
            is_urgent: true,
            due_date: "1 January, 2027".into(),
            created_by: "alice".into(),
            created: Timestamp::from_i64(10),
        };

        db.insert_task(&task).await.unwrap();
        assert_eq!(db.find_task(task.id).await.unwrap(), task);
        assert_eq!(db.tasks().await.unwrap(), vec![task.clone()]);

        let edited = Task {
            task_name: "Water all plants".into(),
            ..task.clone()
        };
        db.update_task(&edited).await.unwrap();
        assert_eq!(db.find_task(task.id).await.unwrap(), edited);

        db.delete_task(task.id).await.unwrap();
        assert!(matches!(
            db.delete_task(task.id).await,
            Err(FindError::NotFound)
        ));
        assert!(matches!(
            db.update_task(&edited).await,
            Err(FindError::NotFound)
        ));
    }

    #[tokio::test]
    async fn categories_sorted() {
        let db = create_db().await;

        for name in ["Work", "Garden", "Home"] {
            db.insert_category(&Category {
                id: Uuid::new_v4(),
                category_name: name.into(),
            })
            .await
            .unwrap();
        }

        let names: Vec<_> = db
            .categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.category_name)
            .collect();
        assert_eq!(names, ["Garden", "Home", "Work"]);
    }
}
