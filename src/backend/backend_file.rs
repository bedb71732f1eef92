use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::auth::is_valid_username;
use crate::backend::{FindError, InsertError};
use crate::task::{Category, Task};
use crate::user::User;

mod kv;
use kv::KeyValues;

const USERS: &str = "users";
const TASKS: &str = "tasks";
const CATEGORIES: &str = "categories";

/// One file per document under the data directory:
/// `users/<name>.txt`, `tasks/<id>.json`, `categories/<id>.json`.
pub struct Backend {
    root: PathBuf,
}

impl Backend {
    pub async fn new(data_dir: &Path) -> Result<Self, ()> {
        for collection in [USERS, TASKS, CATEGORIES] {
            let dir = data_dir.join(collection);
            fs::create_dir_all(&dir).map_err(|e| {
                error!("couldn't create {dir:?}: {e}");
            })?;
        }
        info!("Using {data_dir:?}");

        Ok(Self {
            root: data_dir.to_path_buf(),
        })
    }
}

macro_rules! path {
    ($root: expr, $($components: expr),*) => {
        {
            let mut p = $root.clone();
            path!(@internal, p, $($components),*);
            p
        }
    };
    (@internal, $p:expr, $next:expr, $($rest: expr),*) => {
        $p.push($next);
        path!(@internal, $p, $($rest),*);
    };
    (@internal, $p:expr, $next:expr) => {
        $p.push($next);
    };
}

impl Backend {
    fn user_path(&self, username: &str) -> Option<PathBuf> {
        // usernames become file names
        is_valid_username(username).then(|| path!(self.root, USERS, format!("{username}.txt")))
    }

    fn doc_path(&self, collection: &str, id: Uuid) -> PathBuf {
        path!(self.root, collection, format!("{id}.json"))
    }

    fn read_doc<T: DeserializeOwned>(&self, collection: &str, id: Uuid) -> Result<T, FindError> {
        let path = self.doc_path(collection, id);
        let file = File::open(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                return FindError::NotFound;
            }
            error!("open {path:?}: {e:?}");
            FindError::Internal
        })?;

        serde_json::from_reader(file).map_err(|e| {
            error!("couldn't parse {path:?}: {e}");
            FindError::Internal
        })
    }

    /// Documents that don't parse are logged and left out, so one bad file
    /// doesn't take the whole listing down.
    fn read_all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, ()> {
        let dir = path!(self.root, collection);
        let emap = |e: &dyn std::fmt::Debug| {
            error!("error listing {collection}: {e:?}");
        };

        let mut docs = vec![];
        for ent in fs::read_dir(dir).map_err(|e| emap(&e))? {
            let path = ent.map_err(|e| emap(&e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    // deleted since read_dir
                    continue;
                }
                Err(e) => return Err(emap(&e)),
            };
            match serde_json::from_reader(file) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!("skipping unparseable {path:?}: {e}"),
            }
        }

        Ok(docs)
    }

    /// Writes a fresh temporary file beside `dest`. Each call gets its own
    /// name, so concurrent writers of one document never share a file.
    fn write_tmp(
        dest: &Path,
        fill: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> io::Result<PathBuf> {
        let tmp = dest.with_extension(format!("{}.tmp", Uuid::new_v4()));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)?;

        match fill(&mut file).and_then(|()| file.sync_all()) {
            Ok(()) => Ok(tmp),
            Err(e) => {
                Self::discard_tmp(&tmp);
                Err(e)
            }
        }
    }

    fn discard_tmp(tmp: &Path) {
        if let Err(e) = fs::remove_file(tmp) {
            warn!("couldn't remove {tmp:?}: {e:?}");
        }
    }

    /// Replaces the whole document via a rename, so readers never see a partial write.
    fn write_doc<T: Serialize>(&self, collection: &str, id: Uuid, doc: &T) -> Result<(), ()> {
        let path = self.doc_path(collection, id);

        let json = serde_json::to_vec(doc).map_err(|e| {
            error!("couldn't convert {collection} document to json: {e:?}");
        })?;

        let tmp = Self::write_tmp(&path, |f| f.write_all(&json)).map_err(|e| {
            error!("writing {path:?}: {e:?}");
        })?;

        fs::rename(&tmp, &path).map_err(|e| {
            error!("replacing {path:?}: {e:?}");
            Self::discard_tmp(&tmp);
        })
    }

    fn update_doc<T: Serialize>(&self, collection: &str, id: Uuid, doc: &T) -> Result<(), FindError> {
        if !self.doc_path(collection, id).exists() {
            return Err(FindError::NotFound);
        }
        self.write_doc(collection, id, doc)
            .map_err(|()| FindError::Internal)
    }

    fn remove_doc(&self, collection: &str, id: Uuid) -> Result<(), FindError> {
        let path = self.doc_path(collection, id);

        fs::remove_file(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                return FindError::NotFound;
            }
            error!("remove {path:?}: {e:?}");
            FindError::Internal
        })
    }
}

impl Backend {
    pub async fn find_user(&self, username: &str) -> Result<User, FindError> {
        let path = self.user_path(username).ok_or(FindError::NotFound)?;
        let file = File::open(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                return FindError::NotFound;
            }
            error!("open {path:?}: {e:?}");
            FindError::Internal
        })?;

        let mut user = kv::read(file, &["username", "pwhash"])?;
        debug!("found user {username}");

        Ok(User {
            username: user.remove("username").ok_or(FindError::Internal)?,
            pwhash: user.remove("pwhash").ok_or(FindError::Internal)?,
        })
    }

    /// The record is written in full first, then hard-linked into place.
    /// The link fails if the name is taken, which is what keeps usernames
    /// unique, and a reader never sees a half-written user.
    pub async fn insert_user(&self, user: &User) -> Result<(), InsertError> {
        let path = self.user_path(&user.username).ok_or_else(|| {
            error!("refusing to store invalid username {:?}", user.username);
            InsertError::Internal
        })?;

        let mut keyvalues = KeyValues::new();
        keyvalues.insert("username".into(), user.username.clone());
        keyvalues.insert("pwhash".into(), user.pwhash.clone());

        let tmp = Self::write_tmp(&path, |f| kv::write(f, &keyvalues)).map_err(|e| {
            error!("write \"{}\": {e:?}", user.username);
            InsertError::Internal
        })?;

        let linked = fs::hard_link(&tmp, &path);
        Self::discard_tmp(&tmp);

        linked.map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                return InsertError::Duplicate;
            }
            error!("link {path:?}: {e:?}");
            InsertError::Internal
        })
    }
}

impl Backend {
    /// Oldest first.
    pub async fn tasks(&self) -> Result<Vec<Task>, ()> {
        let mut tasks: Vec<Task> = self.read_all(TASKS)?;
        tasks.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    pub async fn find_task(&self, id: Uuid) -> Result<Task, FindError> {
        self.read_doc(TASKS, id)
    }

    pub async fn insert_task(&self, task: &Task) -> Result<(), ()> {
        self.write_doc(TASKS, task.id, task)
    }

    pub async fn update_task(&self, task: &Task) -> Result<(), FindError> {
        self.update_doc(TASKS, task.id, task)
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<(), FindError> {
        self.remove_doc(TASKS, id)
    }
}

impl Backend {
    /// Sorted by name.
    pub async fn categories(&self) -> Result<Vec<Category>, ()> {
        let mut categories: Vec<Category> = self.read_all(CATEGORIES)?;
        categories.sort_by(|a, b| a.category_name.cmp(&b.category_name));
        Ok(categories)
    }

    pub async fn find_category(&self, id: Uuid) -> Result<Category, FindError> {
        self.read_doc(CATEGORIES, id)
    }

    pub async fn insert_category(&self, category: &Category) -> Result<(), ()> {
        self.write_doc(CATEGORIES, category.id, category)
    }

    pub async fn update_category(&self, category: &Category) -> Result<(), FindError> {
        self.update_doc(CATEGORIES, category.id, category)
    }

    pub async fn delete_category(&self, id: Uuid) -> Result<(), FindError> {
        self.remove_doc(CATEGORIES, id)
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    use crate::time::Timestamp;

    pub async fn create_db(dir: &tempfile::TempDir) -> Backend {
        Backend::new(dir.path()).await.unwrap()
    }

    fn task(name: &str, created: i64) -> Task {
        Task {
            id: Uuid::new_v4(),
            category_name: "Home".into(),
            task_name: name.into(),
            task_description: "something".into(),
            is_urgent: false,
            due_date: "1 January, 2027".into(),
            created_by: "alice".into(),
            created: Timestamp::from_i64(created),
        }
    }

    #[tokio::test]
    async fn users_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let db = create_db(&dir).await;
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

        let again = User {
            pwhash: "other".into(),
            ..alice.clone()
        };
        assert!(matches!(
            db.insert_user(&again).await,
            Err(InsertError::Duplicate)
        ));
        // first registration wins
        assert_eq!(db.find_user("alice").await.unwrap().pwhash, "hash");
    }

    fn leftovers(dir: &tempfile::TempDir, collection: &str) -> Vec<PathBuf> {
        fs::read_dir(dir.path().join(collection))
            .unwrap()
            .map(|ent| ent.unwrap().path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("tmp"))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_registrations_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let db = std::sync::Arc::new(create_db(&dir).await);

        let inserts: Vec<_> = (0..8)
            .map(|i| {
                let db = std::sync::Arc::clone(&db);
                tokio::spawn(async move {
                    db.insert_user(&User {
                        username: "alice".into(),
                        pwhash: format!("hash{i}"),
                    })
                    .await
                })
            })
            .collect();
        let lookups: Vec<_> = (0..8)
            .map(|_| {
                let db = std::sync::Arc::clone(&db);
                tokio::spawn(async move { db.find_user("alice").await })
            })
            .collect();

        let mut winners = 0;
        for insert in inserts {
            match insert.await.unwrap() {
                Ok(()) => winners += 1,
                Err(e) => assert!(matches!(e, InsertError::Duplicate)),
            }
        }
        assert_eq!(winners, 1);

        // a lookup sees either nobody or the whole record
        for lookup in lookups {
            match lookup.await.unwrap() {
                Ok(user) => assert!(user.pwhash.starts_with("hash")),
                Err(e) => assert!(matches!(e, FindError::NotFound)),
            }
        }
        assert!(leftovers(&dir, USERS).is_empty());
    }

    #[tokio::test]
    async fn stray_temp_files_dont_claim_a_username() {
        let dir = tempfile::tempdir().unwrap();
        let db = create_db(&dir).await;
        fs::write(dir.path().join(USERS).join("alice.0000.tmp"), "").unwrap();

        assert!(matches!(
            db.find_user("alice").await,
            Err(FindError::NotFound)
        ));
        db.insert_user(&User {
            username: "alice".into(),
            pwhash: "hash".into(),
        })
        .await
        .unwrap();
        assert_eq!(db.find_user("alice").await.unwrap().pwhash, "hash");
    }

    #[tokio::test]
    async fn concurrent_writes_stay_whole() {
        let dir = tempfile::tempdir().unwrap();
        let db = create_db(&dir).await;
        let id = Uuid::new_v4();

        for round in 0..50 {
            std::thread::scope(|s| {
                for writer in 0..4 {
                    let db = &db;
                    s.spawn(move || {
                        let doc = Task {
                            id,
                            task_description: "x".repeat(round * 7 + writer * 300),
                            ..task("same", round as i64)
                        };
                        db.write_doc(TASKS, id, &doc).unwrap();
                    });
                }
            });

            let doc: Task = db.read_doc(TASKS, id).unwrap();
            assert_eq!(doc.id, id);
            assert!(doc.task_description.chars().all(|c| c == 'x'));
        }
        assert!(leftovers(&dir, TASKS).is_empty());
    }

    #[tokio::test]
    async fn unparseable_documents_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let db = create_db(&dir).await;

        let good = task("fine", 1);
        db.insert_task(&good).await.unwrap();
        fs::write(
            dir.path().join(TASKS).join(format!("{}.json", Uuid::new_v4())),
            "{\"id\": \"torn",
        )
        .unwrap();

        assert_eq!(db.tasks().await.unwrap(), [good]);
    }

    #[tokio::test]
    async fn odd_usernames_never_touch_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let db = create_db(&dir).await;

        assert!(matches!(
            db.find_user("../../etc/passwd").await,
            Err(FindError::NotFound)
        ));
        assert!(matches!(
            db.insert_user(&User {
                username: "../x".into(),
                pwhash: "h".into()
            })
            .await,
            Err(InsertError::Internal)
        ));
    }

    #[tokio::test]
    async fn task_documents() {
        let dir = tempfile::tempdir().unwrap();
        let db = create_db(&dir).await;

        let later = task("second", 20);
        let earlier = task("first", 10);
        db.insert_task(&later).await.unwrap();
        db.insert_task(&earlier).await.unwrap();

        let names: Vec<_> = db
            .tasks()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.task_name)
            .collect();
        assert_eq!(names, ["first", "second"]);

        let edited = Task {
            is_urgent: true,
            ..earlier.clone()
        };
        db.update_task(&edited).await.unwrap();
        assert_eq!(db.find_task(earlier.id).await.unwrap(), edited);

        db.delete_task(earlier.id).await.unwrap();
        assert!(matches!(
            db.find_task(earlier.id).await,
            Err(FindError::NotFound)
        ));
        assert!(matches!(
            db.delete_task(earlier.id).await,
            Err(FindError::NotFound)
        ));
        assert!(matches!(
            db.update_task(&edited).await,
            Err(FindError::NotFound)
        ));
        assert_eq!(db.tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn categories_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let db = create_db(&dir).await;

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
