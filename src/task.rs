use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tasklist::Error;
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "backend-sql", derive(sqlx::FromRow))]
pub struct Task {
    pub id: Uuid,
    pub category_name: String,
    pub task_name: String,
    pub task_description: String,
    pub is_urgent: bool,
    pub due_date: String,
    pub created_by: String,
    pub created: Timestamp,
}

/// Body of the add/edit task forms. `is_urgent` is a checkbox: present means set.
#[derive(Debug, Deserialize)]
pub struct TaskForm {
    pub category_name: String,
    pub task_name: String,
    pub task_description: String,
    pub is_urgent: Option<String>,
    pub due_date: String,
}

impl TaskForm {
    pub fn into_task(self, id: Uuid, created_by: &str, created: Timestamp) -> Result<Task, Error> {
        let category_name = required(self.category_name, 50, "Pick a category")?;
        let task_name = required(self.task_name, 50, "Task names are 1 to 50 characters")?;
        let task_description = required(
            self.task_description,
            200,
            "Task descriptions are 1 to 200 characters",
        )?;
        let due_date = required(self.due_date, 50, "Pick a due date")?;

        Ok(Task {
            id,
            category_name,
            task_name,
            task_description,
            is_urgent: self.is_urgent.is_some(),
            due_date,
            created_by: created_by.into(),
            created,
        })
    }
}

impl Task {
    /// Any term, case-insensitively, in the name or description.
    pub fn matches(&self, terms: &[String]) -> bool {
        let name = self.task_name.to_lowercase();
        let description = self.task_description.to_lowercase();

        terms
            .iter()
            .any(|term| name.contains(term.as_str()) || description.contains(term.as_str()))
    }
}

pub fn search_terms(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "backend-sql", derive(sqlx::FromRow))]
pub struct Category {
    pub id: Uuid,
    pub category_name: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub category_name: String,
}

impl CategoryForm {
    pub fn into_category(self, id: Uuid) -> Result<Category, Error> {
        Ok(Category {
            id,
            category_name: required(
                self.category_name,
                50,
                "Category names are 1 to 50 characters",
            )?,
        })
    }
}

fn required(value: String, max: usize, complaint: &'static str) -> Result<String, Error> {
    let value = value.trim();
    let len = value.chars().count();

    if len == 0 || len > max {
        return Err(Error::InvalidForm(complaint));
    }
    Ok(value.into())
}

#[cfg(test)]
mod test {
    use super::*;

    fn form() -> TaskForm {
        TaskForm {
            category_name: "Home".into(),
            task_name: "  Water plants ".into(),
            task_description: "The ones on the balcony".into(),
            is_urgent: None,
            due_date: "18 October, 2026".into(),
        }
    }

    #[test]
    fn form_to_task() {
        let id = Uuid::new_v4();
        let task = form()
            .into_task(id, "alice", Timestamp::from_i64(5))
            .unwrap();

        assert_eq!(task.id, id);
        assert_eq!(task.task_name, "Water plants");
        assert_eq!(task.created_by, "alice");
        assert!(!task.is_urgent);

        let urgent = TaskForm {
            is_urgent: Some("on".into()),
            ..form()
        }
        .into_task(id, "alice", Timestamp::default())
        .unwrap();
        assert!(urgent.is_urgent);
    }

    #[test]
    fn form_validation() {
        let blank = TaskForm {
            task_name: "   ".into(),
            ..form()
        };
        assert!(matches!(
            blank.into_task(Uuid::new_v4(), "alice", Timestamp::default()),
            Err(Error::InvalidForm(_))
        ));

        let long = TaskForm {
            task_description: "x".repeat(201),
            ..form()
        };
        assert!(matches!(
            long.into_task(Uuid::new_v4(), "alice", Timestamp::default()),
            Err(Error::InvalidForm(_))
        ));

        let category = CategoryForm {
            category_name: "".into(),
        };
        assert!(matches!(
            category.into_category(Uuid::new_v4()),
            Err(Error::InvalidForm(_))
        ));
    }

    #[test]
    fn search_matching() {
        let task = form()
            .into_task(Uuid::new_v4(), "alice", Timestamp::default())
            .unwrap();

        assert!(task.matches(&search_terms("WATER")));
        assert!(task.matches(&search_terms("garage balcony")));
        assert!(!task.matches(&search_terms("garage")));
        assert!(!task.matches(&search_terms("")));
    }
}
