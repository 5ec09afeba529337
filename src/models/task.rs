use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "task_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

/// A task always belongs to exactly one project and has at most one assignee.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub project_id: i64,
    pub developer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Past its due date and not yet done.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != TaskStatus::Done && self.due_date.is_some_and(|due| due < today)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    #[validate(length(min = 2, max = 100, message = "Task title must be between 2 and 100 characters"))]
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<TaskStatus>,
    #[validate(required(message = "Project ID is required"))]
    pub project_id: Option<i64>,
    pub developer_id: Option<i64>,
}

impl CreateTask {
    /// Trims the title so length limits apply to what gets stored.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self
    }
}

/// Partial update: only supplied fields are applied.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    #[validate(length(min = 2, max = 100, message = "Task title must be between 2 and 100 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<TaskStatus>,
}

impl UpdateTask {
    pub fn normalized(mut self) -> Self {
        self.title = self.title.map(|t| t.trim().to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub project_id: i64,
    pub developer_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<TaskStatus>,
}

impl TaskChanges {
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(due_date) = self.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(status) = self.status {
            task.status = status;
        }
    }
}

impl From<UpdateTask> for TaskChanges {
    fn from(req: UpdateTask) -> Self {
        Self {
            title: req.title,
            description: req.description,
            due_date: req.due_date,
            status: req.status,
        }
    }
}

/// Fields tasks may be sorted by. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Title,
    Status,
    DueDate,
    ProjectId,
    DeveloperId,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Status => "status",
            SortField::DueDate => "dueDate",
            SortField::ProjectId => "project.id",
            SortField::DeveloperId => "developer.id",
        }
    }

    /// SQL `ORDER BY` clause. Ties break on id to keep insertion order.
    pub fn order_by(&self) -> &'static str {
        match self {
            SortField::Title => "title ASC, id ASC",
            SortField::Status => "status ASC, id ASC",
            SortField::DueDate => "due_date ASC NULLS LAST, id ASC",
            SortField::ProjectId => "project_id ASC, id ASC",
            SortField::DeveloperId => "developer_id ASC NULLS LAST, id ASC",
        }
    }

    pub fn sort(&self, tasks: &mut [Task]) {
        match self {
            SortField::Title => tasks.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id))),
            SortField::Status => tasks.sort_by(|a, b| a.status.cmp(&b.status).then(a.id.cmp(&b.id))),
            SortField::DueDate => tasks.sort_by(|a, b| {
                nulls_last(a.due_date, b.due_date).then(a.id.cmp(&b.id))
            }),
            SortField::ProjectId => {
                tasks.sort_by(|a, b| a.project_id.cmp(&b.project_id).then(a.id.cmp(&b.id)))
            }
            SortField::DeveloperId => tasks.sort_by(|a, b| {
                nulls_last(a.developer_id, b.developer_id).then(a.id.cmp(&b.id))
            }),
        }
    }
}

fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(SortField::Title),
            "status" => Ok(SortField::Status),
            "dueDate" => Ok(SortField::DueDate),
            "project.id" => Ok(SortField::ProjectId),
            "developer.id" => Ok(SortField::DeveloperId),
            other => Err(format!(
                "Invalid sort parameter '{other}'. Allowed: title, status, dueDate, project.id, developer.id"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: i64, title: &str, due: Option<NaiveDate>, status: TaskStatus) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: None,
            due_date: due,
            status,
            project_id: 1,
            developer_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn overdue_requires_past_due_date_and_not_done() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let yesterday = today.pred_opt().unwrap();

        assert!(task(1, "a", Some(yesterday), TaskStatus::Todo).is_overdue(today));
        assert!(!task(2, "b", Some(yesterday), TaskStatus::Done).is_overdue(today));
        assert!(!task(3, "c", Some(today), TaskStatus::InProgress).is_overdue(today));
        assert!(!task(4, "d", None, TaskStatus::Todo).is_overdue(today));
    }

    #[test]
    fn sort_field_allow_list() {
        assert_eq!("dueDate".parse::<SortField>(), Ok(SortField::DueDate));
        assert_eq!("developer.id".parse::<SortField>(), Ok(SortField::DeveloperId));
        assert!("nonexistent_field".parse::<SortField>().is_err());
        assert!("id; DROP TABLE tasks".parse::<SortField>().is_err());
    }

    #[test]
    fn due_date_sort_puts_undated_last() {
        let d = |day| NaiveDate::from_ymd_opt(2026, 1, day);
        let mut tasks = vec![
            task(1, "x", None, TaskStatus::Todo),
            task(2, "y", d(5), TaskStatus::Todo),
            task(3, "z", d(2), TaskStatus::Todo),
        ];
        SortField::DueDate.sort(&mut tasks);
        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn partial_changes_leave_other_fields() {
        let mut t = task(1, "Old", None, TaskStatus::InProgress);
        t.description = Some("keep".to_string());
        let changes = TaskChanges {
            title: Some("New".to_string()),
            ..Default::default()
        };
        changes.apply(&mut t);
        changes.apply(&mut t);
        assert_eq!(t.title, "New");
        assert_eq!(t.description.as_deref(), Some("keep"));
        assert_eq!(t.status, TaskStatus::InProgress);
    }
}
