mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use project_tracker::Backend;
use project_tracker::auth::Actor;
use project_tracker::db::memory::{MemoryAuditLog, MemoryStore};
use project_tracker::db::{AuditRecorder, StoreError};
use project_tracker::error::AppError;
use project_tracker::models::{
    AuditAction, CreateDeveloper, CreateProject, CreateTask, NewAuditEntry, Role, TaskStatus,
    UpdateTask,
};
use project_tracker::state::SharedState;

struct FailingRecorder;

#[async_trait]
impl AuditRecorder for FailingRecorder {
    async fn record(&self, _entry: NewAuditEntry) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("audit store offline".to_string()))
    }
}

/// Delays CREATE entries so concurrent work can overtake them.
struct SlowCreateRecorder {
    inner: Arc<MemoryAuditLog>,
}

#[async_trait]
impl AuditRecorder for SlowCreateRecorder {
    async fn record(&self, entry: NewAuditEntry) -> Result<(), StoreError> {
        if matches!(entry.action, AuditAction::Create) {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        self.inner.record(entry).await
    }
}

fn actor(id: i64, username: &str, roles: &[Role]) -> Actor {
    Actor {
        user_id: id,
        username: username.to_string(),
        email: format!("{username}@test.com"),
        roles: roles.to_vec(),
    }
}

fn admin() -> Actor {
    actor(1, "admin", &[Role::Admin])
}

fn memory_state() -> (SharedState, Arc<MemoryAuditLog>) {
    let audit = Arc::new(MemoryAuditLog::new());
    let backend = Backend {
        store: Arc::new(MemoryStore::new()),
        audit_recorder: audit.clone(),
        audit_query: audit.clone(),
    };
    (
        project_tracker::build_state(backend, common::test_config()),
        audit,
    )
}

async fn project(state: &SharedState) -> i64 {
    state
        .projects
        .create_project(
            &admin(),
            CreateProject {
                name: "Tracker".to_string(),
                deadline: Some(Utc::now().date_naive() + Duration::days(30)),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id
}

async fn developer(state: &SharedState, name: &str) -> i64 {
    state
        .developers
        .create_developer(
            &admin(),
            CreateDeveloper {
                name: name.to_string(),
                email: format!("{name}@test.com"),
                skills: vec![],
            },
        )
        .await
        .unwrap()
        .id
}

fn new_task(project_id: i64, title: &str) -> CreateTask {
    CreateTask {
        title: title.to_string(),
        project_id: Some(project_id),
        ..Default::default()
    }
}

#[tokio::test]
async fn audit_failure_does_not_fail_the_mutation() {
    let backend = Backend {
        store: Arc::new(MemoryStore::new()),
        audit_recorder: Arc::new(FailingRecorder),
        audit_query: Arc::new(MemoryAuditLog::new()),
    };
    let state = project_tracker::build_state(backend, common::test_config());
    let project_id = project(&state).await;

    let task = state
        .tasks
        .create_task(&admin(), new_task(project_id, "Still saved"))
        .await
        .unwrap();

    let found = state.tasks.get_task(&admin(), task.id).await.unwrap();
    assert_eq!(found, task);
}

#[tokio::test]
async fn created_task_defaults_to_todo_and_is_listed_by_project() {
    let (state, _) = memory_state();
    let project_id = project(&state).await;

    let task = state
        .tasks
        .create_task(&admin(), new_task(project_id, "Default status"))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Todo);

    let listed = state
        .tasks
        .get_tasks_by_project(&admin(), project_id)
        .await
        .unwrap();
    assert_eq!(listed, vec![task]);
}

#[tokio::test]
async fn assign_replaces_previous_assignee() {
    let (state, audit) = memory_state();
    let project_id = project(&state).await;
    let first = developer(&state, "first").await;
    let second = developer(&state, "second").await;
    let task = state
        .tasks
        .create_task(&admin(), new_task(project_id, "Handover"))
        .await
        .unwrap();

    state.tasks.assign_task(&admin(), task.id, first).await.unwrap();
    let before = state
        .tasks
        .get_tasks_by_developer(&admin(), first)
        .await
        .unwrap();
    assert_eq!(before.len(), 1);

    let reassigned = state.tasks.assign_task(&admin(), task.id, second).await.unwrap();
    assert_eq!(reassigned.developer_id, Some(second));

    let old = state
        .tasks
        .get_tasks_by_developer(&admin(), first)
        .await
        .unwrap();
    assert!(old.is_empty());
    let new = state
        .tasks
        .get_tasks_by_developer(&admin(), second)
        .await
        .unwrap();
    assert_eq!(new.len(), 1);

    let updates = audit
        .entries()
        .into_iter()
        .filter(|e| e.entity_type == "Task" && e.action_type == "UPDATE")
        .count();
    assert_eq!(updates, 2);
}

#[tokio::test]
async fn assign_unknown_developer_is_not_found() {
    let (state, audit) = memory_state();
    let project_id = project(&state).await;
    let task = state
        .tasks
        .create_task(&admin(), new_task(project_id, "Nobody"))
        .await
        .unwrap();
    let before = audit.entries().len();

    let err = state.tasks.assign_task(&admin(), task.id, 404).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { resource: "Developer", .. }));
    assert_eq!(audit.entries().len(), before);
}

#[tokio::test]
async fn forbidden_assign_has_no_side_effects() {
    let (state, audit) = memory_state();
    let project_id = project(&state).await;
    let dev_id = developer(&state, "dana").await;
    let task = state
        .tasks
        .create_task(&admin(), new_task(project_id, "Guarded"))
        .await
        .unwrap();
    let before = audit.entries().len();

    let dana = actor(2, "dana", &[Role::Developer]);
    let err = state.tasks.assign_task(&dana, task.id, dev_id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let unchanged = state.tasks.get_task(&admin(), task.id).await.unwrap();
    assert_eq!(unchanged.developer_id, None);
    assert_eq!(audit.entries().len(), before);
}

#[tokio::test]
async fn admin_update_of_missing_task_is_not_found() {
    let (state, _) = memory_state();
    let err = state
        .tasks
        .update_task(&admin(), 42, UpdateTask::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { resource: "Task", .. }));
}

#[tokio::test]
async fn overdue_excludes_done_and_future_tasks() {
    let (state, _) = memory_state();
    let project_id = project(&state).await;
    let yesterday = Utc::now().date_naive() - Duration::days(1);
    let tomorrow = Utc::now().date_naive() + Duration::days(1);

    let late = state
        .tasks
        .create_task(
            &admin(),
            CreateTask {
                due_date: Some(yesterday),
                ..new_task(project_id, "Late")
            },
        )
        .await
        .unwrap();
    state
        .tasks
        .create_task(
            &admin(),
            CreateTask {
                due_date: Some(yesterday),
                status: Some(TaskStatus::Done),
                ..new_task(project_id, "Finished")
            },
        )
        .await
        .unwrap();
    state
        .tasks
        .create_task(
            &admin(),
            CreateTask {
                due_date: Some(tomorrow),
                ..new_task(project_id, "Upcoming")
            },
        )
        .await
        .unwrap();

    let overdue = state.tasks.get_overdue_tasks(&admin()).await.unwrap();
    assert_eq!(overdue, vec![late]);
}

#[tokio::test]
async fn sorted_by_unknown_field_is_invalid_argument() {
    let (state, _) = memory_state();
    let err = state
        .tasks
        .get_tasks_sorted(&admin(), "nonexistent_field")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

#[tokio::test]
async fn concurrent_updates_do_not_interleave_audit_entries() {
    let (state, audit) = memory_state();
    let project_id = project(&state).await;
    let task = state
        .tasks
        .create_task(&admin(), new_task(project_id, "Contended"))
        .await
        .unwrap();
    let task_id = task.id;

    let mut handles = Vec::new();
    for i in 0..8 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            state
                .tasks
                .update_task(
                    &admin(),
                    task_id,
                    UpdateTask {
                        title: Some(format!("Revision {i}")),
                        ..Default::default()
                    },
                )
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let updates: Vec<_> = audit
        .entries()
        .into_iter()
        .filter(|e| e.entity_type == "Task" && e.action_type == "UPDATE")
        .collect();
    assert_eq!(updates.len(), 8);

    // The newest entry matches the committed state.
    let current = state.tasks.get_task(&admin(), task_id).await.unwrap();
    assert_eq!(updates.last().unwrap().payload["title"], current.title);
}

fn assert_validation_failed(result: Result<impl std::fmt::Debug, AppError>, field: &str) {
    match result {
        Err(AppError::ValidationFailed(errors)) => {
            assert!(
                errors.iter().any(|e| e.field == field),
                "expected an error on {field}, got {errors:?}"
            );
        }
        other => panic!("expected validation failure on {field}, got {other:?}"),
    }
}

#[tokio::test]
async fn task_title_length_is_measured_after_trimming() {
    let (state, audit) = memory_state();
    let project_id = project(&state).await;
    let before = audit.entries().len();

    let too_long = "t".repeat(101);
    for title in ["", "   ", "x", " x ", too_long.as_str()] {
        let result = state
            .tasks
            .create_task(&admin(), new_task(project_id, title))
            .await;
        assert_validation_failed(result, "title");
    }
    assert_eq!(audit.entries().len(), before);
    assert!(state.tasks.get_all_tasks(&admin()).await.unwrap().is_empty());

    let shortest = state
        .tasks
        .create_task(&admin(), new_task(project_id, "ab"))
        .await
        .unwrap();
    assert_eq!(shortest.title, "ab");

    let padded = format!("  {}  ", "t".repeat(100));
    let longest = state
        .tasks
        .create_task(&admin(), new_task(project_id, &padded))
        .await
        .unwrap();
    assert_eq!(longest.title, "t".repeat(100));
}

#[tokio::test]
async fn partial_update_rejects_blank_title_and_keeps_task() {
    let (state, _) = memory_state();
    let project_id = project(&state).await;
    let task = state
        .tasks
        .create_task(&admin(), new_task(project_id, "Original"))
        .await
        .unwrap();

    let too_long = "u".repeat(101);
    for title in ["  ", " y ", too_long.as_str()] {
        let result = state
            .tasks
            .update_task(
                &admin(),
                task.id,
                UpdateTask {
                    title: Some(title.to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert_validation_failed(result, "title");
    }
    let unchanged = state.tasks.get_task(&admin(), task.id).await.unwrap();
    assert_eq!(unchanged.title, "Original");

    let renamed = state
        .tasks
        .update_task(
            &admin(),
            task.id,
            UpdateTask {
                title: Some("  Renamed  ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.title, "Renamed");
}

#[tokio::test]
async fn blank_project_and_developer_names_are_rejected() {
    let (state, _) = memory_state();
    let deadline = Some(Utc::now().date_naive() + Duration::days(7));

    let too_long = "p".repeat(101);
    for name in ["   ", " p ", too_long.as_str()] {
        let result = state
            .projects
            .create_project(
                &admin(),
                CreateProject {
                    name: name.to_string(),
                    deadline,
                    ..Default::default()
                },
            )
            .await;
        assert_validation_failed(result, "name");
    }
    let project = state
        .projects
        .create_project(
            &admin(),
            CreateProject {
                name: " Apollo ".to_string(),
                deadline,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(project.name, "Apollo");

    let result = state
        .developers
        .create_developer(
            &admin(),
            CreateDeveloper {
                name: " ".to_string(),
                email: "blank@test.com".to_string(),
                skills: vec![],
            },
        )
        .await;
    assert_validation_failed(result, "name");

    let developer = state
        .developers
        .create_developer(
            &admin(),
            CreateDeveloper {
                name: " Grace ".to_string(),
                email: " Grace@Test.com ".to_string(),
                skills: vec![" rust ".to_string(), "  ".to_string()],
            },
        )
        .await
        .unwrap();
    assert_eq!(developer.name, "Grace");
    assert_eq!(developer.email, "grace@test.com");
    assert_eq!(developer.skills, vec!["rust".to_string()]);

    let result = state
        .developers
        .update_developer(
            &admin(),
            developer.id,
            CreateDeveloper {
                name: "   ".to_string(),
                email: "grace@test.com".to_string(),
                skills: vec![],
            },
        )
        .await;
    assert_validation_failed(result, "name");
}

#[tokio::test]
async fn update_racing_a_create_is_audited_after_it() {
    let audit = Arc::new(MemoryAuditLog::new());
    let backend = Backend {
        store: Arc::new(MemoryStore::new()),
        audit_recorder: Arc::new(SlowCreateRecorder {
            inner: audit.clone(),
        }),
        audit_query: audit.clone(),
    };
    let state = project_tracker::build_state(backend, common::test_config());
    let project_id = project(&state).await;

    // The first task gets id 1; keep editing it until it exists.
    let editor = {
        let state = state.clone();
        tokio::spawn(async move {
            for _ in 0..500 {
                let edit = UpdateTask {
                    title: Some("Edited".to_string()),
                    ..Default::default()
                };
                match state.tasks.update_task(&admin(), 1, edit).await {
                    Ok(task) => return task,
                    Err(AppError::NotFound { .. }) => {
                        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                    }
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            panic!("task never appeared");
        })
    };

    let created = state
        .tasks
        .create_task(&admin(), new_task(project_id, "Fresh"))
        .await
        .unwrap();
    assert_eq!(created.id, 1);
    editor.await.unwrap();

    let actions: Vec<String> = audit
        .entries()
        .into_iter()
        .filter(|e| e.entity_type == "Task" && e.entity_id == "1")
        .map(|e| e.action_type)
        .collect();
    assert_eq!(actions, vec!["CREATE".to_string(), "UPDATE".to_string()]);
}
