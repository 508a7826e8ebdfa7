mod support;

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use lifeboard_core::calendar::CalendarMode;
use lifeboard_core::gateway::Gateway;
use lifeboard_core::notify::{NotificationKind, UndoError};
use lifeboard_core::reorder::{Container, RollbackPolicy};
use lifeboard_core::view::{View, ViewTrigger};
use lifeboard_core::workspace::{AssumeYes, Intent, WorkspaceError};
use lifeboard_shared::{GENERAL_PROJECT_ID, Priority, Status, Task, TaskCreate, TaskQuery};
use support::{CountingSink, Harness, Op};

fn undo_id_of(h: &Harness, message: &str) -> uuid::Uuid {
    h.workspace
        .visible_toasts(Utc::now())
        .into_iter()
        .find(|toast| toast.message == message)
        .and_then(|toast| toast.undo_id)
        .expect("undoable toast")
}

#[tokio::test]
async fn completing_then_undoing_restores_status() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.seed_task("write report", GENERAL_PROJECT_ID).await;
    h.workspace.load_data().await;
    let id = h.task_id("write report");

    let done = h.workspace.complete(&id).await.expect("complete");
    assert_eq!(done.status, Status::Completed);

    let undo_id = undo_id_of(&h, "Task completed");
    h.workspace.undo(undo_id).await.expect("undo");

    let store = h.workspace.store().lock();
    assert_eq!(store.task(&id).map(|task| task.status), Some(Status::Pending));
    assert!(store.undo_stack().is_empty());
}

#[tokio::test]
async fn undo_window_closes_with_the_toast() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.seed_task("water plants", GENERAL_PROJECT_ID).await;
    h.workspace.load_data().await;
    let id = h.task_id("water plants");

    h.workspace.complete(&id).await.expect("complete");
    let undo_id = undo_id_of(&h, "Task completed");

    let later = Utc::now() + chrono::Duration::minutes(1);
    let err = h.workspace.undo_at(undo_id, later).await.expect_err("expired");
    assert!(matches!(err, WorkspaceError::Undo(UndoError::Expired(_))));

    let store = h.workspace.store().lock();
    assert_eq!(store.task(&id).map(|task| task.status), Some(Status::Completed));
}

#[tokio::test]
async fn deleting_then_undoing_recreates_the_task() {
    let h = Harness::new(RollbackPolicy::Refetch);
    let home = h.seed_project("Home").await;
    h.gateway
        .inner
        .create_task(&TaskCreate {
            title: "fix sink".to_string(),
            description: Some("kitchen, left tap".to_string()),
            notes: Some("washer size 1/2in".to_string()),
            tags: vec!["home".to_string(), "plumbing".to_string()],
            project_id: Some(home.project_id.clone()),
            priority: Some(Priority::High),
            status: Some(Status::InProgress),
            start_date: Some("2026-03-01".to_string()),
            end_date: Some("2026-03-04".to_string()),
            execution_day: Some("2026-03-02".to_string()),
            reminder: Some("2026-03-02T09:30:00Z".to_string()),
        })
        .await
        .expect("seed task");
    h.workspace.load_data().await;
    let id = h.task_id("fix sink");
    let original = h.workspace.store().lock().task(&id).cloned().expect("task");

    assert!(h.workspace.delete_task(&id, &AssumeYes).await.expect("delete"));
    assert!(h.workspace.store().lock().any_task(&id).is_none());

    h.workspace.undo_latest().await.expect("undo");

    let store = h.workspace.store().lock();
    let restored = store
        .tasks()
        .iter()
        .find(|task| task.title == "fix sink")
        .expect("recreated");
    assert_ne!(restored.task_id, id);
    assert_eq!(
        *restored,
        Task {
            task_id: restored.task_id.clone(),
            order: restored.order,
            ..original
        }
    );
}

#[tokio::test]
async fn archived_tasks_cannot_be_completed() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.seed_task("old errand", GENERAL_PROJECT_ID).await;
    h.workspace.load_data().await;
    let id = h.task_id("old errand");
    h.workspace.archive_task(&id).await.expect("archive");

    h.gateway.clear_calls();
    let err = h.workspace.complete(&id).await.expect_err("archived");
    assert!(matches!(err, WorkspaceError::TaskNotFound(_)));
    assert!(!h.gateway.calls().contains(&Op::UpdateTask));
    assert!(h.workspace.store().lock().undo_stack().is_empty());

    let archived = h
        .gateway
        .inner
        .list_tasks(&TaskQuery::archived())
        .await
        .expect("list archived");
    let pairs: Vec<(bool, Status)> = archived.iter().map(|task| (task.is_archived, task.status)).collect();
    assert_eq!(pairs, [(true, Status::Archived)]);
}

#[tokio::test]
async fn broken_paint_still_settles_the_write() {
    let sink = CountingSink::broken();
    let h = Harness::with_sink(RollbackPolicy::Snapshot, Box::new(sink.clone()));
    h.seed_task("pay rent", GENERAL_PROJECT_ID).await;
    h.workspace.load_data().await;
    let id = h.task_id("pay rent");

    let result = h.workspace.complete(&id).await;

    assert!(matches!(result, Err(WorkspaceError::Render(_))));
    assert!(h.gateway.calls().contains(&Op::UpdateTask));
    let remote = h
        .gateway
        .inner
        .list_tasks(&TaskQuery::default())
        .await
        .expect("list");
    assert_eq!(remote.iter().map(|task| task.status).collect::<Vec<_>>(), [Status::Completed]);
    assert_eq!(
        h.workspace.store().lock().task(&id).map(|task| task.status),
        Some(Status::Completed)
    );
    assert!(sink.paints() >= 2);
}

#[tokio::test]
async fn held_paints_collapse_into_one() {
    let sink = CountingSink::default();
    let h = Harness::with_sink(RollbackPolicy::Refetch, Box::new(sink.clone()));
    h.seed_task("stretch", GENERAL_PROJECT_ID).await;
    h.workspace.load_data().await;
    let id = h.task_id("stretch");

    h.workspace.hold_paints();
    h.workspace.complete(&id).await.expect("complete");
    h.workspace.set_calendar_mode(CalendarMode::Week).expect("mode");
    h.workspace.calendar_today().expect("today");
    assert_eq!(sink.paints(), 0);

    assert!(h.workspace.release_paints().expect("release").is_some());
    assert_eq!(sink.paints(), 1);
    assert!(h.workspace.release_paints().expect("release").is_none());

    h.workspace.toggle_theme().expect("theme");
    assert_eq!(sink.paints(), 2);
}

#[tokio::test]
async fn declined_delete_keeps_the_task() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.seed_task("keep me", GENERAL_PROJECT_ID).await;
    h.workspace.load_data().await;
    let id = h.task_id("keep me");

    let decline = |_: &str, _: &str| false;
    assert!(!h.workspace.delete_task(&id, &decline).await.expect("delete"));
    assert!(!h.gateway.calls().contains(&Op::DeleteTask));
    assert!(h.workspace.store().lock().task(&id).is_some());
}

#[tokio::test]
async fn nothing_to_undo_is_reported() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.workspace.load_data().await;
    assert!(matches!(
        h.workspace.undo_latest().await,
        Err(WorkspaceError::NothingToUndo)
    ));
}

#[tokio::test]
async fn failed_completion_rolls_back_and_reports() {
    let h = Harness::new(RollbackPolicy::Snapshot);
    h.seed_task("call mom", GENERAL_PROJECT_ID).await;
    h.workspace.load_data().await;
    let id = h.task_id("call mom");

    h.gateway.fail_next(Op::UpdateTask);
    assert!(h.workspace.complete(&id).await.is_err());

    let store = h.workspace.store().lock();
    assert_eq!(store.task(&id).map(|task| task.status), Some(Status::Pending));
    assert!(store.undo_stack().is_empty());
    drop(store);
    assert!(
        h.workspace
            .visible_toasts(Utc::now())
            .iter()
            .any(|toast| toast.kind == NotificationKind::Error && toast.message == "Failed to update task")
    );
}

#[tokio::test]
async fn deleting_a_project_moves_its_tasks_to_general() {
    let h = Harness::new(RollbackPolicy::Refetch);
    let side = h.seed_project("Side").await;
    h.seed_task("draft", &side.project_id).await;
    h.seed_task("polish", &side.project_id).await;
    h.workspace.load_data().await;

    assert!(
        h.workspace
            .delete_project(&side.project_id, &AssumeYes)
            .await
            .expect("delete project")
    );

    let store = h.workspace.store().lock();
    assert!(store.any_project(&side.project_id).is_none());
    assert_eq!(store.project_task_ids(GENERAL_PROJECT_ID).len(), 2);
}

#[tokio::test]
async fn reserved_project_cannot_be_removed() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.workspace.load_data().await;

    assert!(matches!(
        h.workspace.delete_project(GENERAL_PROJECT_ID, &AssumeYes).await,
        Err(WorkspaceError::ReservedProject(_))
    ));
    assert!(matches!(
        h.workspace.archive_project(GENERAL_PROJECT_ID).await,
        Err(WorkspaceError::ReservedProject(_))
    ));
    assert!(h.gateway.calls().iter().all(|op| !matches!(op, Op::DeleteProject | Op::UpdateProject)));
}

#[tokio::test]
async fn clearing_the_archive_deletes_archived_items() {
    let h = Harness::new(RollbackPolicy::Refetch);
    let old = h.seed_project("Old").await;
    h.seed_task("stale", GENERAL_PROJECT_ID).await;
    h.seed_task("fresh", GENERAL_PROJECT_ID).await;
    h.workspace.load_data().await;

    let stale = h.task_id("stale");
    h.workspace.archive_task(&stale).await.expect("archive task");
    h.workspace.archive_project(&old.project_id).await.expect("archive project");

    let decline = |_: &str, _: &str| false;
    assert_eq!(h.workspace.clear_archive(&decline).await.expect("declined"), 0);

    assert_eq!(h.workspace.clear_archive(&AssumeYes).await.expect("clear"), 2);
    let store = h.workspace.store().lock();
    assert!(store.archived_tasks().is_empty());
    assert!(store.archived_projects().is_empty());
    assert_eq!(store.tasks().len(), 1);
}

#[tokio::test]
async fn converting_a_task_files_it_under_a_new_project() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.seed_task("Kitchen remodel", GENERAL_PROJECT_ID).await;
    h.workspace.load_data().await;
    let id = h.task_id("Kitchen remodel");

    let project = h.workspace.convert_to_project(&id).await.expect("convert");

    let store = h.workspace.store().lock();
    assert_eq!(project.name, "Kitchen remodel");
    assert_eq!(project.icon, "🗂️");
    assert!(store.project(&project.project_id).is_some());
    assert_eq!(store.project_task_ids(&project.project_id), [id]);
}

#[tokio::test]
async fn blank_titles_never_reach_the_gateway() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.workspace.load_data().await;
    h.gateway.clear_calls();

    let blank = TaskCreate {
        title: "   ".to_string(),
        ..TaskCreate::default()
    };
    assert!(matches!(
        h.workspace.create_task(blank).await,
        Err(WorkspaceError::Invalid(_))
    ));
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn reminders_fire_once_per_task() {
    let h = Harness::new(RollbackPolicy::Refetch);
    let now = Utc::now();
    let soon = (now + chrono::Duration::minutes(5)).to_rfc3339();
    h.workspace
        .create_task(TaskCreate {
            title: "standup".to_string(),
            reminder: Some(soon),
            ..TaskCreate::default()
        })
        .await
        .expect("create");

    let fired = h.workspace.check_reminders(now);
    assert_eq!(fired.len(), 1);
    assert!(h.workspace.check_reminders(now).is_empty());
}

#[tokio::test]
async fn failed_active_load_keeps_state_and_reports() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.seed_task("survivor", GENERAL_PROJECT_ID).await;
    assert!(h.workspace.load_data().await);

    h.gateway.fail_next(Op::ListTasks);
    assert!(!h.workspace.load_data().await);

    assert_eq!(h.workspace.store().lock().tasks().len(), 1);
    assert!(
        h.workspace
            .visible_toasts(Utc::now())
            .iter()
            .any(|toast| toast.kind == NotificationKind::Error)
    );
}

#[tokio::test]
async fn archived_list_failure_is_not_fatal() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.seed_task("active", GENERAL_PROJECT_ID).await;

    h.gateway.fail_next(Op::ListArchivedTasks);
    assert!(h.workspace.load_data().await);
    assert_eq!(h.workspace.store().lock().tasks().len(), 1);
}

#[tokio::test]
async fn stale_refresh_is_discarded() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.workspace.load_data().await;

    let gate = h.gateway.gate(Op::ListTasks);
    let (first, second) = tokio::join!(h.workspace.load_data(), async {
        h.seed_task("late arrival", GENERAL_PROJECT_ID).await;
        let applied = h.workspace.load_data().await;
        gate.notify_one();
        applied
    });

    assert!(second, "newer refresh applies");
    assert!(!first, "older refresh is dropped");
    let store = h.workspace.store().lock();
    assert!(store.tasks().iter().any(|task| task.title == "late arrival"));
}

#[tokio::test(start_paused = true)]
async fn search_applies_only_the_last_query_of_a_burst() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.seed_task("buy milk", GENERAL_PROJECT_ID).await;
    h.seed_task("buy bread", GENERAL_PROJECT_ID).await;
    h.workspace.load_data().await;

    let (first, second) = tokio::join!(h.workspace.search("milk"), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.workspace.search("bread").await
    });

    assert!(!first.expect("first search"));
    assert!(second.expect("second search"));
    let store = h.workspace.store().lock();
    assert_eq!(store.filter().search, "bread");
    let visible: Vec<String> = store.filtered_tasks().into_iter().map(|task| task.title).collect();
    assert_eq!(visible, ["buy bread"]);
}

#[tokio::test]
async fn rendering_the_same_view_twice_binds_nothing_new() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.workspace.load_data().await;

    let first = h.workspace.render().expect("render");
    assert_eq!(first.view, View::Projects);
    assert!(first.bindings.bound.contains(&Container::ProjectList));
    assert!(
        first
            .bindings
            .bound
            .contains(&Container::ProjectTasks(GENERAL_PROJECT_ID.to_string()))
    );

    let second = h.workspace.render().expect("render again");
    assert!(second.bindings.is_empty());

    let calendar = h
        .workspace
        .navigate(ViewTrigger::Show(View::Monthly))
        .expect("navigate");
    assert_eq!(calendar.view, View::Monthly);
    assert_eq!(calendar.bindings.unbound.len(), first.bindings.bound.len());
}

#[tokio::test]
async fn picking_a_calendar_day_opens_the_agenda() {
    let h = Harness::new(RollbackPolicy::Refetch);
    h.workspace.load_data().await;
    let day = NaiveDate::from_ymd_opt(2026, 3, 14).expect("date");

    h.workspace
        .dispatch(Intent::Navigate(ViewTrigger::OpenDay(day)), &AssumeYes)
        .await
        .expect("dispatch");

    let store = h.workspace.store().lock();
    assert_eq!(store.current_view(), View::Daily);
    assert_eq!(store.selected_date(), day);
}

#[tokio::test]
async fn theme_toggle_round_trips() {
    let h = Harness::new(RollbackPolicy::Refetch);
    let before = h.workspace.store().lock().theme();

    let toggled = h.workspace.toggle_theme().expect("toggle");
    assert_ne!(toggled, before);
    assert_eq!(h.workspace.toggle_theme().expect("toggle back"), before);
}
