use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow, bail};
use chrono::Utc;
use chrono_tz::Tz;
use clap::Parser;
use lifeboard_shared::{Priority, ProjectCreate, ProjectPatch, Status, TaskCreate, TaskPatch};
use tracing::{debug, info, instrument, warn};

use crate::calendar::{CalendarMode, date_key, parse_date_key, parse_reminder};
use crate::cli::{Command, ProjectCommand, ShellLine, TaskFields, ViewArgs, split_words};
use crate::filter::SortKey;
use crate::render::short_id;
use crate::view::{View, ViewTrigger};
use crate::workspace::{AssumeYes, Confirm, Workspace, WorkspaceError};

/// Asks on stdin; anything but `y`/`yes` declines.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, title: &str, message: &str) -> bool {
        print!("{title} {message} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Picks the candidate equal to `token`, else the only one starting with it.
pub fn resolve_prefix<'a>(token: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut prefixed = Vec::new();
    for candidate in candidates {
        if candidate == token {
            return Some(candidate);
        }
        if candidate.starts_with(token) {
            prefixed.push(candidate);
        }
    }
    match prefixed.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

fn resolve_task(ws: &Workspace, token: &str) -> anyhow::Result<String> {
    let store = ws.store().lock();
    let ids = store
        .tasks()
        .iter()
        .chain(store.archived_tasks())
        .map(|task| task.task_id.as_str());
    resolve_prefix(token, ids)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no single task matches '{token}'"))
}

/// Projects resolve by id, id prefix or case-insensitive name.
fn resolve_project(ws: &Workspace, token: &str) -> anyhow::Result<String> {
    let store = ws.store().lock();
    let all: Vec<_> = store.projects().iter().chain(store.archived_projects()).collect();

    if let Some(project) = all.iter().find(|project| project.name.eq_ignore_ascii_case(token)) {
        return Ok(project.project_id.clone());
    }
    resolve_prefix(token, all.iter().map(|project| project.project_id.as_str()))
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no single project matches '{token}'"))
}

fn parse_day(raw: &str) -> anyhow::Result<String> {
    parse_date_key(raw)
        .map(date_key)
        .ok_or_else(|| anyhow!("invalid date '{raw}', expected YYYY-MM-DD"))
}

fn parse_priority(raw: &str) -> anyhow::Result<Priority> {
    Priority::parse(raw).ok_or_else(|| anyhow!("unknown priority '{raw}'"))
}

fn parse_status(raw: &str) -> anyhow::Result<Status> {
    Status::parse(raw).ok_or_else(|| anyhow!("unknown status '{raw}'"))
}

fn parse_reminder_arg(raw: &str, tz: &Tz) -> anyhow::Result<String> {
    parse_reminder(raw, tz)
        .map(|_| raw.trim().to_string())
        .ok_or_else(|| anyhow!("invalid reminder '{raw}'"))
}

fn joined(words: &[String]) -> Option<String> {
    let text = words.join(" ");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn task_create(ws: &Workspace, fields: &TaskFields) -> anyhow::Result<TaskCreate> {
    let title = joined(&fields.title).ok_or_else(|| anyhow!("a task title is required"))?;
    Ok(TaskCreate {
        title,
        description: fields.description.clone(),
        notes: fields.notes.clone(),
        tags: fields.tags.clone(),
        project_id: fields
            .project
            .as_deref()
            .map(|token| resolve_project(ws, token))
            .transpose()?,
        priority: fields.priority.as_deref().map(parse_priority).transpose()?,
        status: fields.status.as_deref().map(parse_status).transpose()?,
        start_date: fields.start.as_deref().map(parse_day).transpose()?,
        end_date: fields.end.as_deref().map(parse_day).transpose()?,
        execution_day: fields.day.as_deref().map(parse_day).transpose()?,
        reminder: fields
            .reminder
            .as_deref()
            .map(|raw| parse_reminder_arg(raw, &ws.timezone()))
            .transpose()?,
    })
}

/// Empty strings clear optional fields.
fn optional(raw: &Option<String>, parse: impl Fn(&str) -> anyhow::Result<String>) -> anyhow::Result<Option<Option<String>>> {
    match raw.as_deref().map(str::trim) {
        None => Ok(None),
        Some("") => Ok(Some(None)),
        Some(value) => parse(value).map(|value| Some(Some(value))),
    }
}

fn task_patch(ws: &Workspace, fields: &TaskFields) -> anyhow::Result<TaskPatch> {
    let keep = |value: &str| Ok(value.to_string());
    let tz = ws.timezone();
    Ok(TaskPatch {
        title: joined(&fields.title),
        description: optional(&fields.description, keep)?,
        notes: optional(&fields.notes, keep)?,
        tags: (!fields.tags.is_empty()).then(|| fields.tags.clone()),
        project_id: fields
            .project
            .as_deref()
            .map(|token| resolve_project(ws, token))
            .transpose()?,
        priority: fields.priority.as_deref().map(parse_priority).transpose()?,
        status: fields.status.as_deref().map(parse_status).transpose()?,
        start_date: optional(&fields.start, parse_day)?,
        end_date: optional(&fields.end, parse_day)?,
        execution_day: optional(&fields.day, parse_day)?,
        reminder: optional(&fields.reminder, |raw| parse_reminder_arg(raw, &tz))?,
        ..TaskPatch::default()
    })
}

fn apply_view_args(ws: &Workspace, args: &ViewArgs) -> anyhow::Result<()> {
    if let Some(raw) = args.mode.as_deref() {
        let mode = CalendarMode::parse(raw).ok_or_else(|| anyhow!("unknown calendar mode '{raw}'"))?;
        ws.set_calendar_mode(mode)?;
    }
    if args.today {
        ws.calendar_today()?;
    }

    let trigger = match (args.view.as_deref(), args.date.as_deref()) {
        (_, Some(raw)) => {
            let day = parse_date_key(raw).ok_or_else(|| anyhow!("invalid date '{raw}'"))?;
            ViewTrigger::OpenDay(day)
        }
        (Some(raw), None) => ViewTrigger::Show(View::parse(raw).ok_or_else(|| {
            let known: Vec<&str> = View::ALL.iter().map(|view| view.as_str()).collect();
            anyhow!("unknown view '{raw}', expected one of: {}", known.join(", "))
        })?),
        (None, None) => ViewTrigger::Show(ws.store().lock().current_view()),
    };
    let view = match trigger {
        ViewTrigger::Show(view) => view,
        ViewTrigger::OpenDay(_) => View::Daily,
    };

    if let Some(step) = args.shift {
        match view {
            View::Monthly => ws.shift_calendar(step).map(drop)?,
            View::Daily => ws.shift_week(step).map(drop)?,
            other => bail!("--shift does not apply to the {} view", other.as_str()),
        }
    }
    ws.navigate(trigger)?;
    Ok(())
}

fn print_projects(ws: &Workspace) {
    let store = ws.store().lock();
    for project in store.projects() {
        let count = store.project_task_ids(&project.project_id).len();
        println!(
            "{:<9} {} {:<24} {:>3} task{}",
            short_id(&project.project_id),
            project.icon,
            project.name,
            count,
            if count == 1 { "" } else { "s" }
        );
    }
    for project in store.archived_projects() {
        println!(
            "{:<9} {} {:<24} (archived)",
            short_id(&project.project_id),
            project.icon,
            project.name
        );
    }
}

fn print_summary(ws: &Workspace) {
    let summary = ws.summary();
    println!(
        "{} active, {} completed, {} total ({}% done)",
        summary.active, summary.completed, summary.total, summary.completion_percent
    );
    if summary.focus.is_empty() {
        println!("Nothing scheduled for today.");
        return;
    }
    println!("Today's focus:");
    for task in &summary.focus {
        let priority = task.priority.map(|priority| priority.as_str()).unwrap_or("-");
        println!("  {:<9} [{priority}] {}", short_id(&task.task_id), task.title);
    }
}

/// Runs one command against a freshly loaded workspace.
#[instrument(skip(ws, command))]
pub async fn dispatch(ws: &Workspace, command: Option<Command>, yes: bool) -> anyhow::Result<()> {
    let Some(command) = command else {
        ws.init().await?;
        return Ok(());
    };

    ws.load_data().await;
    ws.check_reminders(Utc::now());
    match command {
        Command::Shell => shell(ws, yes).await,
        command => execute_once(ws, command, yes).await,
    }
}

/// Runs `command` and paints the board at most once, after it settles.
async fn execute_once(ws: &Workspace, command: Command, yes: bool) -> anyhow::Result<()> {
    ws.hold_paints();
    let outcome = execute(ws, command, yes).await;
    let painted = ws.release_paints();
    outcome?;
    painted?;
    Ok(())
}

async fn execute(ws: &Workspace, command: Command, yes: bool) -> anyhow::Result<()> {
    let confirm: &dyn Confirm = if yes { &AssumeYes } else { &StdinConfirm };
    debug!(command = ?command, "execute");

    match command {
        Command::View(args) => apply_view_args(ws, &args)?,
        Command::Add(fields) => {
            let data = task_create(ws, &fields)?;
            let task = ws.create_task(data).await?;
            println!("Created task {}", short_id(&task.task_id));
        }
        Command::Edit { id, fields } => {
            let id = resolve_task(ws, &id)?;
            let patch = task_patch(ws, &fields)?;
            ws.update_task(&id, patch).await?;
        }
        Command::Done { id } => {
            let id = resolve_task(ws, &id)?;
            ws.complete(&id).await?;
        }
        Command::Reopen { id } => {
            let id = resolve_task(ws, &id)?;
            ws.reopen(&id).await?;
        }
        Command::Delete { id } => {
            let id = resolve_task(ws, &id)?;
            if !ws.delete_task(&id, confirm).await? {
                println!("Kept task {}", short_id(&id));
            }
        }
        Command::Archive { id } => {
            let id = resolve_task(ws, &id)?;
            ws.archive_task(&id).await?;
        }
        Command::Unarchive { id } => {
            let id = resolve_task(ws, &id)?;
            ws.unarchive_task(&id).await?;
        }
        Command::Convert { id } => {
            let id = resolve_task(ws, &id)?;
            let project = ws.convert_to_project(&id).await?;
            println!("Created project {}", short_id(&project.project_id));
        }
        Command::Move { id, project, position } => {
            let id = resolve_task(ws, &id)?;
            let project_id = resolve_project(ws, &project)?;
            ws.move_task(&id, &project_id, position).await?;
        }
        Command::Project(sub) => execute_project(ws, sub, confirm).await?,
        Command::ClearArchive => {
            let deleted = ws.clear_archive(confirm).await?;
            info!(deleted, "clear-archive finished");
        }
        Command::Search { query } => {
            let query = query.join(" ");
            if !ws.search(&query).await? {
                debug!(query = %query, "search superseded");
            }
        }
        Command::Status { status } => {
            let status = status.as_deref().map(parse_status).transpose()?;
            ws.set_status_filter(status)?;
        }
        Command::Sort { key } => {
            let sort_by = SortKey::parse(&key).ok_or_else(|| anyhow!("unknown sort key '{key}'"))?;
            ws.set_sort(sort_by)?;
        }
        Command::Theme => {
            let theme = ws.toggle_theme()?;
            println!("Theme: {}", theme.as_str());
        }
        Command::Summary => print_summary(ws),
        Command::Reminders => {
            let fresh = ws.check_reminders(Utc::now());
            if fresh.is_empty() {
                println!("No reminders due.");
            }
        }
        Command::Undo => match ws.undo_latest().await {
            Err(WorkspaceError::NothingToUndo) => println!("Nothing to undo."),
            other => other?,
        },
        Command::Shell => bail!("already inside a shell"),
    }
    Ok(())
}

async fn execute_project(ws: &Workspace, command: ProjectCommand, confirm: &dyn Confirm) -> anyhow::Result<()> {
    match command {
        ProjectCommand::List => print_projects(ws),
        ProjectCommand::Add {
            name,
            icon,
            color,
            description,
        } => {
            let name = joined(&name).ok_or_else(|| anyhow!("a project name is required"))?;
            let project = ws
                .create_project(ProjectCreate {
                    name,
                    icon,
                    color,
                    description,
                    tags: Vec::new(),
                })
                .await?;
            println!("Created project {}", short_id(&project.project_id));
        }
        ProjectCommand::Rename { id, name } => {
            let id = resolve_project(ws, &id)?;
            let patch = ProjectPatch {
                name: joined(&name),
                ..ProjectPatch::default()
            };
            ws.update_project(&id, patch).await?;
        }
        ProjectCommand::Delete { id } => {
            let id = resolve_project(ws, &id)?;
            ws.delete_project(&id, confirm).await?;
        }
        ProjectCommand::Archive { id } => {
            let id = resolve_project(ws, &id)?;
            ws.archive_project(&id).await?;
        }
        ProjectCommand::Unarchive { id } => {
            let id = resolve_project(ws, &id)?;
            ws.unarchive_project(&id).await?;
        }
        ProjectCommand::Move { id, position } => {
            let id = resolve_project(ws, &id)?;
            ws.move_project(&id, position).await?;
        }
    }
    Ok(())
}

/// Line-oriented session over one workspace, so undo prompts stay live.
async fn shell(ws: &Workspace, yes: bool) -> anyhow::Result<()> {
    ws.render()?;
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("lb> ");
        io::stdout().flush().context("failed to flush prompt")?;
        line.clear();
        if stdin.lock().read_line(&mut line).context("failed to read command")? == 0 {
            break;
        }

        let words = match split_words(&line) {
            Ok(words) => words,
            Err(err) => {
                eprintln!("error: {err}");
                continue;
            }
        };
        match words.first().map(String::as_str) {
            None => continue,
            Some("quit" | "exit") => break,
            _ => {}
        }

        let parsed = match ShellLine::try_parse_from(&words) {
            Ok(parsed) => parsed,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        ws.expire_toasts(Utc::now());
        if let Err(err) = execute_once(ws, parsed.command, yes).await {
            warn!(error = %err, "shell command failed");
            eprintln!("error: {err:#}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_beats_prefix() {
        let ids = ["abc", "abcdef"];
        assert_eq!(resolve_prefix("abc", ids), Some("abc"));
        assert_eq!(resolve_prefix("abcd", ids), Some("abcdef"));
    }

    #[test]
    fn ambiguous_or_missing_prefix_resolves_to_nothing() {
        let ids = ["abc1", "abc2"];
        assert_eq!(resolve_prefix("abc", ids), None);
        assert_eq!(resolve_prefix("zzz", ids), None);
    }

    #[test]
    fn optional_fields_clear_on_empty_string() {
        let keep = |value: &str| Ok(value.to_string());
        assert_eq!(optional(&None, keep).expect("none"), None);
        assert_eq!(optional(&Some(" ".to_string()), keep).expect("clear"), Some(None));
        assert_eq!(
            optional(&Some("2026-03-01".to_string()), parse_day).expect("day"),
            Some(Some("2026-03-01".to_string()))
        );
        assert!(optional(&Some("tomorrow".to_string()), parse_day).is_err());
    }

    #[test]
    fn joined_trims_and_rejects_blank_titles() {
        assert_eq!(joined(&["Buy".to_string(), "milk".to_string()]), Some("Buy milk".to_string()));
        assert_eq!(joined(&[" ".to_string()]), None);
        assert_eq!(joined(&[]), None);
    }
}
