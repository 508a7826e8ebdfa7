use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Datelike;
use lifeboard_shared::{Priority, Project, Status, Task};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::notify::{NotificationKind, Toast};
use crate::prefs::Theme;
use crate::view::{AgendaModel, ArchiveModel, BindingDelta, BoardModel, CalendarModel, ViewModel, ViewSink};

const SHORT_ID_LEN: usize = 8;

/// Leading characters of an id, enough to address a task from the CLI.
pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// Plain-text painter for terminals and other writers.
#[derive(Debug)]
pub struct TerminalSink<W: Write + Send> {
    out: W,
    color: bool,
    theme: Theme,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };
        Ok(Self::new(io::stdout(), color && io::stdout().is_terminal()))
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            theme: Theme::default(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn colorize(&self, text: &str, role: Role) -> String {
        if !self.color {
            return text.to_string();
        }
        let code = match (self.theme, role) {
            (Theme::Dark, Role::Accent) => "96",
            (Theme::Light, Role::Accent) => "34",
            (Theme::Dark, Role::Muted) => "90",
            (Theme::Light, Role::Muted) => "37",
            (_, Role::Danger) => "31",
            (_, Role::Good) => "32",
            (_, Role::Warn) => "33",
        };
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    fn task_rows(&self, tasks: &[Task]) -> Vec<Vec<String>> {
        tasks
            .iter()
            .map(|task| {
                let status = match task.status {
                    Status::Completed => self.colorize("done", Role::Good),
                    Status::InProgress => self.colorize("in progress", Role::Accent),
                    Status::Archived => self.colorize("archived", Role::Muted),
                    Status::Pending => "pending".to_string(),
                };
                let priority = match task.priority {
                    Some(Priority::Critical) => self.colorize("critical", Role::Danger),
                    Some(Priority::High) => self.colorize("high", Role::Warn),
                    Some(other) => other.as_str().to_string(),
                    None => String::new(),
                };
                let due = task
                    .execution_day
                    .clone()
                    .or_else(|| task.end_date.clone())
                    .unwrap_or_default();
                let tags = task
                    .tags
                    .iter()
                    .map(|tag| format!("#{tag}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                vec![
                    self.colorize(short_id(&task.task_id), Role::Warn),
                    task.title.clone(),
                    priority,
                    status,
                    due,
                    tags,
                ]
            })
            .collect()
    }

    fn task_table(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        if tasks.is_empty() {
            let empty = self.colorize("  (no tasks)", Role::Muted);
            writeln!(self.out, "{empty}")?;
            return Ok(());
        }
        let rows = self.task_rows(tasks);
        write_table(&mut self.out, headers(&["ID", "Title", "Priority", "Status", "Day", "Tags"]), rows)
    }

    fn paint_board(&mut self, board: &BoardModel) -> anyhow::Result<()> {
        let summary = &board.summary;
        writeln!(
            self.out,
            "{} active, {} done, {}% complete",
            summary.active, summary.completed, summary.completion_percent
        )?;
        if !summary.focus.is_empty() {
            let label = self.colorize("Today's focus:", Role::Accent);
            let titles: Vec<&str> = summary.focus.iter().map(|task| task.title.as_str()).collect();
            writeln!(self.out, "{label} {}", titles.join(", "))?;
        }

        for column in &board.columns {
            writeln!(self.out)?;
            let heading = self.colorize(&column.project.name, Role::Accent);
            writeln!(
                self.out,
                "{} {heading} [{}]  {}/{} done ({}%)",
                column.project.icon,
                short_id(&column.project.project_id),
                column.done,
                column.total,
                column.progress
            )?;
            self.task_table(&column.tasks)?;
        }
        Ok(())
    }

    fn paint_agenda(&mut self, agenda: &AgendaModel) -> anyhow::Result<()> {
        let strip: Vec<String> = agenda
            .week
            .iter()
            .map(|day| {
                let label = format!("{} {:>2}·{}", day.date.format("%a"), day.date.day(), day.task_count);
                if day.is_selected {
                    format!("[{label}]")
                } else if day.is_today {
                    self.colorize(&format!(" {label} "), Role::Accent)
                } else {
                    format!(" {label} ")
                }
            })
            .collect();
        writeln!(self.out, "{}", strip.join(" "))?;
        writeln!(self.out)?;
        writeln!(self.out, "{}", agenda.selected.format("%A, %B %-d, %Y"))?;
        self.task_table(&agenda.tasks)
    }

    fn paint_calendar(&mut self, calendar: &CalendarModel) -> anyhow::Result<()> {
        let label = self.colorize(&calendar.label, Role::Accent);
        writeln!(self.out, "{label}")?;
        writeln!(self.out, " Mon   Tue   Wed   Thu   Fri   Sat   Sun")?;
        for week in calendar.cells.chunks(7) {
            let line: Vec<String> = week
                .iter()
                .map(|cell| {
                    let marker = if cell.tasks.is_empty() {
                        "  ".to_string()
                    } else {
                        format!("·{}", cell.tasks.len().min(9))
                    };
                    let text = format!("{:>3}{marker}", cell.date.day());
                    if cell.is_today {
                        self.colorize(&text, Role::Accent)
                    } else if !cell.in_period {
                        self.colorize(&text, Role::Muted)
                    } else {
                        text
                    }
                })
                .collect();
            writeln!(self.out, "{}", line.join(" "))?;
        }

        if let Some(selected) = calendar.cells.iter().find(|cell| cell.is_selected) {
            writeln!(self.out)?;
            writeln!(self.out, "{}", selected.date.format("%A, %B %-d"))?;
            self.task_table(&selected.tasks)?;
        }
        Ok(())
    }

    fn paint_archive(&mut self, archive: &ArchiveModel) -> anyhow::Result<()> {
        let heading = self.colorize("Archived projects", Role::Accent);
        writeln!(self.out, "{heading}")?;
        if archive.projects.is_empty() {
            let none = self.colorize("  (none)", Role::Muted);
            writeln!(self.out, "{none}")?;
        } else {
            write_table(&mut self.out, headers(&["ID", "Project"]), project_rows(&archive.projects))?;
        }
        writeln!(self.out)?;
        let heading = self.colorize("Archived tasks", Role::Accent);
        writeln!(self.out, "{heading}")?;
        self.task_table(&archive.tasks)
    }
}

#[derive(Debug, Clone, Copy)]
enum Role {
    Accent,
    Muted,
    Danger,
    Good,
    Warn,
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn project_rows(projects: &[Project]) -> Vec<Vec<String>> {
    projects
        .iter()
        .map(|project| {
            vec![
                short_id(&project.project_id).to_string(),
                format!("{} {}", project.icon, project.name),
            ]
        })
        .collect()
}

impl<W: Write + Send> ViewSink for TerminalSink<W> {
    fn paint(&mut self, model: &ViewModel, theme: Theme) -> anyhow::Result<()> {
        self.theme = theme;
        let title = self.colorize(&format!("== {} ==", model.view().title()), Role::Accent);
        writeln!(self.out, "{title}")?;
        match model {
            ViewModel::Board(board) => self.paint_board(board)?,
            ViewModel::Agenda(agenda) => self.paint_agenda(agenda)?,
            ViewModel::Calendar(calendar) => self.paint_calendar(calendar)?,
            ViewModel::Archive(archive) => self.paint_archive(archive)?,
        }
        self.out.flush()?;
        Ok(())
    }

    fn drag_bindings_changed(&mut self, delta: &BindingDelta) {
        tracing::trace!(bound = delta.bound.len(), unbound = delta.unbound.len(), "sortable regions updated");
    }

    fn toast(&mut self, toast: &Toast) {
        let role = match toast.kind {
            NotificationKind::Success => Role::Good,
            NotificationKind::Error => Role::Danger,
            NotificationKind::Warning => Role::Warn,
            NotificationKind::Info => Role::Accent,
        };
        let mut line = format!("{} {}", toast.kind.icon(), self.colorize(&toast.message, role));
        if toast.undo_id.is_some() {
            line.push_str("  (undo available)");
        }
        if let Err(err) = writeln!(self.out, "{line}") {
            tracing::warn!(error = %err, "failed to print notification");
        }
    }
}

fn write_table<W: Write>(mut writer: W, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::filter::DashboardSummary;
    use crate::view::ProjectColumn;

    fn task(title: &str) -> Task {
        serde_json::from_value(serde_json::json!({
            "task_id": "0123456789abcdef",
            "title": title,
            "priority": "critical",
            "tags": ["home"],
        }))
        .expect("task")
    }

    #[test]
    fn table_pads_by_visible_width() {
        let mut out = Vec::new();
        write_table(
            &mut out,
            headers(&["A", "B"]),
            vec![vec!["\x1b[31mred\x1b[0m".to_string(), "x".to_string()]],
        )
        .expect("table");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A   B ");
        assert_eq!(strip_ansi(lines[2]), "red x ");
    }

    #[test]
    fn board_lists_columns_and_short_ids() {
        let project: Project =
            serde_json::from_value(serde_json::json!({"project_id": "general", "name": "General"})).expect("project");
        let model = ViewModel::Board(BoardModel {
            columns: vec![ProjectColumn {
                project,
                tasks: vec![task("Buy groceries")],
                done: 0,
                total: 1,
                progress: 0,
            }],
            summary: DashboardSummary {
                active: 1,
                completed: 0,
                total: 1,
                completion_percent: 0,
                focus: Vec::new(),
            },
        });

        let mut sink = TerminalSink::new(Vec::new(), false);
        sink.paint(&model, Theme::Dark).expect("paint");
        let text = String::from_utf8(sink.into_inner()).expect("utf8");

        assert!(text.contains("== Projects =="));
        assert!(text.contains("General"));
        assert!(text.contains("01234567 "));
        assert!(text.contains("critical"));
        assert!(text.contains("#home"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn toasts_mention_undo() {
        let mut sink = TerminalSink::new(Vec::new(), false);
        let now = Utc::now();
        sink.toast(&Toast {
            id: Uuid::new_v4(),
            message: "Task deleted".to_string(),
            kind: NotificationKind::Success,
            created_at: now,
            expires_at: now,
            undo_id: Some(Uuid::new_v4()),
        });
        let text = String::from_utf8(sink.into_inner()).expect("utf8");
        assert!(text.contains("Task deleted  (undo available)"));
    }

    #[test]
    fn short_ids_tolerate_short_input() {
        assert_eq!(short_id("general"), "general");
        assert_eq!(short_id("0123456789"), "01234567");
    }
}
