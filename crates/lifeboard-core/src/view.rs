//! View state machine and the pure models each view renders from.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};
use lifeboard_shared::{Project, Status, Task};
use tracing::debug;

use crate::calendar::{CalendarMode, date_key, month_grid, period_label, start_of_week, week_strip};
use crate::filter::{DashboardSummary, dashboard_summary, matches_search};
use crate::notify::Toast;
use crate::prefs::Theme;
use crate::reorder::Container;
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Projects,
    Daily,
    Monthly,
    Archive,
}

impl View {
    pub const ALL: [View; 4] = [View::Projects, View::Daily, View::Monthly, View::Archive];

    pub fn as_str(self) -> &'static str {
        match self {
            View::Projects => "projects",
            View::Daily => "daily",
            View::Monthly => "monthly",
            View::Archive => "archive",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "projects" | "board" => Some(View::Projects),
            "daily" | "day" => Some(View::Daily),
            "monthly" | "calendar" => Some(View::Monthly),
            "archive" => Some(View::Archive),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            View::Projects => "Projects",
            View::Daily => "Daily",
            View::Monthly => "Calendar",
            View::Archive => "Archive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectColumn {
    pub project: Project,
    pub tasks: Vec<Task>,
    pub done: usize,
    pub total: usize,
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardModel {
    pub columns: Vec<ProjectColumn>,
    pub summary: DashboardSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgendaDay {
    pub date: NaiveDate,
    pub is_today: bool,
    pub is_selected: bool,
    pub task_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgendaModel {
    pub week: Vec<AgendaDay>,
    pub selected: NaiveDate,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub in_period: bool,
    pub is_today: bool,
    pub is_selected: bool,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarModel {
    pub mode: CalendarMode,
    pub label: String,
    pub cells: Vec<CalendarCell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveModel {
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewModel {
    Board(BoardModel),
    Agenda(AgendaModel),
    Calendar(CalendarModel),
    Archive(ArchiveModel),
}

impl ViewModel {
    pub fn view(&self) -> View {
        match self {
            ViewModel::Board(_) => View::Projects,
            ViewModel::Agenda(_) => View::Daily,
            ViewModel::Calendar(_) => View::Monthly,
            ViewModel::Archive(_) => View::Archive,
        }
    }

    /// Sortable containers on screen. Only the board has any.
    pub fn containers(&self) -> BTreeSet<Container> {
        let ViewModel::Board(board) = self else {
            return BTreeSet::new();
        };
        let mut out: BTreeSet<Container> = board
            .columns
            .iter()
            .map(|column| Container::ProjectTasks(column.project.project_id.clone()))
            .collect();
        out.insert(Container::ProjectList);
        out
    }
}

/// Derives what the active view shows from the store alone.
pub fn compute_view_model(store: &StateStore, today: NaiveDate) -> ViewModel {
    match store.current_view() {
        View::Projects => ViewModel::Board(board_model(store, today)),
        View::Daily => ViewModel::Agenda(agenda_model(store, today)),
        View::Monthly => ViewModel::Calendar(calendar_model(store, today)),
        View::Archive => ViewModel::Archive(archive_model(store)),
    }
}

fn board_model(store: &StateStore, today: NaiveDate) -> BoardModel {
    let filter = store.filter();
    let mut projects: Vec<&Project> = store.projects().iter().collect();
    projects.sort_by_key(|project| project.order_key());

    let columns = projects
        .into_iter()
        .map(|project| {
            let owned: Vec<&Task> = store
                .tasks()
                .iter()
                .filter(|task| task.project_id == project.project_id)
                .collect();
            let total = owned.len();
            let done = owned
                .iter()
                .filter(|task| task.status == Status::Completed)
                .count();
            ProjectColumn {
                project: project.clone(),
                tasks: filter.for_project(store.tasks(), &project.project_id),
                done,
                total,
                progress: percent(done, total),
            }
        })
        .collect();

    BoardModel {
        columns,
        summary: dashboard_summary(store.tasks(), today),
    }
}

fn agenda_model(store: &StateStore, today: NaiveDate) -> AgendaModel {
    let filter = store.filter();
    let selected = store.selected_date();
    let week = week_strip(today, store.week_offset())
        .into_iter()
        .map(|date| {
            let key = date_key(date);
            AgendaDay {
                date,
                is_today: date == today,
                is_selected: date == selected,
                task_count: store
                    .tasks()
                    .iter()
                    .filter(|task| filter.matches(task) && task.matches_day(&key))
                    .count(),
            }
        })
        .collect();

    AgendaModel {
        week,
        selected,
        tasks: filter.for_date(store.tasks(), selected),
    }
}

fn calendar_model(store: &StateStore, today: NaiveDate) -> CalendarModel {
    let filter = store.filter();
    let cursor = store.calendar_cursor();
    let mode = store.calendar_mode();
    let days = match mode {
        CalendarMode::Month => month_grid(cursor),
        CalendarMode::Week => {
            let start = start_of_week(cursor, Weekday::Mon);
            week_strip(start, 0)
        }
    };

    let cells = days
        .into_iter()
        .map(|date| CalendarCell {
            date,
            in_period: match mode {
                CalendarMode::Month => date.month() == cursor.month() && date.year() == cursor.year(),
                CalendarMode::Week => true,
            },
            is_today: date == today,
            is_selected: date == store.selected_date(),
            tasks: filter.for_date(store.tasks(), date),
        })
        .collect();

    CalendarModel {
        mode,
        label: period_label(cursor, mode),
        cells,
    }
}

fn archive_model(store: &StateStore) -> ArchiveModel {
    let search = &store.filter().search;
    let mut tasks: Vec<Task> = store
        .archived_tasks()
        .iter()
        .filter(|task| matches_search(task, search))
        .cloned()
        .collect();
    tasks.sort_by_key(Task::order_key);

    let mut projects = store.archived_projects().to_vec();
    projects.sort_by_key(Project::order_key);
    ArchiveModel { projects, tasks }
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done * 100) / total).min(100) as u8
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingDelta {
    pub bound: Vec<Container>,
    pub unbound: Vec<Container>,
}

impl BindingDelta {
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty() && self.unbound.is_empty()
    }
}

/// Which containers currently accept drags. Syncing to the same set twice
/// is a no-op.
#[derive(Debug, Clone, Default)]
pub struct DragBindings {
    bound: BTreeSet<Container>,
}

impl DragBindings {
    pub fn sync(&mut self, wanted: BTreeSet<Container>) -> BindingDelta {
        let delta = BindingDelta {
            bound: wanted.difference(&self.bound).cloned().collect(),
            unbound: self.bound.difference(&wanted).cloned().collect(),
        };
        self.bound = wanted;
        delta
    }

    pub fn clear(&mut self) -> BindingDelta {
        self.sync(BTreeSet::new())
    }

    pub fn is_bound(&self, container: &Container) -> bool {
        self.bound.contains(container)
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

/// Paints view models. Implementations own all presentation.
pub trait ViewSink: Send {
    fn paint(&mut self, model: &ViewModel, theme: Theme) -> anyhow::Result<()>;

    fn drag_bindings_changed(&mut self, _delta: &BindingDelta) {}

    fn toast(&mut self, _toast: &Toast) {}
}

/// Sink that paints nothing.
#[derive(Debug, Default)]
pub struct NullSink;

impl ViewSink for NullSink {
    fn paint(&mut self, _model: &ViewModel, _theme: Theme) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewTrigger {
    Show(View),
    /// A calendar cell was picked: open that day.
    OpenDay(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderReport {
    pub view: View,
    pub bindings: BindingDelta,
}

#[derive(Debug, Default)]
pub struct ViewController {
    bindings: DragBindings,
    renders: u64,
}

impl ViewController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transition(&mut self, store: &mut StateStore, trigger: ViewTrigger) -> View {
        let from = store.current_view();
        let to = match trigger {
            ViewTrigger::Show(view) => view,
            ViewTrigger::OpenDay(day) => {
                store.select_date(day);
                View::Daily
            }
        };
        if from != to {
            store.set_view(to);
        }
        debug!(from = from.as_str(), to = to.as_str(), "view transition");
        to
    }

    /// Recomputes the active view, syncs drag bindings and paints.
    pub fn render(&mut self, store: &StateStore, today: NaiveDate, sink: &mut dyn ViewSink) -> anyhow::Result<RenderReport> {
        let (model, report) = self.prepare(store, today, sink);
        sink.paint(&model, store.theme())?;
        self.renders += 1;
        Ok(report)
    }

    /// Like [`render`](Self::render) but leaves the sink unpainted.
    pub fn sync(&mut self, store: &StateStore, today: NaiveDate, sink: &mut dyn ViewSink) -> RenderReport {
        self.prepare(store, today, sink).1
    }

    fn prepare(&mut self, store: &StateStore, today: NaiveDate, sink: &mut dyn ViewSink) -> (ViewModel, RenderReport) {
        let model = compute_view_model(store, today);
        let delta = self.bindings.sync(model.containers());
        if !delta.is_empty() {
            debug!(bound = delta.bound.len(), unbound = delta.unbound.len(), "drag bindings changed");
            sink.drag_bindings_changed(&delta);
        }
        let report = RenderReport {
            view: model.view(),
            bindings: delta,
        };
        (model, report)
    }

    pub fn bindings(&self) -> &DragBindings {
        &self.bindings
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }
}
