use serde::{
  Deserialize,
  Serialize
};

pub const GENERAL_PROJECT_ID: &str =
  "general";
pub const ARCHIVE_PROJECT_ID: &str =
  "archive";
pub const SYSTEM_PROJECT_ID: &str =
  "system";

/// Project ids that can never be
/// deleted or swept by bulk actions.
pub const RESERVED_PROJECT_IDS: [&str;
  3] = [
  GENERAL_PROJECT_ID,
  ARCHIVE_PROJECT_ID,
  SYSTEM_PROJECT_ID
];

pub fn is_reserved_project(
  project_id: &str
) -> bool {
  RESERVED_PROJECT_IDS
    .contains(&project_id)
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
  Low,
  Medium,
  High,
  Critical
}

impl Priority {
  pub fn as_str(self) -> &'static str {
    match self {
      | Priority::Low => "low",
      | Priority::Medium => "medium",
      | Priority::High => "high",
      | Priority::Critical => {
        "critical"
      }
    }
  }

  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "low" => Some(Priority::Low),
      | "medium" | "med" => {
        Some(Priority::Medium)
      }
      | "high" => Some(Priority::High),
      | "critical" => {
        Some(Priority::Critical)
      }
      | _ => None
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Status {
  #[default]
  Pending,
  InProgress,
  Completed,
  Archived
}

impl Status {
  pub fn as_str(self) -> &'static str {
    match self {
      | Status::Pending => "pending",
      | Status::InProgress => {
        "in_progress"
      }
      | Status::Completed => {
        "completed"
      }
      | Status::Archived => "archived"
    }
  }

  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "pending" => {
        Some(Status::Pending)
      }
      | "in_progress" | "in-progress" => {
        Some(Status::InProgress)
      }
      | "completed" | "done" => {
        Some(Status::Completed)
      }
      | "archived" => {
        Some(Status::Archived)
      }
      | _ => None
    }
  }

  pub fn is_open(self) -> bool {
    matches!(
      self,
      Status::Pending
        | Status::InProgress
    )
  }
}

fn default_project_id() -> String {
  GENERAL_PROJECT_ID.to_string()
}

fn default_project_icon() -> String {
  "📁".to_string()
}

fn default_project_color() -> String {
  "#6366f1".to_string()
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(deny_unknown_fields)]
pub struct Task {
  pub task_id:       String,
  pub title:         String,
  #[serde(default)]
  pub description:   Option<String>,
  #[serde(default)]
  pub notes:         Option<String>,
  #[serde(default)]
  pub tags:          Vec<String>,
  #[serde(default = "default_project_id")]
  pub project_id:    String,
  #[serde(default)]
  pub priority:      Option<Priority>,
  #[serde(default)]
  pub status:        Status,
  #[serde(default)]
  pub start_date:    Option<String>,
  #[serde(default)]
  pub end_date:      Option<String>,
  #[serde(default)]
  pub execution_day: Option<String>,
  #[serde(default)]
  pub reminder:      Option<String>,
  #[serde(default)]
  pub order:         Option<i64>,
  #[serde(
    default,
    rename = "isArchived"
  )]
  pub is_archived:   bool,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub user_id:       Option<String>
}

impl Task {
  /// Manual order with a missing value
  /// treated as zero.
  pub fn order_key(&self) -> i64 {
    self.order.unwrap_or(0)
  }

  pub fn matches_day(
    &self,
    day: &str
  ) -> bool {
    [
      &self.execution_day,
      &self.start_date,
      &self.end_date
    ]
    .into_iter()
    .any(|value| {
      value.as_deref() == Some(day)
    })
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(deny_unknown_fields)]
pub struct Project {
  pub project_id:  String,
  pub name:        String,
  #[serde(default = "default_project_icon")]
  pub icon:        String,
  #[serde(
    default = "default_project_color"
  )]
  pub color:       String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub tags:        Vec<String>,
  #[serde(
    default,
    rename = "isArchived"
  )]
  pub archived:    bool,
  #[serde(default)]
  pub order:       Option<i64>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub user_id:     Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub task_count:  Option<u32>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub done_count:  Option<u32>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub progress:    Option<u32>
}

impl Project {
  pub fn order_key(&self) -> i64 {
    self.order.unwrap_or(0)
  }

  pub fn is_reserved(&self) -> bool {
    is_reserved_project(
      &self.project_id
    )
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct TaskCreate {
  pub title:         String,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description:   Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub notes:         Option<String>,
  #[serde(default)]
  pub tags:          Vec<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub project_id:    Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub priority:      Option<Priority>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub status:        Option<Status>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub start_date:    Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub end_date:      Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub execution_day: Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub reminder:      Option<String>
}

impl From<&Task> for TaskCreate {
  fn from(task: &Task) -> Self {
    Self {
      title:         task.title.clone(),
      description:   task
        .description
        .clone(),
      notes:         task.notes.clone(),
      tags:          task.tags.clone(),
      project_id:    Some(
        task.project_id.clone()
      ),
      priority:      task.priority,
      status:        Some(task.status),
      start_date:    task
        .start_date
        .clone(),
      end_date:      task.end_date.clone(),
      execution_day: task
        .execution_day
        .clone(),
      reminder:      task.reminder.clone()
    }
  }
}

/// Partial task update. Outer `None`
/// leaves a field untouched; for
/// clearable fields `Some(None)` sends
/// an explicit null.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct TaskPatch {
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub title:         Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description:
    Option<Option<String>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub notes: Option<Option<String>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub tags:          Option<Vec<String>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub project_id:    Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub priority:      Option<Priority>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub status:        Option<Status>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub start_date:
    Option<Option<String>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub end_date: Option<Option<String>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub execution_day:
    Option<Option<String>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub reminder: Option<Option<String>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub order:         Option<i64>,
  #[serde(
    rename = "isArchived",
    skip_serializing_if = "Option::is_none"
  )]
  pub is_archived:   Option<bool>
}

impl TaskPatch {
  pub fn status(
    status: Status
  ) -> Self {
    Self {
      status: Some(status),
      ..Self::default()
    }
  }

  pub fn move_to(
    project_id: &str
  ) -> Self {
    Self {
      project_id: Some(
        project_id.to_string()
      ),
      ..Self::default()
    }
  }

  pub fn archived(
    archived: bool
  ) -> Self {
    Self {
      is_archived: Some(archived),
      status: Some(if archived {
        Status::Archived
      } else {
        Status::Pending
      }),
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }

  /// Applies the patch to a local copy,
  /// mirroring what the remote store
  /// does on `PUT /tasks/{id}`.
  pub fn apply_to(
    &self,
    task: &mut Task
  ) {
    if let Some(title) = &self.title {
      task.title = title.clone();
    }
    if let Some(description) =
      &self.description
    {
      task.description =
        description.clone();
    }
    if let Some(notes) = &self.notes {
      task.notes = notes.clone();
    }
    if let Some(tags) = &self.tags {
      task.tags = tags.clone();
    }
    if let Some(project_id) =
      &self.project_id
    {
      task.project_id =
        project_id.clone();
    }
    if let Some(priority) =
      self.priority
    {
      task.priority = Some(priority);
    }
    if let Some(status) = self.status {
      task.status = status;
    }
    if let Some(start_date) =
      &self.start_date
    {
      task.start_date =
        start_date.clone();
    }
    if let Some(end_date) =
      &self.end_date
    {
      task.end_date = end_date.clone();
    }
    if let Some(execution_day) =
      &self.execution_day
    {
      task.execution_day =
        execution_day.clone();
    }
    if let Some(reminder) =
      &self.reminder
    {
      task.reminder = reminder.clone();
    }
    if let Some(order) = self.order {
      task.order = Some(order);
    }
    if let Some(is_archived) =
      self.is_archived
    {
      task.is_archived = is_archived;
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct ProjectCreate {
  pub name:        String,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub icon:        Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub color:       Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  #[serde(default)]
  pub tags:        Vec<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct ProjectPatch {
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub name:        Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub icon:        Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub color:       Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description:
    Option<Option<String>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub tags:        Option<Vec<String>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub order:       Option<i64>,
  #[serde(
    rename = "isArchived",
    skip_serializing_if = "Option::is_none"
  )]
  pub archived:    Option<bool>
}

impl ProjectPatch {
  pub fn archived(
    archived: bool
  ) -> Self {
    Self {
      archived: Some(archived),
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }

  pub fn apply_to(
    &self,
    project: &mut Project
  ) {
    if let Some(name) = &self.name {
      project.name = name.clone();
    }
    if let Some(icon) = &self.icon {
      project.icon = icon.clone();
    }
    if let Some(color) = &self.color {
      project.color = color.clone();
    }
    if let Some(description) =
      &self.description
    {
      project.description =
        description.clone();
    }
    if let Some(tags) = &self.tags {
      project.tags = tags.clone();
    }
    if let Some(order) = self.order {
      project.order = Some(order);
    }
    if let Some(archived) =
      self.archived
    {
      project.archived = archived;
    }
  }
}

/// Query parameters for
/// `GET /tasks`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct TaskQuery {
  pub project_id: Option<String>,
  pub status:     Option<Status>,
  pub priority:   Option<Priority>,
  pub search:     Option<String>,
  pub sort:       Option<String>,
  pub archived:   bool
}

impl TaskQuery {
  pub fn archived() -> Self {
    Self {
      archived: true,
      ..Self::default()
    }
  }

  /// Non-empty query pairs in a stable
  /// order.
  pub fn pairs(
    &self
  ) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(project_id) =
      self.project_id.as_ref()
      && !project_id.is_empty()
    {
      pairs.push((
        "project_id",
        project_id.clone()
      ));
    }
    if let Some(status) = self.status {
      pairs.push((
        "status",
        status.as_str().to_string()
      ));
    }
    if let Some(priority) =
      self.priority
    {
      pairs.push((
        "priority",
        priority.as_str().to_string()
      ));
    }
    if let Some(search) =
      self.search.as_ref()
      && !search.trim().is_empty()
    {
      pairs.push((
        "search",
        search.trim().to_string()
      ));
    }
    if let Some(sort) =
      self.sort.as_ref()
      && !sort.is_empty()
    {
      pairs.push(("sort", sort.clone()));
    }
    pairs.push((
      "archived",
      if self.archived { "1" } else { "0" }
        .to_string()
    ));
    pairs
  }
}

/// Query parameters for
/// `GET /projects`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct ProjectQuery {
  pub archived: bool
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct TaskOrderBody {
  pub ordered_ids: Vec<String>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct ProjectOrderBody {
  pub project_ids: Vec<String>
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn task_defaults_fill_optional_fields()
   {
    let task: Task =
      serde_json::from_str(
        r#"{"task_id":"t1","title":"Write"}"#
      )
      .expect("valid task");

    assert_eq!(
      task.project_id,
      GENERAL_PROJECT_ID
    );
    assert_eq!(
      task.status,
      Status::Pending
    );
    assert_eq!(task.priority, None);
    assert_eq!(task.order_key(), 0);
    assert!(!task.is_archived);
  }

  #[test]
  fn task_rejects_unknown_and_missing_fields()
   {
    let unknown =
      serde_json::from_str::<Task>(
        r#"{"task_id":"t1","title":"x","colour":"red"}"#
      );
    assert!(unknown.is_err());

    let missing =
      serde_json::from_str::<Task>(
        r#"{"title":"x"}"#
      );
    assert!(missing.is_err());
  }

  #[test]
  fn patch_serializes_only_present_fields()
   {
    let patch =
      TaskPatch::archived(true);
    let json =
      serde_json::to_value(&patch)
        .expect("serialize patch");

    assert_eq!(
      json,
      serde_json::json!({
        "status": "archived",
        "isArchived": true
      })
    );

    let cleared = TaskPatch {
      end_date: Some(None),
      ..TaskPatch::default()
    };
    let json =
      serde_json::to_value(&cleared)
        .expect("serialize patch");
    assert_eq!(
      json,
      serde_json::json!({
        "end_date": null
      })
    );
  }

  #[test]
  fn project_reads_server_counters() {
    let project: Project =
      serde_json::from_str(
        r#"{"project_id":"p1","name":"Home","isArchived":false,"order":2,"user_id":"u","task_count":4,"done_count":1,"progress":25}"#
      )
      .expect("valid project");

    assert_eq!(project.icon, "📁");
    assert_eq!(project.progress, Some(25));
    assert!(!project.is_reserved());
  }

  #[test]
  fn query_pairs_skip_empty_values() {
    let query = TaskQuery {
      status: Some(Status::InProgress),
      search: Some("  ".to_string()),
      sort: Some("priority".to_string()),
      ..TaskQuery::default()
    };

    assert_eq!(
      query.pairs(),
      vec![
        (
          "status",
          "in_progress".to_string()
        ),
        (
          "sort",
          "priority".to_string()
        ),
        ("archived", "0".to_string()),
      ]
    );
  }
}
