use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "lb",
    version,
    about = "Lifeboard: projects, daily agenda and calendar for your tasks",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "rc-file")]
    pub rc_file: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    /// Answer yes to every confirmation prompt.
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// One line typed into `lb shell`.
#[derive(Parser, Debug, Clone)]
#[command(name = "lb", no_binary_name = true, disable_help_subcommand = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show a view: projects, daily, monthly or archive.
    View(ViewArgs),
    /// Create a task.
    Add(TaskFields),
    /// Change fields of a task.
    Edit {
        id: String,
        #[command(flatten)]
        fields: TaskFields,
    },
    Done {
        id: String,
    },
    Reopen {
        id: String,
    },
    Delete {
        id: String,
    },
    Archive {
        id: String,
    },
    Unarchive {
        id: String,
    },
    /// Turn a task into a project of the same name.
    Convert {
        id: String,
    },
    /// Move a task to another project, optionally at a position.
    Move {
        id: String,
        project: String,
        #[arg(long)]
        position: Option<usize>,
    },
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Permanently delete everything in the archive.
    ClearArchive,
    /// Filter every view by text.
    Search {
        query: Vec<String>,
    },
    /// Filter every view by status; no value clears the filter.
    Status {
        status: Option<String>,
    },
    /// Sort tasks by order, priority, date or status.
    Sort {
        key: String,
    },
    /// Toggle between dark and light.
    Theme,
    /// Counts and today's focus.
    Summary,
    /// Reminders due in the next fifteen minutes.
    Reminders,
    /// Undo the most recent undoable action.
    Undo,
    /// Interactive session; undo works within it.
    Shell,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    pub view: Option<String>,

    /// Day to open, YYYY-MM-DD.
    #[arg(long)]
    pub date: Option<String>,

    /// Calendar granularity: month or week.
    #[arg(long)]
    pub mode: Option<String>,

    /// Move the calendar or week strip by this many periods.
    #[arg(long, allow_hyphen_values = true)]
    pub shift: Option<i32>,

    /// Jump the calendar and week strip back to today.
    #[arg(long, conflicts_with = "shift")]
    pub today: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskFields {
    /// Title words.
    #[arg(trailing_var_arg = true)]
    pub title: Vec<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long = "tag", action = ArgAction::Append)]
    pub tags: Vec<String>,
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub end: Option<String>,
    #[arg(long)]
    pub day: Option<String>,
    #[arg(long)]
    pub reminder: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProjectCommand {
    List,
    Add {
        name: Vec<String>,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Rename {
        id: String,
        name: Vec<String>,
    },
    Delete {
        id: String,
    },
    Archive {
        id: String,
    },
    Unarchive {
        id: String,
    },
    /// Place a project at a position in the project list.
    Move {
        id: String,
        position: usize,
    },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` (or `rc.key:value`) overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

/// Splits a shell line into words, honouring single and double quotes.
pub fn split_words(line: &str) -> anyhow::Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for ch in line.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(ch);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(anyhow!("unterminated {q} quote"));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
