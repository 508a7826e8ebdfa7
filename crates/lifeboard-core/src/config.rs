use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::reorder::RollbackPolicy;

pub const DEFAULT_API_URL: &str =
  "http://localhost:5000/api";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("data.location", "~/.lifeboard"),
      ("backend", "local"),
      ("api.url", DEFAULT_API_URL),
      ("notify.delay_ms", "3000"),
      ("notify.undo_delay_ms", "5000"),
      ("search.debounce_ms", "300"),
      ("reconcile.rollback", "refetch"),
      ("color", "on")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading lifeboardrc");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no lifeboardrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_millis(
    &self,
    key: &str
  ) -> anyhow::Result<Option<Duration>>
  {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    let millis = raw
      .trim()
      .parse::<u64>()
      .with_context(|| {
        format!(
          "{key} must be a whole \
           number of milliseconds, got \
           {raw}"
        )
      })?;
    Ok(Some(Duration::from_millis(
      millis
    )))
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum BackendKind {
  Http,
  Local
}

/// Typed view over the engine keys of
/// a [`Config`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
  pub backend:          BackendKind,
  pub api_url:          String,
  pub api_token:        Option<String>,
  pub notify_delay:     Duration,
  pub undo_delay:       Duration,
  pub search_debounce:  Duration,
  pub rollback:         RollbackPolicy,
  pub calendar_timezone: Option<String>
}

impl Default for EngineSettings {
  fn default() -> Self {
    Self {
      backend:          BackendKind::Local,
      api_url:          DEFAULT_API_URL
        .to_string(),
      api_token:        None,
      notify_delay:     Duration::from_millis(
        3_000
      ),
      undo_delay:       Duration::from_millis(
        5_000
      ),
      search_debounce:  Duration::from_millis(
        300
      ),
      rollback:         RollbackPolicy::Refetch,
      calendar_timezone: None
    }
  }
}

impl EngineSettings {
  #[tracing::instrument(skip(cfg))]
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let defaults = Self::default();

    let backend = match cfg
      .get("backend")
      .unwrap_or_default()
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "http" | "remote" => {
        BackendKind::Http
      }
      | "" | "local" => {
        BackendKind::Local
      }
      | other => {
        return Err(anyhow!(
          "invalid backend setting: \
           {other}"
        ));
      }
    };

    let rollback = match cfg
      .get("reconcile.rollback")
    {
      | Some(raw) => {
        RollbackPolicy::parse(&raw)
          .ok_or_else(|| {
            anyhow!(
              "invalid \
               reconcile.rollback \
               setting: {raw}"
            )
          })?
      }
      | None => defaults.rollback
    };

    let api_token = std::env::var(
      "LIFEBOARD_TOKEN"
    )
    .ok()
    .or_else(|| cfg.get("api.token"))
    .filter(|token| {
      !token.trim().is_empty()
    });

    let calendar_timezone =
      std::env::var(
        "LIFEBOARD_TIMEZONE"
      )
      .ok()
      .or_else(|| {
        cfg.get("calendar.timezone")
      })
      .filter(|tz| {
        !tz.trim().is_empty()
      });

    Ok(Self {
      backend,
      api_url: cfg
        .get("api.url")
        .unwrap_or(defaults.api_url),
      api_token,
      notify_delay: cfg
        .get_millis("notify.delay_ms")?
        .unwrap_or(
          defaults.notify_delay
        ),
      undo_delay: cfg
        .get_millis(
          "notify.undo_delay_ms"
        )?
        .unwrap_or(defaults.undo_delay),
      search_debounce: cfg
        .get_millis(
          "search.debounce_ms"
        )?
        .unwrap_or(
          defaults.search_debounce
        ),
      rollback,
      calendar_timezone
    })
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var("LIFEBOARDRC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  let candidate =
    home.join(".lifeboardrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".lifeboard"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;

  #[test]
  fn rc_file_with_include_and_overrides()
   {
    let temp = tempfile::tempdir()
      .expect("tempdir");
    let extra =
      temp.path().join("extra.rc");
    fs::write(
      &extra,
      "notify.undo_delay_ms = 8000\n"
    )
    .expect("write include");

    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "# lifeboard\nbackend = http \
       # remote store\napi.url = \
       http://example.test/api\ninclude \
       extra.rc\n"
    )
    .expect("write rc");

    let mut cfg = Config::load(Some(&rc))
      .expect("load rc");
    cfg.apply_overrides(vec![(
      "rc.reconcile.rollback"
        .to_string(),
      "snapshot".to_string()
    )]);

    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.get("api.url").as_deref(),
      Some("http://example.test/api")
    );

    let settings =
      EngineSettings::from_config(&cfg)
        .expect("settings");
    assert_eq!(
      settings.backend,
      BackendKind::Http
    );
    assert_eq!(
      settings.undo_delay,
      Duration::from_millis(8_000)
    );
    assert_eq!(
      settings.notify_delay,
      Duration::from_millis(3_000)
    );
    assert_eq!(
      settings.rollback,
      RollbackPolicy::Snapshot
    );
  }

  #[test]
  fn invalid_values_are_reported() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "search.debounce_ms".to_string(),
      "soon".to_string()
    )]);
    assert!(
      EngineSettings::from_config(&cfg)
        .is_err()
    );

    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "backend".to_string(),
      "carrier-pigeon".to_string()
    )]);
    assert!(
      EngineSettings::from_config(&cfg)
        .is_err()
    );
  }

  #[test]
  fn malformed_line_is_an_error() {
    let temp = tempfile::tempdir()
      .expect("tempdir");
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "just words\n")
      .expect("write rc");

    assert!(
      Config::load(Some(&rc)).is_err()
    );
  }
}
