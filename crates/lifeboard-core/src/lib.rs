pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod debounce;
pub mod filter;
pub mod gateway;
pub mod notify;
pub mod prefs;
pub mod render;
pub mod reorder;
pub mod store;
pub mod view;
pub mod workspace;

use std::ffi::OsString;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::config::{
  BackendKind,
  EngineSettings
};
use crate::gateway::{
  Gateway,
  HttpGateway,
  LocalGateway
};
use crate::prefs::{
  FilePreferences,
  KeyValueStore
};
use crate::workspace::Workspace;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting lifeboard CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rc_file.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let settings =
    EngineSettings::from_config(&cfg)
      .context(
        "invalid engine settings"
      )?;
  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let gateway: Arc<dyn Gateway> =
    match settings.backend {
      | BackendKind::Http => {
        Arc::new(HttpGateway::new(
          &settings.api_url,
          settings.api_token.clone()
        )?)
      }
      | BackendKind::Local => {
        Arc::new(
          LocalGateway::open(&data_dir)
            .with_context(|| {
              format!(
                "failed to open local \
                 store at {}",
                data_dir.display()
              )
            })?
        )
      }
    };
  debug!(
    backend = ?settings.backend,
    data_dir = %data_dir.display(),
    "gateway ready"
  );

  let prefs: Arc<dyn KeyValueStore> =
    Arc::new(FilePreferences::open(
      &data_dir
    )?);
  let sink =
    render::TerminalSink::stdout(&cfg)?;
  let workspace = Workspace::new(
    gateway,
    prefs,
    Box::new(sink),
    &settings
  );

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;
  runtime.block_on(commands::dispatch(
    &workspace,
    cli.command,
    cli.yes
  ))?;

  info!("done");
  Ok(())
}
