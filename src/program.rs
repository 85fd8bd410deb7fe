use std::env::current_dir;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Error};
use console::Term;
use tracing::{error, info, info_span, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use uuid::Uuid;

use crate::cli::{Cli, Command, ConfigCommand, GrabArgs};
use crate::config::{default_config_path, edit_config, resolve_target_lists, AppConfig, Logging};
use crate::grab::sink::ConsoleSink;
use crate::grab::{Grabber, ImageDownloader, ResultSink};
use crate::logger::{init_logger, log_system_information, LogSettings};
use crate::reddit::{http_client, RedditClient};

/// The name of the cargo package.
const NAME: &str = env!("CARGO_PKG_NAME");

/// The version of the cargo package.
pub(crate) const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The authors who created the package.
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

/// Drives one invocation of the command line tool.
pub(crate) struct Program {
    cli: Cli,
}

impl Program {
    pub(crate) fn new(cli: Cli) -> Self {
        Self { cli }
    }

    pub(crate) fn run(&self) -> Result<(), Error> {
        match &self.cli.command {
            Command::Version => {
                Term::stdout().write_line(VERSION)?;
                Ok(())
            }
            Command::Config {
                command: ConfigCommand::Edit { config, editor },
            } => self.edit_config(config.clone(), editor.as_deref()),
            Command::Grab(args) => self.grab(args),
        }
    }

    fn config_path(path: Option<PathBuf>) -> Result<PathBuf, Error> {
        match path {
            Some(path) => Ok(path),
            None => default_config_path().context("Unable to locate the default config file"),
        }
    }

    /// Sets up the log file and prints the usual startup trace.
    fn start_logging(&self, logging: &Logging) -> Result<WorkerGuard, Error> {
        let settings = LogSettings::from_config(logging, self.cli.log_file_dir.clone());
        let guard = init_logger(&settings).context("Unable to initialize logging")?;

        log_system_information();
        trace!("Program Name: {}", NAME);
        trace!("Program Version: {}", VERSION);
        trace!("Program Authors: {}", AUTHORS);
        if let Ok(dir) = current_dir() {
            trace!("Program Working Directory: {}", dir.display());
        }

        Ok(guard)
    }

    fn edit_config(&self, path: Option<PathBuf>, editor: Option<&str>) -> Result<(), Error> {
        let path = Self::config_path(path)?;

        // A broken file is exactly what the user may be trying to fix.
        let logging = AppConfig::load(&path).map(|c| c.logging).unwrap_or_default();
        let _guard = self.start_logging(&logging)?;

        match edit_config(&path, editor) {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!("Editor closed without saving, {} is unchanged", path.display());
                Ok(())
            }
            Err(e) => {
                error!(
                    config_path = %path.display(),
                    editor = editor.unwrap_or("$EDITOR"),
                    "Unable to edit config: {}",
                    e
                );
                Err(Error::new(e).context(format!("Unable to edit config {}", path.display())))
            }
        }
    }

    fn grab(&self, args: &GrabArgs) -> Result<(), Error> {
        let path = Self::config_path(args.config.clone())?;
        let config = AppConfig::load(&path)
            .with_context(|| format!("Unable to read config {}", path.display()))?;

        let _guard = self.start_logging(&config.logging)?;
        let span = info_span!("run", run_id = %Uuid::new_v4(), pid = process::id(), version = VERSION);
        let _enter = span.enter();

        Term::stdout().set_title("grabbit");
        info!("Using config {}", path.display());

        let timeout = Duration::from_secs(args.timeout.unwrap_or(config.network.timeout_secs));
        let client = http_client(timeout).context("Unable to build the HTTP client")?;
        let source = RedditClient::new(client.clone(), &config.network.base_url)
            .context("Unable to set up the reddit client")?;
        let downloader = ImageDownloader::new(client);
        let sink = ConsoleSink::new(self.cli.color.enabled());

        let lists = resolve_target_lists(&args.overrides(), &config);
        let summary = Grabber::new(&source, &downloader, &sink).run(lists)?;

        sink.info(
            "grab finished",
            &[
                ("downloaded", summary.downloaded.to_string()),
                ("alreadyExisted", summary.already_existed.to_string()),
                ("skipped", summary.skipped.to_string()),
                ("failed", summary.failed.to_string()),
                ("subredditsSkipped", summary.targets_skipped.to_string()),
            ],
        );

        Ok(())
    }
}
