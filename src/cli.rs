use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::TargetOverrides;
use crate::grab::Timeframe;

const AFTER_HELP: &str = "Examples:

  # Grab!
  grabbit grab \\
      --subreddit-destination . \\
      --subreddit-limit 5 \\
      --subreddit-name wallpapers \\
      --subreddit-timeframe day

  # Create/Edit config file
  grabbit config edit

  # Grab from config file
  grabbit grab";

#[derive(Parser, Debug)]
#[command(name = "grabbit")]
#[command(about = "Get top images from subreddits", after_help = AFTER_HELP)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Colorized output
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Directory for the rotated log files
    #[arg(long, global = true)]
    pub log_file_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Grab images. Optionally use `config edit` first to create a config
    Grab(GrabArgs),

    /// Config commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Print version
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Edit or create configuration file
    Edit {
        /// Config file path, defaults to ~/.config/grabbit.toml
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to editor, defaults to $VISUAL or $EDITOR
        #[arg(long, short = 'e')]
        editor: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
pub struct GrabArgs {
    /// Config file path, defaults to ~/.config/grabbit.toml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Subreddit to grab
    #[arg(long = "subreddit-name", visible_alias = "sn")]
    pub subreddit_names: Vec<String>,

    /// Where to store the subreddit
    #[arg(long = "subreddit-destination", visible_alias = "sd")]
    pub subreddit_destinations: Vec<String>,

    /// Take the top subreddits from this timeframe
    #[arg(long = "subreddit-timeframe", visible_alias = "st")]
    pub subreddit_timeframes: Vec<Timeframe>,

    /// Max number of links to try to download
    #[arg(long = "subreddit-limit", value_parser = clap::value_parser!(u32).range(1..))]
    pub subreddit_limits: Vec<u32>,

    /// Request timeout in seconds, overrides network.timeout_secs
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl GrabArgs {
    pub fn overrides(&self) -> TargetOverrides {
        TargetOverrides {
            names: self.subreddit_names.clone(),
            destinations: self.subreddit_destinations.clone(),
            timeframes: self.subreddit_timeframes.clone(),
            limits: self.subreddit_limits.clone(),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub fn enabled(self) -> bool {
        match self {
            ColorChoice::Auto => console::colors_enabled(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_grab_flags() {
        let cli = Cli::try_parse_from([
            "grabbit",
            "grab",
            "--subreddit-name",
            "wallpapers",
            "--subreddit-name",
            "earthporn",
            "--subreddit-timeframe",
            "day",
            "--subreddit-limit",
            "2",
            "--timeout",
            "10",
        ])
        .unwrap();

        match cli.command {
            Command::Grab(args) => {
                let overrides = args.overrides();
                assert_eq!(overrides.names, vec!["wallpapers".to_string(), "earthporn".to_string()]);
                assert!(overrides.destinations.is_empty());
                assert_eq!(overrides.timeframes, vec![Timeframe::Day]);
                assert_eq!(overrides.limits, vec![2]);
                assert_eq!(args.timeout, Some(10));
            }
            other => panic!("expected grab, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["grabbit", "grab", "--subreddit-timeframe", "hour"]).is_err());
        assert!(Cli::try_parse_from(["grabbit", "grab", "--subreddit-limit", "0"]).is_err());
    }

    #[test]
    fn test_parse_config_edit() {
        let cli = Cli::try_parse_from(["grabbit", "--color", "never", "config", "edit", "-e", "nano"]).unwrap();

        assert_eq!(cli.color, ColorChoice::Never);
        match cli.command {
            Command::Config {
                command: ConfigCommand::Edit { config, editor },
            } => {
                assert_eq!(config, None);
                assert_eq!(editor.as_deref(), Some("nano"));
            }
            other => panic!("expected config edit, got {:?}", other),
        }
    }
}
