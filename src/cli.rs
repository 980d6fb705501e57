use std::path::PathBuf;

use clap::{ArgMatches, Args, FromArgMatches, ValueEnum};

use crate::error::CliError;

pub const PROGRAM_NAME: &str = "exp";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Raw,
}

/// Flags accepted by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Allows this command to run while offline
    #[arg(long = "offline", global = true)]
    pub offline: bool,
    /// Fails instead of prompting for input
    #[arg(long = "non-interactive", global = true)]
    pub non_interactive: bool,
    /// Output format
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub output: OutputFormat,
}

/// Invocation-wide settings threaded through every downstream call.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Settings {
    pub offline: bool,
    pub non_interactive: bool,
    pub output: OutputFormat,
    pub debug: bool,
}

impl Settings {
    pub fn from_matches(matches: &ArgMatches, debug: bool) -> Result<Self, CliError> {
        let global = GlobalArgs::from_arg_matches(matches)?;
        Ok(Self {
            offline: global.offline,
            non_interactive: global.non_interactive,
            output: global.output,
            debug,
        })
    }

    /// Prompts are allowed only when neither flag rules them out.
    pub fn interactive(&self) -> bool {
        !self.non_interactive && !self.offline
    }
}

/// Optional positional directory taken by project commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectDirArgs {
    /// Project directory (defaults to the current directory)
    #[arg(value_name = "PROJECT_DIR")]
    pub project_dir: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum HostType {
    Lan,
    Localhost,
    Tunnel,
}

impl HostType {
    pub fn as_str(self) -> &'static str {
        match self {
            HostType::Lan => "lan",
            HostType::Localhost => "localhost",
            HostType::Tunnel => "tunnel",
        }
    }
}

/// Options shaping the URL a project is served under.
#[derive(Args, Debug, Clone, Default)]
pub struct UrlArgs {
    /// Type of host to use
    #[arg(long = "host", value_enum)]
    pub host: Option<HostType>,
    /// Same as --host tunnel
    #[arg(long = "tunnel")]
    pub tunnel: bool,
    /// Same as --host lan
    #[arg(long = "lan")]
    pub lan: bool,
    /// Same as --host localhost
    #[arg(long = "localhost")]
    pub localhost: bool,
    /// Turns dev flag on
    #[arg(long = "dev", overrides_with = "no_dev")]
    pub dev: bool,
    /// Turns dev flag off
    #[arg(long = "no-dev")]
    pub no_dev: bool,
    /// Turns minify flag on
    #[arg(long = "minify")]
    pub minify: bool,
    /// Serves the bundle over https
    #[arg(long = "https")]
    pub https: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UrlSettings {
    pub host: Option<HostType>,
    pub dev: Option<bool>,
    pub minify: bool,
    pub https: bool,
}

impl UrlSettings {
    /// Renders the settings as collaborator flags.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(host) = self.host {
            args.push("--host".to_string());
            args.push(host.as_str().to_string());
        }
        match self.dev {
            Some(true) => args.push("--dev".to_string()),
            Some(false) => args.push("--no-dev".to_string()),
            None => {}
        }
        if self.minify {
            args.push("--minify".to_string());
        }
        if self.https {
            args.push("--https".to_string());
        }
        args
    }
}

impl UrlArgs {
    pub fn resolve(&self) -> Result<UrlSettings, CliError> {
        let shortcuts = [
            (self.tunnel, HostType::Tunnel),
            (self.lan, HostType::Lan),
            (self.localhost, HostType::Localhost),
        ];
        let chosen = shortcuts
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, host)| *host)
            .collect::<Vec<_>>();
        if chosen.len() > 1 {
            return Err(CliError::command(
                "BAD_ARGS",
                "Specify at most one of --tunnel, --lan, and --localhost",
            ));
        }
        let host = match (self.host, chosen.first().copied()) {
            (Some(explicit), Some(shortcut)) if explicit != shortcut => {
                return Err(CliError::command(
                    "BAD_ARGS",
                    format!(
                        "--host {} conflicts with --{}",
                        explicit.as_str(),
                        shortcut.as_str()
                    ),
                ));
            }
            (Some(explicit), _) => Some(explicit),
            (None, shortcut) => shortcut,
        };
        let dev = if self.no_dev {
            Some(false)
        } else if self.dev {
            Some(true)
        } else {
            None
        };
        Ok(UrlSettings {
            host,
            dev,
            minify: self.minify,
            https: self.https,
        })
    }
}

/// Reusable option groups for the shared program builder.
pub trait CommandExt {
    fn global_options(self) -> Self;
    fn url_options(self) -> Self;
    fn project_dir_option(self) -> Self;
}

impl CommandExt for clap::Command {
    fn global_options(self) -> Self {
        GlobalArgs::augment_args(self)
    }

    fn url_options(self) -> Self {
        UrlArgs::augment_args(self)
    }

    fn project_dir_option(self) -> Self {
        ProjectDirArgs::augment_args(self)
    }
}
