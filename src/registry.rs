//! Compile-time command registry.
//!
//! Every command module exposes a registration function returning a
//! [`CommandDescriptor`]. The registry validates each descriptor, skips the
//! malformed ones with an error log, and builds the root `clap` program from
//! what is left.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use clap::ArgMatches;

use crate::cli::{CommandExt, PROGRAM_NAME};
use crate::context::AppContext;
use crate::error::CliError;

/// Handler for commands that need nothing beyond the shared context.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn run(&self, ctx: &AppContext, matches: &ArgMatches) -> Result<(), CliError>;
}

/// Handler for commands that operate on a resolved project directory.
#[async_trait]
pub trait ProjectHandler: Send + Sync {
    async fn run(
        &self,
        ctx: &AppContext,
        project_dir: &Path,
        matches: &ArgMatches,
    ) -> Result<(), CliError>;
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ProjectDirOptions {
    pub skip_login: bool,
    pub skip_auth_check: bool,
    pub skip_validation: bool,
}

#[derive(Clone)]
pub enum Action {
    Plain(Arc<dyn CommandHandler>),
    ProjectDir(Arc<dyn ProjectHandler>, ProjectDirOptions),
}

pub type ArgsFn = fn(clap::Command) -> clap::Command;

/// Produces one command. Called once per program start.
pub type Registration = fn() -> CommandDescriptor;

#[derive(Clone)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub aliases: Vec<&'static str>,
    pub about: &'static str,
    args: Option<ArgsFn>,
    pub action: Action,
}

impl CommandDescriptor {
    pub fn plain(
        name: &'static str,
        about: &'static str,
        handler: impl CommandHandler + 'static,
    ) -> Self {
        Self {
            name,
            aliases: Vec::new(),
            about,
            args: None,
            action: Action::Plain(Arc::new(handler)),
        }
    }

    pub fn project_dir(
        name: &'static str,
        about: &'static str,
        handler: impl ProjectHandler + 'static,
        options: ProjectDirOptions,
    ) -> Self {
        Self {
            name,
            aliases: Vec::new(),
            about,
            args: None,
            action: Action::ProjectDir(Arc::new(handler), options),
        }
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn args(mut self, args: ArgsFn) -> Self {
        self.args = Some(args);
        self
    }

    pub fn clap_command(&self) -> clap::Command {
        let mut cmd = clap::Command::new(self.name)
            .about(self.about)
            .visible_aliases(self.aliases.iter().copied());
        if matches!(self.action, Action::ProjectDir(..)) {
            cmd = cmd.project_dir_option();
        }
        match self.args {
            Some(args) => args(cmd),
            None => cmd,
        }
    }

    fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.contains(&name)
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    EmptyName,
    InvalidName(String),
    Duplicate(String),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::EmptyName => write!(f, "command name is empty"),
            RegistrationError::InvalidName(name) => write!(
                f,
                "`{name}` may only contain lowercase letters, digits, `-` and `:`"
            ),
            RegistrationError::Duplicate(name) => {
                write!(f, "`{name}` is already registered")
            }
        }
    }
}

impl std::error::Error for RegistrationError {}

fn valid_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == ':')
}

#[derive(Debug, Default)]
pub struct Registry {
    commands: Vec<CommandDescriptor>,
}

impl Registry {
    /// Registers every module, skipping the ones that produce a malformed descriptor.
    pub fn from_registrations(registrations: &[Registration]) -> Self {
        let mut registry = Self::default();
        for register in registrations {
            if let Err(err) = registry.add(register()) {
                tracing::error!("skipping command registration: {err}");
            }
        }
        registry
    }

    pub fn add(&mut self, descriptor: CommandDescriptor) -> Result<(), RegistrationError> {
        if descriptor.name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        let mut seen = HashSet::new();
        for name in std::iter::once(&descriptor.name).chain(&descriptor.aliases) {
            if !valid_name(name) || name.is_empty() {
                return Err(RegistrationError::InvalidName(name.to_string()));
            }
            if !seen.insert(*name) || self.find(name).is_some() {
                return Err(RegistrationError::Duplicate(name.to_string()));
            }
        }
        self.commands.push(descriptor);
        Ok(())
    }

    /// Looks a command up by name or alias.
    pub fn find(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.iter().find(|cmd| cmd.answers_to(name))
    }

    pub fn commands(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.iter()
    }

    /// Root program with every registered command attached.
    pub fn program(&self) -> clap::Command {
        let root = clap::Command::new(PROGRAM_NAME)
            .version(env!("CARGO_PKG_VERSION"))
            .about("Command-line tools for developing, running and publishing mobile apps")
            .global_options()
            .allow_external_subcommands(true);
        self.commands
            .iter()
            .fold(root, |root, cmd| root.subcommand(cmd.clap_command()))
    }
}
