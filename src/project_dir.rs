//! Wrapper for commands that act on a project directory.
//!
//! Resolves the directory, gates on login, wires the project's log stream to
//! the terminal, validates the project and finally calls the handler. The log
//! sinks are detached again whatever the handler returns.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::ArgMatches;

use crate::cmd::login;
use crate::context::AppContext;
use crate::delegate::{ProjectStatus, Severity};
use crate::error::CliError;
use crate::logs::{DEVICE_TAG, LogFilter, SeveritySink};
use crate::progress::ProjectLogSink;
use crate::registry::{ProjectDirOptions, ProjectHandler};

pub const PROJECT_DIR_ARG: &str = "project_dir";

const FATAL_VALIDATION: &str =
    "There is an error with your project. See above logs for information.";

/// Resolves the optional directory argument against `cwd`.
pub fn resolve_project_dir(cwd: &Path, arg: Option<&Path>) -> PathBuf {
    let joined = match arg {
        None => return cwd.to_path_buf(),
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
    };
    joined
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

pub async fn run(
    ctx: &AppContext,
    handler: &dyn ProjectHandler,
    options: ProjectDirOptions,
    matches: &ArgMatches,
) -> Result<(), CliError> {
    let cwd = std::env::current_dir().context("failed to read the current directory")?;
    let arg = matches
        .try_get_one::<PathBuf>(PROJECT_DIR_ARG)
        .ok()
        .flatten();
    let project_dir = resolve_project_dir(&cwd, arg.map(PathBuf::as_path));
    tracing::debug!(project_dir = %project_dir.display(), "resolved project directory");

    if !options.skip_login && ctx.settings.interactive() {
        login::login_or_register_if_logged_out(ctx).await?;
    }
    if !options.skip_auth_check {
        ctx.services.accounts.ensure_session(&ctx.settings).await?;
    }

    let project = &ctx.services.project;
    project.attach_logs(
        &project_dir,
        LogFilter::ExceptTag(DEVICE_TAG.to_string()),
        Arc::new(ProjectLogSink::new(ctx.term.clone())),
    );
    project.attach_logs(
        &project_dir,
        LogFilter::OnlyTag(DEVICE_TAG.to_string()),
        Arc::new(SeveritySink::new(ctx.term.clone())),
    );

    let outcome = async {
        if !options.skip_validation {
            validate(ctx, &project_dir).await?;
        }
        handler.run(ctx, &project_dir, matches).await
    }
    .await;

    project.detach_logs(&project_dir);
    outcome
}

async fn validate(ctx: &AppContext, project_dir: &Path) -> Result<(), CliError> {
    let project = &ctx.services.project;
    if project.status(project_dir, &ctx.settings).await? == ProjectStatus::Running {
        return Ok(());
    }
    ctx.term.start_spinner("Validating project...");
    let severity = project.validate(project_dir, &ctx.settings).await;
    ctx.term.stop_spinner();
    if severity? == Severity::Fatal {
        return Err(CliError::command("PROJECT_INVALID", FATAL_VALIDATION));
    }
    Ok(())
}
