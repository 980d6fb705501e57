//! The single error boundary every command runs through.

use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgMatches;
use serde_json::json;

use crate::cli::Settings;
use crate::config::ExpConfig;
use crate::context::AppContext;
use crate::delegate::Services;
use crate::error::CliError;
use crate::project_dir;
use crate::registry::{Action, CommandDescriptor};
use crate::term::Terminal;
use crate::update;

pub const DEBUG_HINT: &str = "Set EXPO_DEBUG=true in your env to view the stack trace.";

/// Runs one command end to end and turns its outcome into an exit code.
pub async fn invoke(
    descriptor: &CommandDescriptor,
    config: Arc<ExpConfig>,
    services: Services,
    term: Terminal,
    matches: &ArgMatches,
    debug: bool,
) -> ExitCode {
    let settings = match Settings::from_matches(matches, debug) {
        Ok(settings) => settings,
        Err(err) => {
            report(&term, &err, debug);
            return ExitCode::FAILURE;
        }
    };
    let ctx = AppContext {
        settings,
        config,
        services,
        term,
    };

    if !settings.offline && ctx.config.update.check {
        update::check_for_updates(ctx.services.versions.as_ref(), &ctx.term).await;
    }

    ctx.services
        .telemetry
        .track("command", json!({ "name": descriptor.name }));
    let outcome = match &descriptor.action {
        Action::Plain(handler) => handler.run(&ctx, matches).await,
        Action::ProjectDir(handler, options) => {
            project_dir::run(&ctx, handler.as_ref(), *options, matches).await
        }
    };
    ctx.services.telemetry.flush(&settings).await;

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(command = descriptor.name, code = ?err.code(), "command failed");
            report(&ctx.term, &err, settings.debug);
            ExitCode::FAILURE
        }
    }
}

fn report(term: &Terminal, err: &CliError, debug: bool) {
    for line in render_error(term, err, debug) {
        term.error(line);
    }
}

/// Lines printed for a failed command, by error category.
pub fn render_error(term: &Terminal, err: &CliError, debug: bool) -> Vec<String> {
    match err {
        CliError::Command { message, .. } => vec![message.clone()],
        CliError::Api(api) => vec![term.red(&api.message)],
        CliError::Library(xdl) => vec![xdl.message.clone()],
        CliError::Uncategorized(inner) => {
            let summary = inner.to_string();
            if debug {
                vec![summary, term.gray(&format!("{inner:?}"))]
            } else {
                vec![summary, term.gray(DEBUG_HINT)]
            }
        }
    }
}
