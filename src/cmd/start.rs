use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use clap::{ArgMatches, Args, FromArgMatches};

use crate::cli::UrlArgs;
use crate::context::AppContext;
use crate::delegate::StartOptions;
use crate::error::CliError;
use crate::registry::{CommandDescriptor, ProjectDirOptions, ProjectHandler};

#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    #[command(flatten)]
    pub url: UrlArgs,
    /// Clears the bundler cache before starting
    #[arg(short = 'c', long = "clear")]
    pub clear: bool,
}

pub fn register() -> CommandDescriptor {
    CommandDescriptor::project_dir(
        "start",
        "Starts or restarts a local server for your app and gives you a URL to it",
        StartCommand,
        ProjectDirOptions::default(),
    )
    .alias("r")
    .args(StartArgs::augment_args)
}

struct StartCommand;

#[async_trait]
impl ProjectHandler for StartCommand {
    async fn run(
        &self,
        ctx: &AppContext,
        project_dir: &Path,
        matches: &ArgMatches,
    ) -> Result<(), CliError> {
        let args = StartArgs::from_arg_matches(matches)?;
        let options = StartOptions {
            url: args.url.resolve()?,
            clear: args.clear,
        };
        let project = &ctx.services.project;

        ctx.term.info("Starting project...");
        let url = project.start(project_dir, &options, &ctx.settings).await?;
        if ctx.term.is_raw() {
            ctx.term.plain(&url);
        } else {
            ctx.term.info(format!("Your URL is: {url}"));
            ctx.term
                .info(ctx.term.gray("Logs for your project will appear below. Press Ctrl+C to exit."));
        }

        tokio::select! {
            biased;
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl+C")?;
            }
            followed = project.follow_logs(project_dir, &ctx.settings) => match followed {
                Ok(()) => return Ok(()),
                // A log stream killed by a signal counts as the user interrupting.
                Err(err) if err.is_signalled() => {
                    tracing::debug!(%err, "log stream interrupted");
                }
                Err(err) => return Err(err.into()),
            },
        }

        ctx.term.info("Stopping packager...");
        project.stop(project_dir, &ctx.settings).await?;
        ctx.term.info("Packager stopped.");
        Ok(())
    }
}
