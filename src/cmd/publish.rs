use std::path::Path;

use async_trait::async_trait;
use clap::{ArgMatches, Args, FromArgMatches};

use crate::context::AppContext;
use crate::delegate::PublishOptions;
use crate::error::CliError;
use crate::registry::{CommandDescriptor, ProjectDirOptions, ProjectHandler};

#[derive(Args, Debug, Clone, Default)]
pub struct PublishArgs {
    /// Suppresses verbose output from the bundler
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
    /// The release channel to publish to
    #[arg(long = "release-channel", value_name = "CHANNEL")]
    pub release_channel: Option<String>,
}

pub fn register() -> CommandDescriptor {
    CommandDescriptor::project_dir(
        "publish",
        "Publishes your project to exp.host",
        PublishCommand,
        ProjectDirOptions::default(),
    )
    .alias("p")
    .args(PublishArgs::augment_args)
}

struct PublishCommand;

#[async_trait]
impl ProjectHandler for PublishCommand {
    async fn run(
        &self,
        ctx: &AppContext,
        project_dir: &Path,
        matches: &ArgMatches,
    ) -> Result<(), CliError> {
        let args = PublishArgs::from_arg_matches(matches)?;
        if args
            .release_channel
            .as_deref()
            .is_some_and(|channel| channel.trim().is_empty())
        {
            return Err(CliError::command(
                "BAD_ARGS",
                "--release-channel cannot be empty",
            ));
        }
        let options = PublishOptions {
            quiet: args.quiet,
            release_channel: args.release_channel,
        };

        ctx.term.info(format!(
            "Publishing to channel '{}'...",
            options.release_channel.as_deref().unwrap_or("default")
        ));
        let published = ctx
            .services
            .project
            .publish(project_dir, &options, &ctx.settings)
            .await?;
        if ctx.term.is_raw() {
            ctx.term.plain(&published.url);
        } else {
            ctx.term.info(format!("Published to {}", published.url));
        }
        Ok(())
    }
}
