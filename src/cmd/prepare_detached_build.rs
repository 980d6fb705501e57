use std::path::Path;

use async_trait::async_trait;
use clap::{ArgMatches, Args, FromArgMatches};

use crate::context::AppContext;
use crate::delegate::Platform;
use crate::error::CliError;
use crate::registry::{CommandDescriptor, ProjectDirOptions, ProjectHandler};

pub const NAME: &str = "prepare-detached-build";

#[derive(Args, Debug, Clone)]
pub struct PrepareArgs {
    /// Platform to prepare the native project for
    #[arg(long = "platform", value_enum)]
    pub platform: Platform,
}

pub fn register() -> CommandDescriptor {
    CommandDescriptor::project_dir(
        NAME,
        "Prepares a detached project for building",
        PrepareCommand,
        ProjectDirOptions {
            skip_login: true,
            skip_auth_check: true,
            skip_validation: true,
        },
    )
    .args(PrepareArgs::augment_args)
}

struct PrepareCommand;

#[async_trait]
impl ProjectHandler for PrepareCommand {
    async fn run(
        &self,
        ctx: &AppContext,
        project_dir: &Path,
        matches: &ArgMatches,
    ) -> Result<(), CliError> {
        let args = PrepareArgs::from_arg_matches(matches)?;
        ctx.services
            .project
            .prepare_detached_build(project_dir, args.platform, &ctx.settings)
            .await?;
        tracing::debug!(platform = args.platform.as_str(), "detached build prepared");
        Ok(())
    }
}
