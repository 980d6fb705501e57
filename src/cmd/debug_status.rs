use std::path::Path;

use async_trait::async_trait;
use clap::ArgMatches;

use crate::context::AppContext;
use crate::delegate::ProjectStatus;
use crate::error::CliError;
use crate::registry::{CommandDescriptor, ProjectDirOptions, ProjectHandler};

pub fn register() -> CommandDescriptor {
    CommandDescriptor::project_dir(
        "debug-status",
        "Prints the status of the project's server",
        DebugStatusCommand,
        ProjectDirOptions {
            skip_login: true,
            skip_auth_check: true,
            skip_validation: true,
        },
    )
}

struct DebugStatusCommand;

#[async_trait]
impl ProjectHandler for DebugStatusCommand {
    async fn run(
        &self,
        ctx: &AppContext,
        project_dir: &Path,
        _matches: &ArgMatches,
    ) -> Result<(), CliError> {
        let status = ctx.services.project.status(project_dir, &ctx.settings).await?;
        let label = match status {
            ProjectStatus::Running => "running",
            ProjectStatus::Ill => "ill",
            ProjectStatus::Exited => "exited",
        };
        ctx.term.plain(label);
        Ok(())
    }
}
