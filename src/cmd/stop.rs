use std::path::Path;

use async_trait::async_trait;
use clap::ArgMatches;

use crate::context::AppContext;
use crate::error::CliError;
use crate::registry::{CommandDescriptor, ProjectDirOptions, ProjectHandler};

pub fn register() -> CommandDescriptor {
    CommandDescriptor::project_dir(
        "stop",
        "Stops the server and processes connected to it",
        StopCommand,
        ProjectDirOptions {
            skip_login: true,
            skip_validation: true,
            ..ProjectDirOptions::default()
        },
    )
}

struct StopCommand;

#[async_trait]
impl ProjectHandler for StopCommand {
    async fn run(
        &self,
        ctx: &AppContext,
        project_dir: &Path,
        _matches: &ArgMatches,
    ) -> Result<(), CliError> {
        ctx.services.project.stop(project_dir, &ctx.settings).await?;
        ctx.term.info("Stopped.");
        Ok(())
    }
}
