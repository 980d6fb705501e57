use std::path::Path;

use async_trait::async_trait;
use clap::ArgMatches;

use crate::context::AppContext;
use crate::delegate::Severity;
use crate::error::CliError;
use crate::registry::{CommandDescriptor, ProjectDirOptions, ProjectHandler};

pub fn register() -> CommandDescriptor {
    CommandDescriptor::project_dir(
        "doctor",
        "Diagnoses issues with your project",
        DoctorCommand,
        ProjectDirOptions {
            skip_login: true,
            skip_validation: true,
            ..ProjectDirOptions::default()
        },
    )
}

struct DoctorCommand;

#[async_trait]
impl ProjectHandler for DoctorCommand {
    async fn run(
        &self,
        ctx: &AppContext,
        project_dir: &Path,
        _matches: &ArgMatches,
    ) -> Result<(), CliError> {
        ctx.term.start_spinner("Checking project...");
        let severity = ctx
            .services
            .project
            .validate(project_dir, &ctx.settings)
            .await;
        ctx.term.stop_spinner();
        match severity? {
            Severity::NoIssues => ctx
                .term
                .info(ctx.term.green("Didn't find any issues with your project!")),
            Severity::Warning | Severity::Error => {
                ctx.term.warn("Found issues with your project; see the logs above.")
            }
            Severity::Fatal => {
                return Err(CliError::command(
                    "PROJECT_INVALID",
                    "There is an error with your project. See above logs for information.",
                ));
            }
        }
        Ok(())
    }
}
