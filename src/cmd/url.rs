use std::path::Path;

use async_trait::async_trait;
use clap::{ArgMatches, FromArgMatches};

use crate::cli::{CommandExt, UrlArgs};
use crate::context::AppContext;
use crate::error::CliError;
use crate::registry::{CommandDescriptor, ProjectDirOptions, ProjectHandler};

pub fn register() -> CommandDescriptor {
    CommandDescriptor::project_dir(
        "url",
        "Displays the URL you can use to view your project",
        UrlCommand,
        ProjectDirOptions {
            skip_login: true,
            skip_validation: true,
            ..ProjectDirOptions::default()
        },
    )
    .alias("u")
    .args(|cmd| cmd.url_options())
}

struct UrlCommand;

#[async_trait]
impl ProjectHandler for UrlCommand {
    async fn run(
        &self,
        ctx: &AppContext,
        project_dir: &Path,
        matches: &ArgMatches,
    ) -> Result<(), CliError> {
        let url = UrlArgs::from_arg_matches(matches)?.resolve()?;
        let url = ctx
            .services
            .project
            .url(project_dir, &url, &ctx.settings)
            .await?;
        ctx.term.plain(url);
        Ok(())
    }
}
