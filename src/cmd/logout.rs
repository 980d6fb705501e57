use async_trait::async_trait;
use clap::ArgMatches;

use crate::context::AppContext;
use crate::error::CliError;
use crate::registry::{CommandDescriptor, CommandHandler};

pub fn register() -> CommandDescriptor {
    CommandDescriptor::plain("logout", "Logs out of your account", LogoutCommand)
}

struct LogoutCommand;

#[async_trait]
impl CommandHandler for LogoutCommand {
    async fn run(&self, ctx: &AppContext, _matches: &ArgMatches) -> Result<(), CliError> {
        ctx.services.accounts.logout(&ctx.settings).await?;
        ctx.term.info("Logged out.");
        Ok(())
    }
}
