use async_trait::async_trait;
use clap::ArgMatches;

use crate::context::AppContext;
use crate::error::CliError;
use crate::registry::{CommandDescriptor, CommandHandler};

pub fn register() -> CommandDescriptor {
    CommandDescriptor::plain(
        "whoami",
        "Checks with the server and then says who you are logged in as",
        WhoamiCommand,
    )
    .alias("w")
}

struct WhoamiCommand;

#[async_trait]
impl CommandHandler for WhoamiCommand {
    async fn run(&self, ctx: &AppContext, _matches: &ArgMatches) -> Result<(), CliError> {
        match ctx.services.accounts.current_user(&ctx.settings).await? {
            Some(user) => match &user.email {
                Some(email) => ctx
                    .term
                    .info(format!("Logged in as {} ({email})", user.username)),
                None => ctx.term.info(format!("Logged in as {}", user.username)),
            },
            None => ctx.term.info("Not logged in"),
        }
        Ok(())
    }
}
