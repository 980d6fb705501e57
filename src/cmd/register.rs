use anyhow::Context;
use async_trait::async_trait;
use clap::ArgMatches;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password};

use super::login::report_logged_in;
use crate::context::AppContext;
use crate::delegate::{RegistrationForm, User};
use crate::error::CliError;
use crate::registry::{CommandDescriptor, CommandHandler};

pub fn register() -> CommandDescriptor {
    CommandDescriptor::plain("register", "Creates a new account", RegisterCommand).alias("signup")
}

struct RegisterCommand;

#[async_trait]
impl CommandHandler for RegisterCommand {
    async fn run(&self, ctx: &AppContext, _matches: &ArgMatches) -> Result<(), CliError> {
        let user = register_interactive(ctx).await?;
        report_logged_in(ctx, &user);
        Ok(())
    }
}

/// Prompts for account details, creates the account and logs it in.
pub(crate) async fn register_interactive(ctx: &AppContext) -> Result<User, CliError> {
    if !ctx.settings.interactive() {
        return Err(CliError::command(
            "NON_INTERACTIVE",
            "Registration requires an interactive online session.",
        ));
    }
    ctx.term.info("Thanks for signing up!");
    let theme = ColorfulTheme::default();
    let email: String = Input::with_theme(&theme)
        .with_prompt("E-mail address")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.contains('@') {
                Ok(())
            } else {
                Err("Enter a valid e-mail address")
            }
        })
        .interact_text()
        .context("failed to read e-mail address")?;
    let username: String = Input::with_theme(&theme)
        .with_prompt("Username")
        .interact_text()
        .context("failed to read username")?;
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .with_confirmation("Confirm Password", "Passwords do not match")
        .interact()
        .context("failed to read password")?;

    let form = RegistrationForm {
        email,
        username,
        password,
    };
    let user = ctx.services.accounts.register(&form, &ctx.settings).await?;
    Ok(user)
}
