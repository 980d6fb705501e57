use anyhow::Context;
use async_trait::async_trait;
use clap::{ArgMatches, Args, FromArgMatches};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password, Select};

use crate::context::AppContext;
use crate::delegate::{Credentials, User};
use crate::error::CliError;
use crate::registry::{CommandDescriptor, CommandHandler};

const AUTH_CHOICES: [&str; 3] = [
    "Log in with an existing account",
    "Sign up for a new account",
    "Cancel",
];

#[derive(Args, Debug, Clone, Default)]
pub struct LoginArgs {
    /// Username or email address
    #[arg(short = 'u', long = "username")]
    pub username: Option<String>,
    /// Password
    #[arg(short = 'p', long = "password")]
    pub password: Option<String>,
}

pub fn register() -> CommandDescriptor {
    CommandDescriptor::plain("login", "Logs in to your account", LoginCommand)
        .alias("signin")
        .args(LoginArgs::augment_args)
}

struct LoginCommand;

#[async_trait]
impl CommandHandler for LoginCommand {
    async fn run(&self, ctx: &AppContext, matches: &ArgMatches) -> Result<(), CliError> {
        let args = LoginArgs::from_arg_matches(matches)?;
        let user = login(ctx, args).await?;
        report_logged_in(ctx, &user);
        Ok(())
    }
}

pub(crate) fn report_logged_in(ctx: &AppContext, user: &User) {
    ctx.term.info(
        ctx.term
            .green(&format!("Success. You are now logged in as {}.", user.username)),
    );
}

/// Logs in with whatever credentials were given, prompting for the rest.
pub(crate) async fn login(ctx: &AppContext, args: LoginArgs) -> Result<User, CliError> {
    let interactive = ctx.settings.interactive();
    let missing = || {
        CliError::command(
            "MISSING_CREDENTIALS",
            "Pass --username and --password to log in non-interactively.",
        )
    };
    let username = match args.username {
        Some(username) => username,
        None if interactive => Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Username/Email Address")
            .interact_text()
            .context("failed to read username")?,
        None => return Err(missing()),
    };
    let password = match args.password {
        Some(password) => password,
        None if interactive => Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Password")
            .interact()
            .context("failed to read password")?,
        None => return Err(missing()),
    };

    let user = ctx
        .services
        .accounts
        .login(&Credentials { username, password }, &ctx.settings)
        .await?;
    Ok(user)
}

/// Offers to log in or sign up when no session exists yet.
pub(crate) async fn login_or_register_if_logged_out(ctx: &AppContext) -> Result<(), CliError> {
    if ctx
        .services
        .accounts
        .current_user(&ctx.settings)
        .await?
        .is_some()
    {
        return Ok(());
    }

    ctx.term.warn("An account is required to proceed.");
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("How would you like to authenticate?")
        .items(&AUTH_CHOICES)
        .default(0)
        .interact()
        .context("failed to read selection")?;
    let user = match choice {
        0 => login(ctx, LoginArgs::default()).await?,
        1 => super::register::register_interactive(ctx).await?,
        _ => return Err(CliError::command("LOGIN_CANCELLED", "Login cancelled.")),
    };
    report_logged_in(ctx, &user);
    Ok(())
}
