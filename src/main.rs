use std::ffi::{OsStr, OsString};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::ArgMatches;
use exp_cli::action;
use exp_cli::cli::Settings;
use exp_cli::cmd::{self, prepare_detached_build};
use exp_cli::config;
use exp_cli::delegate::Services;
use exp_cli::logs::NotificationSink;
use exp_cli::paths;
use exp_cli::registry::Registry;
use exp_cli::term::Terminal;
use tracing::Level;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let debug = config::debug_enabled();
    init_tracing(debug);
    match run(debug).await {
        Ok(code) => code,
        Err(err) => {
            if debug {
                eprintln!("{err:?}");
            } else {
                eprintln!("{err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::WARN };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(debug: bool) -> Result<ExitCode> {
    let args: Vec<OsString> = std::env::args_os().collect();
    let registry = Registry::from_registrations(&cmd::registrations(debug));
    let mut program = registry.program();
    let parsed = program.try_get_matches_from_mut(&args);

    let record_path = records_path(&args, &parsed);
    let (recorded, code) = tokio::join!(
        async {
            if record_path {
                paths::register_path().await
            } else {
                Ok(())
            }
        },
        dispatch(&registry, &mut program, parsed, debug),
    );
    recorded?;
    code
}

/// PATH is recorded for every invocation except IDE-driven detached builds.
fn records_path(args: &[OsString], parsed: &Result<ArgMatches, clap::Error>) -> bool {
    let sub = match parsed {
        Ok(matches) => matches.subcommand_name().map(OsStr::new),
        Err(_) => args
            .iter()
            .skip(1)
            .map(OsString::as_os_str)
            .find(|arg| !arg.to_string_lossy().starts_with('-')),
    };
    sub != Some(OsStr::new(prepare_detached_build::NAME))
}

async fn dispatch(
    registry: &Registry,
    program: &mut clap::Command,
    parsed: Result<ArgMatches, clap::Error>,
    debug: bool,
) -> Result<ExitCode> {
    let matches = match parsed {
        Ok(matches) => matches,
        Err(err) => {
            // Help and version requests land here too and are not failures.
            let code = if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            err.print()?;
            return Ok(code);
        }
    };

    let Some((name, sub_matches)) = matches.subcommand() else {
        program.print_help()?;
        println!();
        return Ok(ExitCode::SUCCESS);
    };

    let Some(descriptor) = registry.find(name) else {
        println!(
            "\"{name}\" is not an exp command. See \"exp --help\" for the full list of commands."
        );
        return Ok(ExitCode::SUCCESS);
    };

    let output = Settings::from_matches(sub_matches, debug)
        .map(|settings| settings.output)
        .unwrap_or_default();
    let term = Terminal::new(output);

    let config = Arc::new(config::load()?);
    let services = Services::from_config(&config)?;
    services
        .project
        .attach_notifications(Arc::new(NotificationSink::new(term.clone())));

    Ok(action::invoke(descriptor, config, services, term, sub_matches, debug).await)
}
