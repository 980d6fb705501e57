use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use clap::{ArgMatches, Args, FromArgMatches};
use toml_edit::{DocumentMut, Item, Table, Value, value};

use crate::config::{self, ExpConfig};
use crate::context::AppContext;
use crate::error::CliError;
use crate::registry::{CommandDescriptor, CommandHandler};
use crate::term::Terminal;

#[derive(Args, Debug, Clone)]
pub struct ConfigSetArgs {
    /// Dotted key, e.g. `api.host` or `tools.xdl.path`
    pub key: String,
    /// Value to store; `true`, `false` and integers keep their TOML type
    pub value: String,
    /// Edit this file instead of the user config
    #[arg(long = "file")]
    pub file: Option<PathBuf>,
}

pub fn register() -> CommandDescriptor {
    CommandDescriptor::plain("config", "Reads and writes exp settings", ConfigCommand).args(args)
}

fn args(cmd: clap::Command) -> clap::Command {
    cmd.subcommand_required(true).subcommand(ConfigSetArgs::augment_args(
        clap::Command::new("set").about("Sets a key in the config file"),
    ))
}

struct ConfigCommand;

#[async_trait]
impl CommandHandler for ConfigCommand {
    async fn run(&self, ctx: &AppContext, matches: &ArgMatches) -> Result<(), CliError> {
        match matches.subcommand() {
            Some(("set", sub)) => {
                let args = ConfigSetArgs::from_arg_matches(sub)?;
                set_value(&args, &ctx.term)?;
                Ok(())
            }
            Some((other, _)) => Err(CliError::command(
                "UNKNOWN_CONFIG_COMMAND",
                format!("Unknown config command `{other}`"),
            )),
            None => Err(CliError::command(
                "MISSING_CONFIG_COMMAND",
                "Specify a config command, e.g. `exp config set KEY VALUE`",
            )),
        }
    }
}

fn set_value(args: &ConfigSetArgs, term: &Terminal) -> Result<()> {
    let path = match &args.file {
        Some(path) => path.clone(),
        None => std::env::var_os(config::CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(config::config_path)
            .ok_or_else(|| {
                anyhow!("failed to resolve the exp config path (no home directory found)")
            })?,
    };

    ensure_parent(&path)?;

    let mut doc = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if raw.trim().is_empty() {
            DocumentMut::new()
        } else {
            raw.parse::<DocumentMut>()
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
    } else {
        DocumentMut::new()
    };

    apply_key(&mut doc, &args.key, &args.value)?;
    let rendered = doc.to_string();
    toml::from_str::<ExpConfig>(&rendered)
        .with_context(|| format!("`{}` = `{}` is not a valid setting", args.key, args.value))?;

    fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    term.info(format!("Updated {}", path.display()));
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn typed_value(raw: &str) -> Value {
    match raw {
        "true" => Value::from(true),
        "false" => Value::from(false),
        _ => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(raw)),
    }
}

fn apply_key(doc: &mut DocumentMut, key: &str, value_str: &str) -> Result<()> {
    let segments = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();
    let Some((last, parents)) = segments.split_last() else {
        bail!("config key cannot be empty");
    };

    let mut current = doc.as_table_mut();
    for segment in parents {
        current = current
            .entry(segment)
            .or_insert(Item::Table(Table::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow!("path `{segment}` is not a table in the config"))?;
    }

    current.insert(last, value(typed_value(value_str)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use tempfile::TempDir;

    fn set(path: &Path, key: &str, val: &str) -> Result<()> {
        let args = ConfigSetArgs {
            key: key.into(),
            value: val.into(),
            file: Some(path.to_path_buf()),
        };
        set_value(&args, &Terminal::new(OutputFormat::Raw))
    }

    #[test]
    fn creates_new_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        set(&path, "api.host", "staging.exp.host").unwrap();
        let written = fs::read_to_string(path).unwrap();
        assert!(written.contains("[api]"));
        assert!(written.contains("host = \"staging.exp.host\""));
    }

    #[test]
    fn updates_nested_tables_and_keeps_comments() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"# local overrides
[tools]
[tools.xdl]
path = "/opt/xdl/bin/xdl"
"#,
        )
        .unwrap();

        set(&path, "update.check", "false").unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("# local overrides"));
        assert!(written.contains("check = false"));
        assert!(written.contains("path = \"/opt/xdl/bin/xdl\""));

        let parsed = config::load_from(path.to_str()).unwrap();
        assert!(!parsed.update.check);
    }

    #[test]
    fn integers_keep_their_type() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        set(&path, "api.port", "8080").unwrap();
        let written = fs::read_to_string(path).unwrap();
        assert!(written.contains("port = 8080"));
    }

    #[test]
    fn invalid_settings_are_rejected_without_writing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let err = set(&path, "api.port", "not-a-port").unwrap_err();
        assert!(err.to_string().contains("api.port"));
        assert!(!path.exists());
    }

    #[test]
    fn empty_keys_are_rejected() {
        let temp = TempDir::new().unwrap();
        assert!(set(&temp.path().join("config.toml"), "..", "x").is_err());
    }
}
