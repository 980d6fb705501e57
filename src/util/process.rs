use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Resolve a binary by name using env override, configured path, then PATH.
pub fn resolve_binary(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    let env_key = format!("EXP_BIN_{}", name.replace('-', "_").to_uppercase());
    if let Some(path) = std::env::var_os(&env_key) {
        let pb = PathBuf::from(path);
        if pb.exists() {
            return Ok(pb);
        }
        bail!("{env_key} points to non-existent binary: {}", pb.display());
    }

    if let Some(custom) = configured {
        if !custom.exists() {
            bail!("configured {name} path `{}` does not exist", custom.display());
        }
        return Ok(custom.to_path_buf());
    }

    which::which(name).with_context(|| {
        format!("failed to find `{name}` in PATH; set {env_key} or [tools.{name}].path in config")
    })
}

pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub env: Vec<(OsString, OsString)>,
    pub current_dir: Option<PathBuf>,
    /// Keeps terminal signals such as Ctrl+C away from the child.
    pub own_process_group: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
            own_process_group: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Spawns `spec` and hands each stdout line to `on_line` as it arrives.
///
/// Stderr is inherited so the child's own diagnostics reach the user directly.
pub async fn run_lines<F>(spec: CommandSpec, mut on_line: F) -> Result<ExitStatus>
where
    F: FnMut(&str),
{
    let mut command = Command::new(&spec.program);
    command.args(&spec.args);
    if let Some(dir) = &spec.current_dir {
        command.current_dir(dir);
    }
    for (key, value) in &spec.env {
        command.env(key, value);
    }
    #[cfg(unix)]
    if spec.own_process_group {
        command.process_group(0);
    }
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to spawn `{}`", spec.program.to_string_lossy()))?;
    let stdout = child
        .stdout
        .take()
        .context("child stdout was not captured")?;
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .with_context(|| format!("failed to read output of `{}`", spec.program.to_string_lossy()))?
    {
        on_line(&line);
    }
    child
        .wait()
        .await
        .with_context(|| format!("failed to wait for `{}`", spec.program.to_string_lossy()))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streams_stdout_lines_in_order() {
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo first; echo second; exit 3");
        let mut seen = Vec::new();
        let status = run_lines(spec, |line| seen.push(line.to_string()))
            .await
            .unwrap();
        assert_eq!(seen, vec!["first", "second"]);
        assert_eq!(status.code(), Some(3));
    }

    #[test]
    fn configured_path_must_exist() {
        let err = resolve_binary("xdl-missing-tool", Some(Path::new("/nope/xdl"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
