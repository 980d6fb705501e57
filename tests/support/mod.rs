#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated home, config and project directories for one `exp` run.
pub struct Sandbox {
    dir: TempDir,
    pub home: PathBuf,
    pub project: PathBuf,
    pub config: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        let project = dir.path().join("app");
        fs::create_dir_all(&home).unwrap();
        fs::create_dir_all(&project).unwrap();
        let config = dir.path().join("config.toml");
        fs::write(
            &config,
            "[update]\ncheck = false\n\n[telemetry]\nenabled = false\n",
        )
        .unwrap();
        Self {
            dir,
            home,
            project,
            config,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `exp` with every external touch point redirected into the sandbox.
    pub fn exp(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("exp");
        cmd.env("EXP_HOME", &self.home)
            .env("EXP_CONFIG", &self.config)
            .env("EXP_NO_TELEMETRY", "1")
            .env("XDL_HOST", "127.0.0.1")
            .env_remove("EXPO_DEBUG")
            .env_remove("XDL_PORT")
            .env_remove("EXP_BIN_XDL")
            .current_dir(self.path());
        cmd
    }

    /// Writes a fake `xdl` that records its argv and prints `stdout` lines.
    pub fn stub_xdl(&self, stdout: &[&str], exit_code: i32) -> PathBuf {
        let path = self.path().join("xdl");
        let mut script = format!(
            "#!/bin/sh\necho \"$@\" > \"{}\"\n",
            self.args_file().display()
        );
        for line in stdout {
            script.push_str(&format!("echo '{line}'\n"));
        }
        script.push_str(&format!("exit {exit_code}\n"));
        fs::write(&path, script).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms).unwrap();
        }
        path
    }

    pub fn args_file(&self) -> PathBuf {
        self.path().join("xdl-args.txt")
    }

    pub fn recorded_args(&self) -> String {
        fs::read_to_string(self.args_file()).unwrap_or_default()
    }
}
