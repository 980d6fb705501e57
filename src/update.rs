use crate::delegate::{UpdateState, VersionCheck, VersionSource};
use crate::term::{Level, Terminal};

/// Lines to print for a finished version check, if any.
pub fn advisory(check: &VersionCheck) -> Vec<(Level, String)> {
    match &check.state {
        UpdateState::UpToDate | UpdateState::AheadOfPublished => Vec::new(),
        UpdateState::OutOfDate => vec![
            (
                Level::Warn,
                format!(
                    "There is a new version of exp available ({}).",
                    check.latest
                ),
            ),
            (
                Level::Warn,
                format!("You are currently using exp {}", check.current),
            ),
            (
                Level::Warn,
                "Run `cargo install exp-cli` to get the latest version".to_string(),
            ),
        ],
        UpdateState::Unknown(reason) => {
            tracing::debug!("unrecognised update state: {reason}");
            vec![(
                Level::Warn,
                "Confused about what version of exp you have?".to_string(),
            )]
        }
    }
}

/// Runs the version check and prints the advisory. Never fails.
pub async fn check_for_updates(source: &dyn VersionSource, term: &Terminal) {
    match source.check().await {
        Ok(check) => {
            for (level, line) in advisory(&check) {
                term.log(level, line);
            }
        }
        Err(err) => tracing::debug!("update check failed: {err:#}"),
    }
}
