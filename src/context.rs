use std::sync::Arc;

use crate::cli::Settings;
use crate::config::ExpConfig;
use crate::delegate::Services;
use crate::term::Terminal;

/// Everything a handler may touch during one invocation.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub config: Arc<ExpConfig>,
    pub services: Services,
    pub term: Terminal,
}
