pub mod action;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod context;
pub mod delegate;
pub mod error;
pub mod logs;
pub mod paths;
pub mod progress;
pub mod project_dir;
pub mod registry;
pub mod term;
pub mod update;
pub mod util;

#[cfg(test)]
mod testing;
