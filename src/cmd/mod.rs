pub mod config;
pub mod debug_status;
pub mod doctor;
pub mod login;
pub mod logout;
pub mod prepare_detached_build;
pub mod publish;
pub mod register;
pub mod start;
pub mod stop;
pub mod url;
pub mod whoami;

use crate::registry::Registration;

/// Commands available in every build.
pub const BUILTIN: &[Registration] = &[
    login::register,
    register::register,
    logout::register,
    whoami::register,
    start::register,
    stop::register,
    publish::register,
    url::register,
    doctor::register,
    prepare_detached_build::register,
    config::register,
];

/// Registered only when the debug environment flag is set.
pub const DEBUG_ONLY: &[Registration] = &[debug_status::register];

pub fn registrations(debug: bool) -> Vec<Registration> {
    let mut all = BUILTIN.to_vec();
    if debug {
        all.extend_from_slice(DEBUG_ONLY);
    }
    all
}
