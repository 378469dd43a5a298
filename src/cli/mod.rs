mod args;
mod paths;

pub use args::{Cli, Commands, ConfigArgs, INIT_DELAY_ENV, SECURITY_CONFIG_ENV};
pub use paths::{expand_home, resolve_config_path};
