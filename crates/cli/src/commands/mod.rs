pub mod batch;
pub mod install_script;
pub mod serve;
pub mod show_config;

pub use batch::*;
pub use install_script::*;
pub use serve::*;
pub use show_config::*;
