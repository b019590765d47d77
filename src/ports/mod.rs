//! Port traits through which the core talks to its collaborators.

pub mod config_port;
pub mod data_port;
pub mod report_port;
