//! sitekit library
//!
//! Dev server and deploy tooling for the learn platform static site.

pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod server;
pub mod settings;
pub mod utils;
