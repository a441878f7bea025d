pub mod access;
pub mod auth;
pub mod cli;
pub mod cli_handlers;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod notifications;
pub mod session;
pub mod store;
pub mod sync;
pub mod view;

#[cfg(test)]
pub mod test_utils;
