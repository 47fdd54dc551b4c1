pub mod app;
pub mod auth;
pub mod config;
pub mod detail;
pub mod directory;
pub mod domain;
pub mod episodes;
pub mod error;
pub mod output;
pub mod resolver;
pub mod store;
