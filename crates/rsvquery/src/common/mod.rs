pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod parser;
pub mod setup;
