pub mod analyzers;
pub mod collection;
pub mod collector;
pub mod config;
pub mod fetch;
pub mod infra;
pub mod output;
pub mod parser;
pub mod route;
pub mod services;
