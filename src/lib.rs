pub mod catalog;
pub mod config;
pub mod models;
pub mod review;
pub mod shell;
pub mod store;
