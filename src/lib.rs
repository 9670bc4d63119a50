pub mod board;
pub mod cache;
pub mod config;
pub mod errors;
pub mod refresh;
pub mod source;
pub mod ui;
