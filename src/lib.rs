pub mod album;
pub mod app;
pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod image;
pub mod output;
pub mod store;
pub mod tui;
