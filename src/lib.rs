pub mod app;
pub mod config;
pub mod datalab;
pub mod entity;
pub mod error;
pub mod fs_util;
pub mod graph;
pub mod loader;
pub mod output;
pub mod preview;
pub mod profile;
pub mod resolver;
