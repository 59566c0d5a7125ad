//! Fetch webcam images from remote camera hosts and ship them onward.
//!
//! Fetchers poll sources and publish a [`broker::Notification`] per new
//! image to the broker's back-end; watchers and pushers subscribe on its
//! front-end. Each source also ships its scratch directory to every one of
//! its destinations concurrently after a cycle that found something.

pub mod app_config;
pub mod broker;
pub mod cli;
pub mod common;
pub mod config_loader;
pub mod core;
pub mod errors;
pub mod fetcher;
pub mod operations;
pub mod source_config;
pub mod watcher;
