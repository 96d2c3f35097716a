pub mod api;
pub mod config;
pub mod fetcher;
pub mod humanize;
pub mod observability;
pub mod orchestrator;
pub mod platform;
pub mod providers;
