pub mod api;
pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod filters;
pub mod images;
pub mod loaders;
pub mod logging;
pub mod metrics;
pub mod pagination;
pub mod query;
pub mod reports;
pub mod server;
pub mod shopping_list;
pub mod storage;
pub mod validation;

// Domain data shapes shared across layers
pub mod domain;
