pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod models;
pub mod money;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
