pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod models;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod store;
pub mod utils;
pub mod views;
