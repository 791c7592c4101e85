pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod hash;
pub mod models;
pub mod services;
pub mod state;
pub mod upstream;
