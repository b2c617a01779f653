pub mod annotation;
pub mod config;
pub mod error;
pub mod map;
pub mod maps_api;
pub mod overlay;
pub mod session;
pub mod ui;
