pub mod component;
pub mod config;
pub mod http;
pub mod provider;
pub mod resolution;
pub mod store;
