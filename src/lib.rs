pub mod config;
pub mod geo;
pub mod models;
pub mod tpapi;
pub mod tpdb;
