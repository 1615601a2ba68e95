pub mod audit;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod models;
