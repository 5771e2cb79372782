// src/services/mod.rs
pub mod auth;
pub mod calculations;
pub mod catalog;
pub mod db;
pub mod error;
pub mod fetchers;
pub mod leases;
pub mod memory;
pub mod payments;
pub mod refresh;
pub mod scheduler;
pub mod store;
