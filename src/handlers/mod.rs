// src/handlers/mod.rs
pub mod countries;
pub mod error;
pub mod indices;
pub mod leases;
pub mod payments;
