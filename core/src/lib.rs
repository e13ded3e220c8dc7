pub mod aggregate;
pub mod aisle;
pub mod db;
pub mod error;
pub mod models;
pub mod ports;
pub mod present;
pub mod reconcile;
pub mod service;
pub mod sync;

#[cfg(test)]
mod testing;
