//! Route modules for the Gutter server

pub mod health;
pub mod models;
pub mod spreads;
pub mod training;
