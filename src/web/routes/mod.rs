//! Web Routes

pub mod health;
