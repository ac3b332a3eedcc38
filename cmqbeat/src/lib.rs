#![deny(clippy::all, clippy::pedantic, clippy::nursery, dead_code)]

pub mod health;
pub mod poller;
pub mod publisher;
pub mod types;
