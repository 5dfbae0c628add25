pub mod adapter;
pub mod config;
pub mod discover;
pub mod error;
pub mod mailbox;
pub mod player;
mod seek;
pub mod sim;
pub mod status;
pub mod uri;
mod volume;
