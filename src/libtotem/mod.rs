pub mod action;
pub mod bank;
pub mod config;
pub mod mail;
pub mod quiz;
pub mod reply;
pub mod router;
pub mod session;
