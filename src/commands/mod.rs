pub mod about;
pub mod analytics;
pub mod backup;
pub mod categories;
pub mod check;
pub mod config;
pub mod context;
pub mod init;
pub mod reset;
pub mod schedule;
pub mod sync;
pub mod transfer;
