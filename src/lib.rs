pub mod config;
pub mod db;
pub mod protocol;
pub mod server;
