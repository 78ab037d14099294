pub mod connection;
pub mod viewer;
