pub mod cache;
pub mod error;
pub mod manager;
pub mod rest;
pub mod session;
pub mod transport;
pub mod typing;

pub use error::ClientError;
