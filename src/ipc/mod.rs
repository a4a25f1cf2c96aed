//! IPC module for local status queries and push-to-talk control

mod protocol;
mod server;

pub use server::Server;
