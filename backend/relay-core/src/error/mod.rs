pub mod api;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod launch;
pub mod server;
pub mod session;
