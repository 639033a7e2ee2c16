pub mod address;
pub mod api;
pub mod backend;
pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod session;

#[cfg(test)]
mod tests;

pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_COUNTRY_CODE: &str = "91";
pub const DEFAULT_ADDRESS_DOMAIN: &str = "c.us";
pub const DEFAULT_CLIENT_ID: &str = "client-one";
pub const DEFAULT_BRIDGE_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_BRIDGE_PORT: u16 = 3000;
pub const DEFAULT_BRIDGE_URL: &str = const_format::concatcp!(
    "http://",
    DEFAULT_BRIDGE_HOSTNAME,
    ":",
    DEFAULT_BRIDGE_PORT
);
