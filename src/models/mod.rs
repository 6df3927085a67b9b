pub mod filter;
pub mod server;
