pub mod kv;
pub mod memory;
