pub mod protocol;
pub mod registry;
pub mod server;
pub mod store;
