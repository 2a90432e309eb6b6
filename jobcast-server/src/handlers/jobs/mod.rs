pub mod cleanup;
pub mod get;
pub mod list;
pub mod ws;
