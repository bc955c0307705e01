pub mod fetch;
pub mod handlers;
