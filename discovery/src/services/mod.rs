pub mod query_service;
pub mod youtube_api;

pub use query_service::*;
pub use youtube_api::*;
