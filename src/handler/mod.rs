//! Request handler module
//!
//! Routes requests to the video catalog pages and the streaming endpoint.

pub mod router;
pub mod stream;
pub mod videos;

// Re-export main entry point
pub use router::handle_request;
