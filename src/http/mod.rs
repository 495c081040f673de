//! HTTP protocol layer module
//!
//! Protocol-level helpers kept apart from the video and monitoring logic.

pub mod form;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use range::parse_range_header;
pub use response::{
    build_400_response, build_404_response, build_405_response, build_413_response,
    build_416_response, build_500_response, build_html_response, empty, full, ResponseBody,
};
