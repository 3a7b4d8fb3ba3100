//! Backend access: the collaborator trait, its HTTP implementation and the
//! streamed-response consumer.

pub mod backend;
pub mod http;
pub mod stream;

pub use backend::Backend;
pub use http::HttpBackend;

#[cfg(test)]
pub mod scripted;
