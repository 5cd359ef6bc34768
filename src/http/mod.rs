//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, CORS)
//!     → pipeline.rs (dispatch, body.rs decode, validation, action task)
//!     → writer.rs (header accumulator, ordered chunks)
//!     → response.rs (reply → bytes + default content type)
//!     → Send to client
//! ```

pub mod body;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;
pub mod writer;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
