//! HTTP surface.
//!
//! # Responsibilities
//! - Build the router (`/favicons`, `/health`) with middleware layers
//! - Drive the per-request pipeline: parse → normalize → discover →
//!   fetch/decode per candidate → pick best → resize/encode → serve
//! - Guarantee a 200 with an image body for every `/favicons` request

pub mod handler;
pub mod server;

pub use handler::AppState;
pub use server::{build_router, HttpServer};
