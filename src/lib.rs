//! favicond — favicon fetching and rasterization service.
//!
//! Given a website URL or bare domain, the service returns a rasterized
//! favicon at a requested pixel size in a negotiated image format.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌───────────────────────────────────────────────────┐
//!                  │                  FAVICON SERVICE                   │
//!                  │                                                    │
//!   GET /favicons  │  ┌─────────┐   ┌──────────┐   ┌───────────────┐   │
//!   ───────────────┼─▶│  http   │──▶│ security │──▶│   discovery   │   │
//!                  │  │ handler │   │normalize │   │  parse + rank │   │
//!                  │  └────┬────┘   └──────────┘   └───────┬───────┘   │
//!                  │       │                               │           │
//!                  │       │      per candidate            ▼           │
//!                  │       │   ┌──────────────────────────────────┐    │
//!                  │       └──▶│ cache ──▶ singleflight ──▶ fetch │    │
//!                  │           └───────────────┬──────────────────┘    │
//!                  │                           ▼                       │
//!   200 + image    │  ┌─────────────────────────────────────────────┐  │
//!   ◀──────────────┼──│ imaging: ico/svg/raster → gates → resize →  │  │
//!                  │  │          encode (avif/webp/png) → fallback  │  │
//!                  │  └─────────────────────────────────────────────┘  │
//!                  │                                                    │
//!                  │  Cross-cutting: config, observability, rate        │
//!                  │  limiting                                          │
//!                  └───────────────────────────────────────────────────┘
//! ```
//!
//! Every `/favicons` request returns 200 with an image body; failures
//! anywhere in the pipeline degrade to a deterministic fallback globe.

// Core pipeline
pub mod cache;
pub mod discovery;
pub mod fetch;
pub mod http;
pub mod imaging;
pub mod security;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use config::ServiceConfig;
pub use http::{AppState, HttpServer};
