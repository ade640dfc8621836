//! Surface drivers shipped with the engine
//!
//! The engine only depends on `sdk::SurfaceDriver`; this module carries the
//! HTTP bridge used by the CLI to reach an out-of-process browser.

pub mod http;

pub use http::HttpSurfaceDriver;
