//! Domain Layer
//!
//! Trait abstractions for the collaborators the cache core talks to but does
//! not own.
//!
//! - **Ports** (`ports.rs`) - configuration supply and operation instrumentation
//!
//! # Usage
//!
//! ```ignore
//! use tiercache::domain::ports::{ConfigProvider, InstrumentationSink};
//!
//! fn build<C, S>(config: C, sink: S)
//! where
//!     C: ConfigProvider + 'static,
//!     S: InstrumentationSink + 'static,
//! {
//!     // ...
//! }
//! ```

pub mod ports;

pub use ports::{ConfigProvider, InstrumentationSink, CACHE_CATEGORY};
