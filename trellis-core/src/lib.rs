//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (effects, refs, reactive objects, computeds, watchers)
//! - A batching job scheduler
//! - Virtual nodes and a keyed reconciliation engine
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `scheduler`: Deduplicating job queue flushed at explicit checkpoints
//! - `render`: Virtual nodes, the host adapter seam, and the diff
//! - `error`: Crate-wide error type
//!
//! Everything is single-threaded; reactive state lives in thread-locals.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::reactive::{computed, effect, ref_};
//!
//! let count = ref_(0);
//! let doubled = computed({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! let seen = std::rc::Rc::new(std::cell::Cell::new(0));
//! let _e = effect({
//!     let seen = seen.clone();
//!     move || seen.set(doubled.get())
//! });
//!
//! count.set(5);
//! assert_eq!(seen.get(), 10);
//! ```

pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;

pub use error::{Error, Result};
