//! `pitag_core` is the engine behind the `pitag` command line tool. It scans markup documents for python processing instructions (`<?py ... ?>`), runs the embedded snippets against one persistent python namespace, and replaces every instruction with whatever the snippet printed.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Document (one line at a time)
//!   → Scanner (finds `<?py` … `?>`, buffers multi-line bodies)
//!   → Output capture (points `sys.stdout` at a buffer for one snippet)
//!   → Execution context (parses, shifts line numbers, compiles, runs)
//!   → Output sink (passthrough text interleaved with captured output)
//! ```
//!
//! ## Modules
//!
//! - [`config`] — Configuration loading from `pitag.toml`.
//! - [`scanner`] — The streaming instruction scanner.
//!
//! ## Key Types
//!
//! - [`Processor`] — Owns the output sink and the execution context, processes documents in order.
//! - [`ExecutionContext`] — The shared python namespace and the snippet runner.
//! - [`OutputCapture`] — The `sys.stdout` stand-in used while a snippet runs.
//! - [`PitagError`] / [`ScriptError`] — Diagnostics with document line numbers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pitag_core::Processor;
//!
//! let mut output = Vec::new();
//! let mut processor = Processor::new(&mut output).unwrap();
//! processor.exec("greeting = 'hello'", "<command-line>").unwrap();
//! processor
//! 	.process("<p><?py print(greeting, end='') ?></p>".as_bytes(), "<memory>")
//! 	.unwrap();
//! drop(processor);
//!
//! assert_eq!(output, b"<p>hello</p>");
//! ```

pub use capture::*;
pub use context::*;
pub use error::*;
pub use processor::*;
pub use scanner::Scanner;
pub use scanner::ScanSummary;
pub use scanner::TagPattern;

mod capture;
pub mod config;
mod context;
#[allow(unused_assignments)]
mod error;
mod processor;
pub mod scanner;
