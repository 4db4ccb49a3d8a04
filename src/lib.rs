//! # Plotpointe
//!
//! A self-hosted service for long-form writing with an LLM: rewrite a script
//! toward a target length, write a story of at least N words, or expand a
//! rough prompt into a structured plot outline.
//!
//! ## Task Flow
//! 1. Receive a submission via the API and validate it
//! 2. Record a `processing` task and return its id immediately
//! 3. Run the pipeline in the background, streaming the model's output and
//!    updating progress as text arrives
//! 4. Finish the task as `completed` (with its result) or `error`
//! 5. Export the result as a `.docx` on request
//!
//! ## Modules
//! - `api`: HTTP server, auth and handlers
//! - `config`: environment-based configuration
//! - `docx`: DOCX reading (uploads) and writing (exports)
//! - `export`: result-to-document layouts
//! - `llm`: streaming generation client
//! - `pipeline`: script, story and plot pipelines
//! - `task`: task records, store and dispatcher

pub mod api;
pub mod config;
pub mod docx;
pub mod export;
pub mod llm;
pub mod pipeline;
pub mod task;

pub use config::Config;
