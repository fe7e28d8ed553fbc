//! Classification backends
//!
//! Every deployment path implements the same [`Backend`] contract:
//! the locally-served backbone+adapter model and the hosted LLM
//! providers are interchangeable from the caller's point of view.
//! Hosted backends never surface call failures as errors; they fall
//! back to a conservative clean verdict and log the incident.

mod backend;
mod clova;
mod hosted;
mod local;
mod openai;

pub use backend::Backend;
pub use clova::ClovaBackend;
pub use hosted::BackendFailure;
pub use local::LocalAdapterBackend;
pub use openai::OpenAiBackend;
