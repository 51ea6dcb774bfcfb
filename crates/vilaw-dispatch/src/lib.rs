//! Multi-credential, quota-aware request dispatcher for Vilaw.
//!
//! Every call to the external inference service goes through the
//! [`Dispatcher`]: it tracks consumption against each credential's quota
//! window, decides admission per credential, fails over between credentials
//! on error or exhaustion, and blocks-and-retries when the entire pool is
//! saturated, without exceeding the backend's published limits or dropping
//! a caller's request.
//!
//! # Main types
//!
//! - [`CredentialPool`] — ordered, fixed set of interchangeable API keys.
//! - [`UsageRecord`] — per-credential window counters with lazy reset.
//! - [`RateLimitSpec`] — published per-model request/token/window limits.
//! - [`Dispatcher`] — the orchestrating state machine.
//! - [`BackendInvoker`] — the transport collaborator boundary;
//!   [`GroqInvoker`] is the OpenAI-compatible implementation.
//!
//! Usage counters live in memory only: a process restart resets quota
//! accounting to zero, by design.

pub mod backends;
pub mod config;
pub mod dispatcher;
pub mod invoker;
pub mod pool;
pub mod usage;

pub use backends::GroqInvoker;
pub use config::{BackendConfig, InferenceProvider, RateLimitSpec};
pub use dispatcher::{DispatchPolicy, Dispatcher};
pub use invoker::{BackendInvoker, Completion};
pub use pool::{Credential, CredentialPool};
pub use usage::{UsageRecord, UsageSnapshot};
