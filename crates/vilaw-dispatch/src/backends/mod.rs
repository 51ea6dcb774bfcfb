//! Backend invoker implementations.

mod groq;

pub use groq::GroqInvoker;
