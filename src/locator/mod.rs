//! Object locator and forced invoker.

pub mod args;
pub mod cache;
pub mod invoker;
pub mod provenance;

pub use args::{synthesize_args, zero_value};
pub use cache::{InstanceCache, Nearest};
pub use invoker::{Invocation, InvokeError, Invoker};
pub use provenance::{classify, Provenance, MAX_STACK_LINES};
