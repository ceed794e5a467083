//! Diagnostic modules shipped with the runtime.
//!
//! Neither touches the system: [`Debug`] echoes a message and [`Fail`]
//! fails on purpose. They are enough to exercise conditions, state lookups
//! and rescue handling end to end.

mod debug;
mod fail;

pub use debug::Debug;
pub use fail::Fail;
