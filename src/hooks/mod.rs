//! Git hook dispatch
//!
//! One binary serves several git hooks. It is either installed (or
//! symlinked) under the hook's name, or run as `<binary> <hook-name>`:
//! - post-receive: deploy the sieve script after a push

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{dispatch, usage, Invocation};
pub use registry::{default_registry, Hook, HookHandler, HookRegistry};
