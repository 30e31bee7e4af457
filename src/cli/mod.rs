//! Hook handlers
//!
//! Each handler takes the repository path and the hook's own arguments and
//! returns a process exit code. They are wired to hook names in
//! [crate::hooks::default_registry].

pub mod orchestration;

pub use orchestration::{
    deploy_from_repository, post_receive, run_deployment, DeployReport, SUCCESS_MESSAGE,
};
