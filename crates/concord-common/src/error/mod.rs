//! Failure taxonomy shared by every crate

mod failure;

pub use failure::{default_error_hook, Classify, ErrorHook, ErrorReport, FailureClass};
