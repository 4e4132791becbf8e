//! Lifecycle supervision for noisia: validate the configuration, race the
//! database workload against termination signals, cancel on the first
//! terminal event and report its cause.

pub mod config;
pub mod lifecycle;
pub mod workload;
