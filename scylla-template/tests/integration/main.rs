//! Behaviour of template operations, run against a stub session.

mod batch;
mod processing;
