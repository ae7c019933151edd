//! Observability subsystem.
//!
//! Every subsystem emits `tracing` events with structured fields; the
//! subscriber installed by [`logging::init`] writes them to stdout.
//! Requests carry an `x-request-id` set by the HTTP layer, so one
//! request's events can be correlated.

pub mod logging;
