//! Types shared by every nodewatch crate: alert payloads handed to the
//! notification sink and the tenant/process records consumed by the
//! reconciler.

pub mod types;
