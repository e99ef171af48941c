//! Background job implementations

pub mod scan;

pub use scan::{BatchScanJob, ScanJobPayload, ScanJobSummary};
