//! Manager module: lifecycle, health and manual entry points of the sync system.

mod reports;
mod sync_manager;

pub use reports::{
    BatchOutcome, HealthReport, MetricsExport, ProcessOutcome, Rejection, SyncStatus,
};
pub use sync_manager::SyncManager;
