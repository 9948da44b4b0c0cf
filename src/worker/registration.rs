//! Best-effort registration of the periodic due-check trigger.

use crate::config::ScheduleConfig;
use crate::worker::host::WorkerHost;
use tracing::{info, warn};

/// Whether the periodic trigger was registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationReport {
    Registered { tag: String, min_interval_secs: u64 },
    /// The host refused or does not support periodic triggers. Due checks
    /// then only run when the host fires the tag some other way.
    Unavailable { tag: String, reason: String },
}

/// Ask the host for a recurring `periodic_tag` trigger.
///
/// Never fails; a refusal is logged and reported.
pub async fn register_periodic_check(
    host: &dyn WorkerHost,
    config: &ScheduleConfig,
) -> RegistrationReport {
    let tag = config.periodic_tag.clone();
    match host
        .register_periodic_sync(&tag, config.min_interval())
        .await
    {
        Ok(()) => {
            info!(tag = %tag, min_interval_secs = config.min_interval_secs, "periodic check registered");
            RegistrationReport::Registered {
                tag,
                min_interval_secs: config.min_interval_secs,
            }
        }
        Err(e) => {
            warn!(tag = %tag, error = %e, "periodic check registration failed");
            RegistrationReport::Unavailable {
                tag,
                reason: e.to_string(),
            }
        }
    }
}
