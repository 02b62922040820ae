//! Tool implementations.

pub mod maintenance;
pub mod navigation;
pub mod vehicle_status;
pub mod weather;

use std::sync::Arc;

use crate::telemetry::TelemetrySource;
use crate::types::CamperTool;

pub use maintenance::GetMaintenanceStatus;
pub use navigation::{SetRoute, VehicleProfile};
pub use vehicle_status::GetVehicleStatus;
pub use weather::GetWeather;

/// The default tool set, one per tool category.
pub fn all_tools(telemetry: Arc<dyn TelemetrySource>) -> Vec<Arc<dyn CamperTool>> {
    vec![
        Arc::new(SetRoute::default()),
        Arc::new(GetWeather::new()),
        Arc::new(GetVehicleStatus::new(telemetry.clone())),
        Arc::new(GetMaintenanceStatus::new(
            telemetry,
            maintenance::default_plan(),
        )),
    ]
}
