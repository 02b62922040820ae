//! Vehicle telemetry abstraction.
//!
//! `TelemetrySource` is what the vehicle and maintenance tools read from.
//! `StaticTelemetry` serves a fixed snapshot and is used both as the default
//! source and in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolExecResult;

/// Point-in-time vehicle readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub fuel_percent: f64,
    pub range_km: u32,
    pub engine_temp_c: f64,
    pub oil_pressure_bar: f64,
    /// Front-left, front-right, rear-left, rear-right.
    pub tire_pressure_bar: [f64; 4],
    pub battery_voltage: f64,
    pub odometer_km: u64,
}

impl Default for VehicleSnapshot {
    fn default() -> Self {
        Self {
            fuel_percent: 68.0,
            range_km: 540,
            engine_temp_c: 88.0,
            oil_pressure_bar: 3.2,
            tire_pressure_bar: [4.5, 4.5, 4.4, 4.5],
            battery_voltage: 12.6,
            odometer_km: 48_250,
        }
    }
}

/// Source of vehicle readings.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn snapshot(&self) -> ToolExecResult<VehicleSnapshot>;
}

/// Telemetry source returning a fixed snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticTelemetry {
    snapshot: VehicleSnapshot,
}

impl StaticTelemetry {
    pub fn new(snapshot: VehicleSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl TelemetrySource for StaticTelemetry {
    async fn snapshot(&self) -> ToolExecResult<VehicleSnapshot> {
        Ok(self.snapshot.clone())
    }
}
