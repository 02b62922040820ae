//! Tool: report vehicle system status from telemetry.

use std::sync::Arc;

use async_trait::async_trait;
use fc_protocol::{Category, Parameters};
use serde_json::json;

use crate::error::ToolExecResult;
use crate::schema::{ParamKind, ParamSpec, ToolSchema};
use crate::telemetry::{TelemetrySource, VehicleSnapshot};
use crate::types::{CamperTool, ToolOutput};

pub const SYSTEMS: &[&str] = &["general", "fuel", "engine", "tires", "battery"];

const LOW_FUEL_PERCENT: f64 = 15.0;
const HIGH_ENGINE_TEMP_C: f64 = 105.0;
const LOW_TIRE_BAR: f64 = 4.0;
const LOW_BATTERY_V: f64 = 12.2;

/// Reads the telemetry snapshot and summarizes one system (or all).
pub struct GetVehicleStatus {
    schema: ToolSchema,
    telemetry: Arc<dyn TelemetrySource>,
}

impl GetVehicleStatus {
    pub fn new(telemetry: Arc<dyn TelemetrySource>) -> Self {
        let schema = ToolSchema::new(vec![
            ParamSpec::optional("system", ParamKind::Choice(SYSTEMS), "Vehicle system to check")
                .with_default(json!("general"))
                .asking("Quale sistema vuoi controllare?"),
        ]);
        Self { schema, telemetry }
    }
}

#[async_trait]
impl CamperTool for GetVehicleStatus {
    fn name(&self) -> &str {
        "get_vehicle_status"
    }

    fn description(&self) -> &str {
        "Check fuel, engine, tires, battery or overall vehicle status"
    }

    fn category(&self) -> Category {
        Category::VehicleStatus
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, params: &Parameters) -> ToolExecResult<ToolOutput> {
        let system = params
            .get("system")
            .and_then(|v| v.as_str())
            .unwrap_or("general");
        let snap = self.telemetry.snapshot().await?;
        let warnings = warnings(&snap);

        let (data, summary) = match system {
            "fuel" => (
                json!({"fuel_percent": snap.fuel_percent, "range_km": snap.range_km}),
                format!(
                    "Carburante al {:.0}%, autonomia stimata {} km.",
                    snap.fuel_percent, snap.range_km
                ),
            ),
            "engine" => (
                json!({"engine_temp_c": snap.engine_temp_c, "oil_pressure_bar": snap.oil_pressure_bar}),
                format!(
                    "Motore a {:.0}°C, pressione olio {:.1} bar.",
                    snap.engine_temp_c, snap.oil_pressure_bar
                ),
            ),
            "tires" => {
                let [fl, fr, rl, rr] = snap.tire_pressure_bar;
                (
                    json!({"tire_pressure_bar": snap.tire_pressure_bar}),
                    format!(
                        "Pressione pneumatici: ant. {fl:.1}/{fr:.1} bar, post. {rl:.1}/{rr:.1} bar."
                    ),
                )
            }
            "battery" => (
                json!({"battery_voltage": snap.battery_voltage}),
                format!("Batteria servizi a {:.1} V.", snap.battery_voltage),
            ),
            _ => {
                let headline = if warnings.is_empty() {
                    "Tutti i sistemi operativi."
                } else {
                    "Attenzione richiesta."
                };
                (
                    serde_json::to_value(&snap).unwrap_or_default(),
                    format!(
                        "{headline} Carburante {:.0}%, motore {:.0}°C, batteria {:.1} V.",
                        snap.fuel_percent, snap.engine_temp_c, snap.battery_voltage
                    ),
                )
            }
        };

        let mut summary = summary;
        for w in &warnings {
            summary.push(' ');
            summary.push_str(w);
        }

        let mut data = data;
        data["system"] = json!(system);
        data["warnings"] = json!(warnings);
        Ok(ToolOutput::new(data, summary))
    }
}

fn warnings(snap: &VehicleSnapshot) -> Vec<String> {
    let mut out = Vec::new();
    if snap.fuel_percent < LOW_FUEL_PERCENT {
        out.push("Carburante in riserva.".to_string());
    }
    if snap.engine_temp_c > HIGH_ENGINE_TEMP_C {
        out.push("Temperatura motore elevata.".to_string());
    }
    if snap.tire_pressure_bar.iter().any(|p| *p < LOW_TIRE_BAR) {
        out.push("Pressione pneumatici bassa.".to_string());
    }
    if snap.battery_voltage < LOW_BATTERY_V {
        out.push("Batteria scarica.".to_string());
    }
    out
}
