//! Tool: plan a camper-safe route to a destination.

use async_trait::async_trait;
use fc_protocol::{Category, Parameters};
use serde_json::json;

use crate::error::{ToolError, ToolExecResult};
use crate::schema::{ParamKind, ParamSpec, ToolSchema};
use crate::types::{CamperTool, ToolOutput};

pub const ROUTE_TYPES: &[&str] = &["fastest", "shortest", "scenic"];

const MAX_DESTINATION_CHARS: usize = 120;

/// Camper dimensions used for route restrictions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleProfile {
    pub width_m: f64,
    pub height_m: f64,
    pub length_m: f64,
    pub weight_t: f64,
}

impl Default for VehicleProfile {
    fn default() -> Self {
        Self {
            width_m: 2.3,
            height_m: 3.1,
            length_m: 7.5,
            weight_t: 3.5,
        }
    }
}

/// Sets the navigation route, honouring toll/highway preferences and the
/// camper's dimensions.
pub struct SetRoute {
    schema: ToolSchema,
    profile: VehicleProfile,
}

impl SetRoute {
    pub fn new(profile: VehicleProfile) -> Self {
        let schema = ToolSchema::new(vec![
            ParamSpec::required("destination", ParamKind::Text, "Destination city or address")
                .asking("Qual è la destinazione?"),
            ParamSpec::optional("avoid_tolls", ParamKind::Boolean, "Avoid toll roads")
                .with_default(json!(false)),
            ParamSpec::optional("avoid_highways", ParamKind::Boolean, "Avoid highways")
                .with_default(json!(false)),
            ParamSpec::optional("route_type", ParamKind::Choice(ROUTE_TYPES), "Route optimisation")
                .with_default(json!("fastest")),
        ]);
        Self { schema, profile }
    }
}

impl Default for SetRoute {
    fn default() -> Self {
        Self::new(VehicleProfile::default())
    }
}

#[async_trait]
impl CamperTool for SetRoute {
    fn name(&self) -> &str {
        "set_route"
    }

    fn description(&self) -> &str {
        "Plan a route to a destination, avoiding roads unsuitable for the camper"
    }

    fn category(&self) -> Category {
        Category::Navigation
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, params: &Parameters) -> ToolExecResult<ToolOutput> {
        let destination = params
            .get("destination")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::MissingParameter("destination".into()))?;
        if destination.chars().count() > MAX_DESTINATION_CHARS {
            return Err(ToolError::InvalidParameter {
                name: "destination".into(),
                reason: format!("longer than {MAX_DESTINATION_CHARS} characters"),
            });
        }

        let avoid_tolls = flag(params, "avoid_tolls");
        let avoid_highways = flag(params, "avoid_highways");
        let route_type = params
            .get("route_type")
            .and_then(|v| v.as_str())
            .unwrap_or("fastest");

        let mut summary = format!("Rotta impostata per {destination}.");
        if avoid_tolls {
            summary.push_str(" Evitando pedaggi.");
        }
        if avoid_highways {
            summary.push_str(" Evitando autostrade.");
        }

        tracing::info!(destination, avoid_tolls, avoid_highways, route_type, "route set");

        let data = json!({
            "destination": destination,
            "route_type": route_type,
            "preferences": {
                "avoid_tolls": avoid_tolls,
                "avoid_highways": avoid_highways,
                "avoid_low_bridges": true,
                "avoid_ztl": true,
            },
            "vehicle": {
                "width_m": self.profile.width_m,
                "height_m": self.profile.height_m,
                "length_m": self.profile.length_m,
                "weight_t": self.profile.weight_t,
            },
        });
        Ok(ToolOutput::new(data, summary))
    }
}

fn flag(params: &Parameters, name: &str) -> bool {
    params.get(name).and_then(|v| v.as_bool()).unwrap_or(false)
}
