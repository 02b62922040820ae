//! Tool: maintenance schedule and due items.

use std::sync::Arc;

use async_trait::async_trait;
use fc_protocol::{Category, Parameters};
use serde::Serialize;
use serde_json::json;

use crate::error::ToolExecResult;
use crate::schema::{ParamKind, ParamSpec, ToolSchema};
use crate::telemetry::TelemetrySource;
use crate::types::{CamperTool, ToolOutput};

pub const MAINTENANCE_TYPES: &[&str] = &["general", "oil_change", "inspection", "filter", "brakes"];
pub const TIME_FILTERS: &[&str] = &["all", "overdue", "upcoming"];

/// Items due within this distance count as upcoming.
const UPCOMING_WINDOW_KM: u64 = 2_000;

/// One entry of the service plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceItem {
    pub kind: &'static str,
    pub label: &'static str,
    pub due_at_km: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum DueStatus {
    Overdue,
    Upcoming,
    Scheduled,
}

/// Default service plan for the demo camper.
pub fn default_plan() -> Vec<ServiceItem> {
    vec![
        ServiceItem { kind: "oil_change", label: "Cambio olio motore", due_at_km: 49_500 },
        ServiceItem { kind: "filter", label: "Sostituzione filtro aria", due_at_km: 47_000 },
        ServiceItem { kind: "brakes", label: "Controllo freni", due_at_km: 60_000 },
        ServiceItem { kind: "inspection", label: "Tagliando e revisione", due_at_km: 50_000 },
    ]
}

/// Reports which service items are overdue or upcoming given the odometer.
pub struct GetMaintenanceStatus {
    schema: ToolSchema,
    telemetry: Arc<dyn TelemetrySource>,
    plan: Vec<ServiceItem>,
}

impl GetMaintenanceStatus {
    pub fn new(telemetry: Arc<dyn TelemetrySource>, plan: Vec<ServiceItem>) -> Self {
        let schema = ToolSchema::new(vec![
            ParamSpec::optional(
                "maintenance_type",
                ParamKind::Choice(MAINTENANCE_TYPES),
                "Kind of maintenance",
            )
            .with_default(json!("general"))
            .asking("Che tipo di manutenzione?"),
            ParamSpec::optional("time_filter", ParamKind::Choice(TIME_FILTERS), "Which items to list")
                .with_default(json!("all"))
                .asking("Quale periodo temporale?"),
        ]);
        Self {
            schema,
            telemetry,
            plan,
        }
    }
}

#[async_trait]
impl CamperTool for GetMaintenanceStatus {
    fn name(&self) -> &str {
        "get_maintenance_status"
    }

    fn description(&self) -> &str {
        "List overdue and upcoming maintenance items"
    }

    fn category(&self) -> Category {
        Category::Maintenance
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, params: &Parameters) -> ToolExecResult<ToolOutput> {
        let kind = str_param(params, "maintenance_type", "general");
        let filter = str_param(params, "time_filter", "all");
        let odometer = self.telemetry.snapshot().await?.odometer_km;

        let items: Vec<_> = self
            .plan
            .iter()
            .filter(|item| kind == "general" || item.kind == kind)
            .map(|item| (item, due_status(item.due_at_km, odometer)))
            .filter(|(_, status)| match filter {
                "overdue" => *status == DueStatus::Overdue,
                "upcoming" => *status == DueStatus::Upcoming,
                _ => true,
            })
            .collect();

        let summary = if items.is_empty() {
            "Nessuna manutenzione in scadenza.".to_string()
        } else {
            let lines: Vec<String> = items
                .iter()
                .map(|(item, status)| match status {
                    DueStatus::Overdue => format!("{} (scaduto)", item.label),
                    DueStatus::Upcoming => {
                        format!("{} tra {} km", item.label, item.due_at_km - odometer)
                    }
                    DueStatus::Scheduled => format!("{} a {} km", item.label, item.due_at_km),
                })
                .collect();
            format!("Manutenzione: {}.", lines.join("; "))
        };

        let data = json!({
            "maintenance_type": kind,
            "time_filter": filter,
            "odometer_km": odometer,
            "items": items
                .iter()
                .map(|(item, status)| json!({
                    "kind": item.kind,
                    "label": item.label,
                    "due_at_km": item.due_at_km,
                    "status": status,
                }))
                .collect::<Vec<_>>(),
        });
        Ok(ToolOutput::new(data, summary))
    }
}

fn str_param<'a>(params: &'a Parameters, name: &str, default: &'a str) -> &'a str {
    params.get(name).and_then(|v| v.as_str()).unwrap_or(default)
}

fn due_status(due_at_km: u64, odometer_km: u64) -> DueStatus {
    if odometer_km >= due_at_km {
        DueStatus::Overdue
    } else if due_at_km - odometer_km <= UPCOMING_WINDOW_KM {
        DueStatus::Upcoming
    } else {
        DueStatus::Scheduled
    }
}
