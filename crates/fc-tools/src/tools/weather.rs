//! Tool: weather forecast for a location.

use async_trait::async_trait;
use fc_protocol::{Category, Parameters};
use serde_json::json;

use crate::error::{ToolError, ToolExecResult};
use crate::schema::{ParamKind, ParamSpec, ToolSchema};
use crate::types::{CamperTool, ToolOutput};

pub const TIMEFRAMES: &[&str] = &["now", "today", "tomorrow", "weekend"];

const CONDITIONS: &[&str] = &[
    "Soleggiato",
    "Parzialmente nuvoloso",
    "Nuvoloso",
    "Pioggia leggera",
    "Temporale",
];

/// Returns a forecast for a location. Simulated: the same location and
/// timeframe always produce the same forecast.
pub struct GetWeather {
    schema: ToolSchema,
}

impl GetWeather {
    pub fn new() -> Self {
        let schema = ToolSchema::new(vec![
            ParamSpec::required("location", ParamKind::Text, "City or area")
                .asking("Per quale località?"),
            ParamSpec::optional("timeframe", ParamKind::Choice(TIMEFRAMES), "Forecast period")
                .with_default(json!("now")),
        ]);
        Self { schema }
    }
}

impl Default for GetWeather {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CamperTool for GetWeather {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the weather forecast for a location"
    }

    fn category(&self) -> Category {
        Category::Weather
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, params: &Parameters) -> ToolExecResult<ToolOutput> {
        let location = params
            .get("location")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::MissingParameter("location".into()))?;
        let timeframe = params
            .get("timeframe")
            .and_then(|v| v.as_str())
            .unwrap_or("now");

        let seed = seed_for(location, timeframe);
        let condition = CONDITIONS[seed % CONDITIONS.len()];
        let temperature_c = 8 + (seed % 20) as i64;

        let summary = match timeframe_label(timeframe) {
            Some(label) => format!("Meteo per {location} ({label}): {condition}, {temperature_c}°C"),
            None => format!("Meteo per {location}: {condition}, {temperature_c}°C"),
        };

        let data = json!({
            "location": location,
            "timeframe": timeframe,
            "condition": condition,
            "temperature_c": temperature_c,
        });
        Ok(ToolOutput::new(data, summary))
    }
}

fn seed_for(location: &str, timeframe: &str) -> usize {
    location
        .to_lowercase()
        .bytes()
        .chain(timeframe.bytes())
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
}

fn timeframe_label(timeframe: &str) -> Option<&'static str> {
    match timeframe {
        "today" => Some("oggi"),
        "tomorrow" => Some("domani"),
        "weekend" => Some("weekend"),
        _ => None,
    }
}
