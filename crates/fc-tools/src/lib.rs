pub mod error;
pub mod mock;
pub mod registry;
pub mod schema;
pub mod telemetry;
pub mod tools;
pub mod types;

pub use error::{ToolError, ToolExecResult};
pub use registry::{ToolInfo, ToolRegistry};
pub use schema::{ParamKind, ParamSpec, ToolSchema};
pub use telemetry::{StaticTelemetry, TelemetrySource, VehicleSnapshot};
pub use types::{CamperTool, ToolOutput};
