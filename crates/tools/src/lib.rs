//! Built-in tool implementations for turnwise.
//!
//! Local tools run in-process when the service pauses a turn on them:
//! arithmetic, time queries, reminders, and weather. Remote descriptors
//! declare the service's hosted tools (web search, file search, code
//! interpreter). Presets bundle both with default instructions.

pub mod advisor;
pub mod calculator;
pub mod current_time;
pub mod presets;
pub mod reminder;
pub mod remote;
pub mod weather;

use turnwise_core::error::RegistryError;
use turnwise_core::tool::{Tool, ToolRegistry};

pub use advisor::Portfolio;
pub use presets::{Preset, PresetOptions};
pub use reminder::{InMemoryReminders, Reminder, ReminderSink};

/// Create a registry with every built-in local tool.
pub fn default_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(Tool::local(current_time::CurrentTimeTool))?;
    registry.register(Tool::local(calculator::CalculatorTool))?;
    registry.register(Tool::local(reminder::ReminderTool::new(std::sync::Arc::new(
        InMemoryReminders::new(),
    ))))?;
    registry.register(Tool::local(weather::WeatherTool))?;
    Ok(registry)
}
