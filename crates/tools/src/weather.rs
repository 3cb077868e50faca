//! Weather tool: returns mock weather data.
//!
//! Deterministic per city so conversations and tests are reproducible
//! without network access.

use async_trait::async_trait;
use turnwise_core::error::ToolError;
use turnwise_core::tool::LocalTool;

const CONDITIONS: [&str; 5] = ["sunny", "partly cloudy", "cloudy", "rainy", "stormy"];

pub struct WeatherTool;

#[async_trait]
impl LocalTool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather_info"
    }

    fn description(&self) -> &str {
        "Get weather information for a city."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "The city name"
                }
            },
            "required": ["city"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let city = arguments["city"]
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'city' argument".into()))?;

        let (condition, temp) = mock_weather(city);
        Ok(format!("Weather in {city}: {condition}, {temp}°C"))
    }
}

/// Condition and a temperature in 15..=30 °C, derived from the city name.
fn mock_weather(city: &str) -> (&'static str, u32) {
    let hash: u32 = city
        .to_lowercase()
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let condition = CONDITIONS[(hash as usize / 7) % CONDITIONS.len()];
    (condition, 15 + hash % 16)
}
