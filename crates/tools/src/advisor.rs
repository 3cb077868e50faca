//! Ready-made questions for the investment advisor preset.
//!
//! Each builder renders a user utterance; the advisor's instructions and
//! its code interpreter do the rest.

use serde::Deserialize;
use serde_json::Value;

const NOT_SPECIFIED: &str = "Not specified";

/// Investor profile read from a JSON file.
///
/// Every field is optional. Holdings may be free text, a list, or a
/// mapping of asset to weight.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Portfolio {
    pub age: Option<Value>,
    pub risk_tolerance: Option<String>,
    #[serde(alias = "investment_horizon")]
    pub timeline: Option<String>,
    pub holdings: Option<Value>,
    pub goals: Option<Value>,
}

impl Portfolio {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Ask for an analysis of `portfolio`.
pub fn analyze_portfolio(portfolio: &Portfolio) -> String {
    format!(
        "Please analyze this investment portfolio and provide suggestions:

Portfolio Details:
- Age: {age}
- Risk Tolerance: {risk}
- Investment Timeline: {timeline}
- Current Holdings: {holdings}
- Investment Goals: {goals}

Please provide:
1. Analysis of current allocation
2. Risk assessment
3. Diversification recommendations
4. Suggested adjustments (if any)
5. Expected return projections (with visualizations if helpful)",
        age = render(portfolio.age.as_ref()),
        risk = portfolio.risk_tolerance.as_deref().unwrap_or("Moderate"),
        timeline = portfolio.timeline.as_deref().unwrap_or(NOT_SPECIFIED),
        holdings = render(portfolio.holdings.as_ref()),
        goals = render(portfolio.goals.as_ref()),
    )
}

/// Ask for a side-by-side comparison of `options`.
///
/// `criteria` defaults to risk-adjusted returns.
pub fn compare_investments(options: &[String], criteria: Option<&str>) -> String {
    let listed = options
        .iter()
        .map(|option| format!("- {option}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Please compare these investment options based on {criteria}:

{listed}

Provide:
1. Side-by-side comparison
2. Pros and cons of each option
3. Risk analysis
4. Historical performance (if applicable)
5. Recommendation based on different investor profiles
6. Use visualizations to illustrate key differences",
        criteria = criteria.unwrap_or("risk-adjusted returns"),
    )
}

/// Ask for a market outlook on `sector`, or the market as a whole.
pub fn market_outlook(sector: Option<&str>) -> String {
    format!(
        "Provide a market outlook analysis for {sector}:

Please include:
1. Current market conditions
2. Key trends and drivers
3. Potential risks and opportunities
4. Investment strategies for current conditions
5. Sector-specific recommendations (if applicable)

Note: Focus on general principles and educational insights rather than specific stock picks.",
        sector = sector.unwrap_or("general market"),
    )
}

fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NOT_SPECIFIED.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| render(Some(item)))
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, item)| format!("{key}: {}", render(Some(item))))
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}
