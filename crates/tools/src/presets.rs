//! Ready-made assistant setups: a tool registry plus default instructions.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use turnwise_core::error::RegistryError;
use turnwise_core::tool::{Tool, ToolRegistry};

use crate::calculator::CalculatorTool;
use crate::current_time::CurrentTimeTool;
use crate::reminder::{InMemoryReminders, ReminderSink, ReminderTool};
use crate::remote;
use crate::weather::WeatherTool;

const PERSONAL_INSTRUCTIONS: &str = "You are a helpful personal assistant with access to various tools.

Your capabilities include:
- Web search for finding current information
- Time and timezone queries
- Basic calculations
- Creating reminders
- Weather information

Be proactive in using your tools to provide accurate and helpful information.
When users ask questions that require current data, use web search.
Always be concise but thorough in your responses.";

const DOCUMENT_INSTRUCTIONS: &str = "You are a helpful research assistant that searches through documents.
Answer questions accurately based on the documents provided.
Always cite your sources when possible using the document names.
If you're not sure about something, admit it and stick to the information in the documents.";

const ADVISOR_INSTRUCTIONS: &str = "You are a professional investment advisor with expertise in:
- Portfolio diversification and risk management
- Market analysis and trends
- Asset allocation strategies
- Financial planning and retirement savings
- Stock, bond, ETF, and mutual fund analysis

Guidelines:
- Provide data-driven insights when possible
- Use code interpreter to perform calculations and create visualizations
- Always include risk disclaimers
- Explain your reasoning clearly
- Consider the user's risk tolerance and investment timeline";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    PersonalAssistant,
    DocumentSearch,
    InvestmentAdvisor,
}

/// Knobs a preset consults while building its registry.
#[derive(Clone)]
pub struct PresetOptions {
    pub vector_store_ids: Vec<String>,
    pub max_num_results: u32,
    pub web_search: bool,
    pub code_interpreter: bool,
    pub reminders: Arc<dyn ReminderSink>,
}

impl Default for PresetOptions {
    fn default() -> Self {
        Self {
            vector_store_ids: Vec::new(),
            max_num_results: 5,
            web_search: true,
            code_interpreter: true,
            reminders: Arc::new(InMemoryReminders::new()),
        }
    }
}

impl Preset {
    pub const ALL: [Preset; 3] = [
        Preset::PersonalAssistant,
        Preset::DocumentSearch,
        Preset::InvestmentAdvisor,
    ];

    /// Short name used in config files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonalAssistant => "personal",
            Self::DocumentSearch => "documents",
            Self::InvestmentAdvisor => "advisor",
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            Self::PersonalAssistant => PERSONAL_INSTRUCTIONS,
            Self::DocumentSearch => DOCUMENT_INSTRUCTIONS,
            Self::InvestmentAdvisor => ADVISOR_INSTRUCTIONS,
        }
    }

    /// Build the registry for this preset.
    pub fn registry(&self, options: &PresetOptions) -> Result<ToolRegistry, RegistryError> {
        let mut registry = ToolRegistry::new();
        match self {
            Self::PersonalAssistant => {
                if options.web_search {
                    registry.register(Tool::Remote(remote::web_search()))?;
                }
                registry.register(Tool::local(CurrentTimeTool))?;
                registry.register(Tool::local(CalculatorTool))?;
                registry.register(Tool::local(ReminderTool::new(options.reminders.clone())))?;
                registry.register(Tool::local(WeatherTool))?;
            }
            Self::DocumentSearch => {
                if options.vector_store_ids.is_empty() {
                    tracing::warn!("No document stores configured; file search is disabled");
                } else {
                    registry.register(Tool::Remote(remote::file_search(
                        &options.vector_store_ids,
                        options.max_num_results,
                    )))?;
                }
            }
            Self::InvestmentAdvisor => {
                if options.code_interpreter {
                    registry.register(Tool::Remote(remote::code_interpreter()))?;
                }
                registry.register(Tool::local(CalculatorTool))?;
            }
        }
        Ok(registry)
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "personal" | "personal-assistant" | "assistant" => Ok(Self::PersonalAssistant),
            "documents" | "document-search" | "docs" => Ok(Self::DocumentSearch),
            "advisor" | "investment-advisor" | "investment" => Ok(Self::InvestmentAdvisor),
            other => Err(format!(
                "unknown preset '{other}' (expected one of: personal, documents, advisor)"
            )),
        }
    }
}
