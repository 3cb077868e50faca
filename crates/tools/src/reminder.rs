//! Reminder tool.
//!
//! Reminders are handed to a [`ReminderSink`] supplied at construction. The
//! default sink keeps them in memory; a calendar or mail backend plugs in by
//! implementing the trait.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turnwise_core::error::ToolError;
use turnwise_core::tool::LocalTool;

/// A reminder as requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub task: String,
    /// Free-form time expression ("in 30 minutes", "tomorrow at 2pm").
    pub time: String,
    pub created_at: DateTime<Utc>,
}

/// Destination for created reminders.
#[async_trait]
pub trait ReminderSink: Send + Sync {
    async fn store(&self, reminder: Reminder) -> Result<(), ToolError>;
}

/// Keeps reminders in process memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryReminders {
    items: Arc<Mutex<Vec<Reminder>>>,
}

impl InMemoryReminders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything stored so far.
    pub fn list(&self) -> Vec<Reminder> {
        self.items.lock().map(|items| items.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ReminderSink for InMemoryReminders {
    async fn store(&self, reminder: Reminder) -> Result<(), ToolError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| ToolError::Fatal("reminder store poisoned".into()))?;
        items.push(reminder);
        Ok(())
    }
}

pub struct ReminderTool {
    sink: Arc<dyn ReminderSink>,
}

impl ReminderTool {
    pub fn new(sink: Arc<dyn ReminderSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl LocalTool for ReminderTool {
    fn name(&self) -> &str {
        "create_reminder"
    }

    fn description(&self) -> &str {
        "Create a reminder for a specific task."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The task or reminder description"
                },
                "time": {
                    "type": "string",
                    "description": "When to be reminded (e.g., \"in 30 minutes\", \"tomorrow at 2pm\")"
                }
            },
            "required": ["task", "time"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let task = arguments["task"]
            .as_str()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'task' argument".into()))?;
        let time = arguments["time"]
            .as_str()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'time' argument".into()))?;

        self.sink
            .store(Reminder {
                task: task.to_string(),
                time: time.to_string(),
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(task, time, "Reminder created");
        Ok(format!("Reminder created: '{task}' scheduled for {time}"))
    }
}
