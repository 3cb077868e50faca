//! `turnwise chat`: interactive or single-message chat mode.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use turnwise_agent::{LoopSettings, OrchestrationLoop, Session};
use turnwise_config::AppConfig;
use turnwise_core::error::Error;
use turnwise_core::stream::{AggregationResult, StreamEvent, StreamObserver};
use turnwise_tools::{InMemoryReminders, Portfolio, Preset, PresetOptions, advisor};

pub struct ChatOptions {
    pub message: Option<String>,
    pub preset: Option<String>,
    pub stream: bool,
    pub vector_stores: Vec<String>,
    pub advisor: AdvisorAsk,
}

/// A canned advisor question. At most one kind is set.
#[derive(Default)]
pub struct AdvisorAsk {
    pub portfolio: Option<PathBuf>,
    pub compare: Vec<String>,
    pub criteria: Option<String>,
    pub outlook: Option<String>,
}

impl AdvisorAsk {
    /// Render the question, reading the portfolio file if one was given.
    fn question(&self) -> Result<Option<String>, Box<dyn std::error::Error>> {
        if let Some(path) = &self.portfolio {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
            let portfolio = Portfolio::from_json(&raw)
                .map_err(|e| format!("Invalid portfolio {}: {e}", path.display()))?;
            return Ok(Some(advisor::analyze_portfolio(&portfolio)));
        }
        if !self.compare.is_empty() {
            return Ok(Some(advisor::compare_investments(
                &self.compare,
                self.criteria.as_deref(),
            )));
        }
        Ok(self
            .outlook
            .as_deref()
            .map(|sector| advisor::market_outlook(Some(sector))))
    }
}

/// Prints streamed text as it arrives and tool activity on stderr.
struct TerminalPrinter;

impl StreamObserver for TerminalPrinter {
    fn on_event(&self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta { text } => {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            StreamEvent::ToolCallStarted { tool_name, .. } => {
                eprintln!("\n  [running {tool_name}...]");
            }
            StreamEvent::StreamError { message } => {
                eprintln!("\n  [Error] {message}");
            }
            _ => {}
        }
    }
}

pub async fn run(options: ChatOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early, with a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    TURNWISE_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY   = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    // Advisor questions always go to the advisor preset
    let question = options.advisor.question()?;
    let preset: Preset = match &question {
        Some(_) => Preset::InvestmentAdvisor,
        None => options
            .preset
            .as_deref()
            .unwrap_or(&config.assistant.preset)
            .parse()?,
    };
    let message = question.or(options.message);

    let reminders = Arc::new(InMemoryReminders::new());
    let mut vector_store_ids = config.file_search.vector_store_ids.clone();
    vector_store_ids.extend(options.vector_stores);
    let registry = preset.registry(&PresetOptions {
        vector_store_ids,
        max_num_results: config.file_search.max_num_results,
        web_search: config.web_search.enabled,
        code_interpreter: config.code_interpreter.enabled,
        reminders: reminders.clone(),
    })?;
    let tool_names = registry
        .names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let provider = Arc::new(turnwise_providers::build_from_config(&config)?);
    let mut settings = LoopSettings::from_config(&config);
    if settings.instructions.is_none() {
        settings.instructions = Some(preset.instructions().to_string());
    }
    settings.stream = settings.stream && options.stream;

    let engine = Arc::new(OrchestrationLoop::new(provider, Arc::new(registry), settings));
    let session = Session::new(engine);

    if let Some(msg) = message {
        // Single message mode
        let result = session.run(&msg, &TerminalPrinter).await?;
        finish_answer(&result);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          turnwise — Interactive Mode         ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Preset:    {preset}");
    println!("  Model:     {}", config.model);
    println!("  Tools:     {tool_names}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'reset' to start over, 'exit' to quit.");
    println!("  Ctrl+C cancels the current response.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {
                prompt()?;
                continue;
            }
            "exit" | "quit" | "q" => break,
            "reset" => {
                session.reset()?;
                println!("  Started a new conversation.\n");
                prompt()?;
                continue;
            }
            _ => {}
        }

        let cancel = CancellationToken::new();
        let turn = session.run_with_cancel(input, &TerminalPrinter, &cancel);
        tokio::pin!(turn);
        let outcome = tokio::select! {
            outcome = &mut turn => outcome,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                turn.await
            }
        };

        match outcome {
            Ok(result) => finish_answer(&result),
            Err(Error::Cancelled) => eprintln!("\n  [Cancelled]\n"),
            Err(e) => eprintln!("\n  [Error] {e}\n"),
        }

        prompt()?;
    }

    let recorded = reminders.list();
    if !recorded.is_empty() {
        println!();
        println!("  Reminders created this session:");
        for reminder in &recorded {
            println!("    - {} ({})", reminder.task, reminder.time);
        }
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn finish_answer(result: &AggregationResult) {
    println!();
    if result.failed {
        eprintln!("  (the response did not complete)");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_advisor_flags_means_no_question() {
        assert!(AdvisorAsk::default().question().unwrap().is_none());
    }

    #[test]
    fn compare_flags_render_comparison() {
        let ask = AdvisorAsk {
            compare: vec!["Bonds".into(), "Gold".into()],
            criteria: Some("volatility".into()),
            ..Default::default()
        };
        let question = ask.question().unwrap().unwrap();
        assert!(question.starts_with("Please compare these investment options based on volatility:"));
        assert!(question.contains("- Bonds\n- Gold\n"));
    }

    #[test]
    fn outlook_flag_renders_outlook() {
        let ask = AdvisorAsk {
            outlook: Some("energy".into()),
            ..Default::default()
        };
        let question = ask.question().unwrap().unwrap();
        assert!(question.starts_with("Provide a market outlook analysis for energy:"));
    }

    #[test]
    fn portfolio_file_is_read_and_rendered() {
        let path = std::env::temp_dir().join(format!("turnwise-portfolio-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"age": 52, "holdings": "all cash"}"#).unwrap();
        let ask = AdvisorAsk {
            portfolio: Some(path.clone()),
            ..Default::default()
        };

        let question = ask.question().unwrap().unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(question.contains("- Age: 52\n"));
        assert!(question.contains("- Current Holdings: all cash\n"));
    }

    #[test]
    fn missing_portfolio_file_is_an_error() {
        let ask = AdvisorAsk {
            portfolio: Some(PathBuf::from("/nonexistent/turnwise/portfolio.json")),
            ..Default::default()
        };
        let err = ask.question().unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
