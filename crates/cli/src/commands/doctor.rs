//! `turnwise doctor`: diagnose configuration and connectivity.

use turnwise_config::AppConfig;
use turnwise_core::Provider;
use turnwise_tools::{Preset, PresetOptions};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 turnwise Doctor: System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ⚠️  No config file, using defaults (run `turnwise onboard`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    match config.assistant.preset.parse::<Preset>() {
        Ok(preset) => match preset.registry(&PresetOptions {
            vector_store_ids: config.file_search.vector_store_ids.clone(),
            max_num_results: config.file_search.max_num_results,
            web_search: config.web_search.enabled,
            code_interpreter: config.code_interpreter.enabled,
            ..PresetOptions::default()
        }) {
            Ok(registry) => println!(
                "  ✅ Preset '{preset}' with tools: {}",
                registry.names().join(", ")
            ),
            Err(e) => {
                println!("  ❌ Preset '{preset}' failed to build: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    match turnwise_providers::build_from_config(&config) {
        Ok(provider) => {
            println!("  ✅ API key configured");
            match provider.health_check().await {
                Ok(true) => println!("  ✅ Service reachable at {}", provider.base_url()),
                Ok(false) => {
                    println!("  ⚠️  Service at {} answered but is unhealthy", provider.base_url());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Service check failed: {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ⚠️  {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
