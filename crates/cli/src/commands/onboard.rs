//! `turnwise onboard`: first-time setup.

use turnwise_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = AppConfig::config_path();

    println!("turnwise: First-Time Setup");
    println!("==========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("  Config file exists: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config file: {}", config_path.display());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.has_api_key() {
        println!("✅ API key found");
    } else {
        println!("\n📝 Next steps:");
        println!(
            "   1. Add api_key to {} (or set OPENAI_API_KEY)",
            config_path.display()
        );
        println!("   2. Run: turnwise doctor");
        println!("   3. Run: turnwise chat\n");
    }

    println!("🎉 Setup complete! Run `turnwise chat` to start chatting.\n");

    Ok(())
}
