use anyhow::{Context, Result};
use console::{Emoji, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::time::Duration;

use crate::config::{BmacConfig, Config, GoogleConfig, OpenAIConfig, StripeConfig};

static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
static KEY: Emoji<'_, '_> = Emoji("🔑 ", "");

/// Configuration written by `init`; secrets point at environment variables
pub fn default_config() -> Config {
    Config {
        openai: OpenAIConfig {
            api_key: "${OPENAI_API_KEY}".to_string(),
            ..OpenAIConfig::default()
        },
        stripe: StripeConfig {
            api_key: "${STRIPE_API_KEY}".to_string(),
            api_key_test: "${STRIPE_API_KEY_TEST}".to_string(),
            ..StripeConfig::default()
        },
        bmac: BmacConfig {
            api_key: "${BMAC_API_KEY}".to_string(),
            ..BmacConfig::default()
        },
        google: GoogleConfig {
            client_id: "${GOOGLE_CLIENT_ID}".to_string(),
            client_secret: "${GOOGLE_CLIENT_SECRET}".to_string(),
        },
        ..Config::default()
    }
}

pub async fn run(force: bool) -> Result<()> {
    println!();
    println!("{}", style(" Smart Quiz - Initialization ").bold().reverse());
    println!();

    let config_dir = Config::config_dir()?;
    let config_path = Config::config_path()?;

    if config_path.exists() && !force {
        println!(
            "{}Configuration already exists at {}",
            WARN,
            style(config_path.display()).cyan()
        );
        println!("  Use {} to overwrite", style("--force").yellow());
        return Ok(());
    }

    fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template(&format!("{}{{spinner:.green}} {{msg}}", GEAR))?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Creating configuration...");

    let config_content = toml::to_string_pretty(&default_config())?;
    fs::write(&config_path, config_content).context("Failed to write config file")?;
    spinner.finish_and_clear();

    println!(
        "{}Created configuration at {}",
        CHECK,
        style(config_path.display()).cyan()
    );

    println!();
    println!("{}", style("━".repeat(50)).dim());
    println!();
    println!("{}Next steps:", ROCKET);
    println!();
    println!("  {}Configure OpenAI, Google sign-in and your payment provider:", KEY);
    println!("    {} smartquiz auth --service openai", style("$").dim());
    println!("    {} smartquiz auth --service google", style("$").dim());
    println!("    {} smartquiz auth --service stripe", style("$").dim());
    println!();
    println!("  {}Start a quiz session:", ROCKET);
    println!("    {} smartquiz start ./lecture-notes.pdf", style("$").dim());
    println!();

    Ok(())
}
