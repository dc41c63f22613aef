use anyhow::{Context, Result};
use console::{Emoji, style};
use std::fs;
use std::io::{self, Write};

use crate::cli::Service;
use crate::config::Config;

static KEY: Emoji<'_, '_> = Emoji("🔑 ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[X] ");
static LOCK: Emoji<'_, '_> = Emoji("🔐 ", "");

const SERVICES: [Service; 4] = [Service::Openai, Service::Google, Service::Stripe, Service::Bmac];

pub async fn run(service: Option<Service>, key: Option<String>, list: bool) -> Result<()> {
    println!();
    println!("{}", style(" Smart Quiz - Authentication ").bold().reverse());
    println!();

    if list {
        return list_services();
    }

    let service = match service {
        Some(s) => s,
        None => select_service()?,
    };

    let secret = match key {
        Some(k) => k,
        None => prompt_secret(service)?,
    };

    save_secret(service, service.secret_key(), &secret)?;

    // Device sign-in needs the OAuth client secret alongside the client id
    if service == Service::Google {
        let client_secret = prompt_line("Enter your Google OAuth client secret (optional)")?;
        if !client_secret.is_empty() {
            save_secret(service, "client_secret", &client_secret)?;
        }
    }

    println!();
    println!(
        "{}{} credentials configured successfully!",
        CHECK,
        style(service.to_string()).cyan().bold()
    );

    Ok(())
}

fn list_services() -> Result<()> {
    println!("{}Configured services", LOCK);
    println!();

    let config = match Config::load() {
        Ok(c) => c,
        Err(_) => {
            println!(
                "{}",
                style("No configuration found. Run 'smartquiz init' first.").yellow()
            );
            return Ok(());
        }
    };

    for service in SERVICES {
        let (configured, detail) = service_status(&config, service);
        let status_icon = if configured { CHECK } else { CROSS };
        let status_text = if configured {
            style("Configured").green()
        } else {
            style("Not configured").red()
        };

        println!(
            "  {}{:<16} {} {}",
            status_icon,
            service.to_string(),
            status_text,
            style(detail).dim()
        );
    }

    println!();
    println!(
        "  Payment provider: {}{}",
        style(&config.payment_provider).cyan(),
        if config.testing_mode { " (testing mode)" } else { "" }
    );

    println!();
    println!("{}Set credentials with:", KEY);
    println!("  {} smartquiz auth --service <name>", style("$").dim());
    println!();
    println!("Or set the environment variables the default config refers to:");
    for service in SERVICES {
        println!("  {} export {}=your-key", style("$").dim(), env_var(&config, service));
    }

    Ok(())
}

fn env_var(config: &Config, service: Service) -> &'static str {
    match service {
        Service::Openai => "OPENAI_API_KEY",
        Service::Stripe if config.testing_mode => "STRIPE_API_KEY_TEST",
        Service::Stripe => "STRIPE_API_KEY",
        Service::Bmac => "BMAC_API_KEY",
        Service::Google => "GOOGLE_CLIENT_ID",
    }
}

/// Status of a service's credential as resolved by the loaded config
fn service_status(config: &Config, service: Service) -> (bool, String) {
    let (value, detail) = match service {
        Service::Openai => (config.openai.api_key.as_str(), "(from config)"),
        Service::Stripe if config.testing_mode => (config.stripe_api_key(), "(test key)"),
        Service::Stripe => (config.stripe_api_key(), "(from config)"),
        Service::Bmac => (config.bmac.api_key.as_str(), "(from config)"),
        Service::Google => (config.google.client_id.as_str(), "(from config)"),
    };

    if value.is_empty() {
        (false, String::new())
    } else {
        (true, detail.to_string())
    }
}

fn select_service() -> Result<Service> {
    println!("Select service:");
    println!();
    println!("  {} OpenAI (question and answer models)", style("1.").cyan());
    println!("  {} Google (sign-in)", style("2.").cyan());
    println!("  {} Stripe (subscriptions)", style("3.").cyan());
    println!("  {} Buy Me a Coffee (memberships)", style("4.").cyan());
    println!();

    let choice = prompt_line("Enter choice [1-4]")?;
    match choice.as_str() {
        "1" => Ok(Service::Openai),
        "2" => Ok(Service::Google),
        "3" => Ok(Service::Stripe),
        "4" => Ok(Service::Bmac),
        other => anyhow::bail!("Invalid choice '{}'", other),
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{} {}: ", style("?").green().bold(), prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_secret(service: Service) -> Result<String> {
    let prompt = match service {
        Service::Openai => "Enter your OpenAI API key",
        Service::Stripe => "Enter your Stripe secret key",
        Service::Bmac => "Enter your Buy Me a Coffee API token",
        Service::Google => "Enter your Google OAuth client id",
    };

    let secret = prompt_line(prompt)?;
    if secret.is_empty() {
        anyhow::bail!("Key cannot be empty");
    }

    let expected_prefix = match service {
        Service::Openai => Some("sk-"),
        Service::Stripe => Some("sk_"),
        _ => None,
    };
    if let Some(prefix) = expected_prefix
        && !secret.starts_with(prefix)
    {
        println!(
            "  {}",
            style(format!("Warning: {} keys typically start with '{}'", service, prefix)).yellow()
        );
    }

    Ok(secret)
}

fn save_secret(service: Service, key: &str, value: &str) -> Result<()> {
    let config_path = Config::config_path()?;

    if !config_path.exists() {
        anyhow::bail!("Configuration not found. Run 'smartquiz init' first.");
    }

    let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
    let new_content = set_value(&content, service.section(), key, value);
    fs::write(&config_path, new_content).context("Failed to write config file")?;

    Ok(())
}

/// Set `key` inside `[section]`, adding the line or the section when missing
fn set_value(content: &str, section: &str, key: &str, value: &str) -> String {
    let header = format!("[{}]", section);
    let entry = format!("{} = {}", key, toml::Value::String(value.to_string()));

    let mut lines: Vec<String> = content.lines().map(String::from).collect();
    let mut in_section = false;
    let mut section_at = None;
    let mut updated = false;

    for (i, line) in lines.iter_mut().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            in_section = trimmed == header;
            if in_section {
                section_at = Some(i);
            }
            continue;
        }

        let is_key = trimmed
            .split_once('=')
            .is_some_and(|(k, _)| k.trim() == key);
        if in_section && is_key {
            *line = entry.clone();
            updated = true;
        }
    }

    if !updated {
        match section_at {
            Some(i) => lines.insert(i + 1, entry),
            None => {
                lines.push(String::new());
                lines.push(header);
                lines.push(entry);
            }
        }
    }

    let mut new_content = lines.join("\n");
    new_content.push('\n');
    new_content
}
