pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "smartquiz")]
#[command(author = "Smart Quiz Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Smart Quiz: Learning Companion. Practice questions and answers from your PDFs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long, default_value = "false")]
        force: bool,
    },

    /// Configure API keys and OAuth credentials
    #[command(long_about = "Configure API keys and OAuth credentials.\n\n\
        Supported services: openai, stripe, bmac, google.\n\
        Values may reference environment variables, e.g. ${OPENAI_API_KEY}.\n\n\
        The payment provider is selected with payment_provider = \"stripe\" | \"bmac\"\n\
        in ~/.config/smartquiz/config.toml.")]
    Auth {
        /// Service to configure (openai, stripe, bmac, google)
        #[arg(short, long)]
        service: Option<Service>,

        /// Set the key directly (alternative to interactive prompt)
        #[arg(short, long)]
        key: Option<String>,

        /// List configured services and their status
        #[arg(long, default_value = "false")]
        list: bool,
    },

    /// Sign in and start an interactive quiz session
    Start {
        /// PDF to upload right away
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Service {
    Openai,
    Stripe,
    Bmac,
    Google,
}

impl Service {
    /// Config section holding this service's secret
    pub fn section(&self) -> &'static str {
        match self {
            Service::Openai => "openai",
            Service::Stripe => "stripe",
            Service::Bmac => "bmac",
            Service::Google => "google",
        }
    }

    /// Key inside the section that `auth --key` writes
    pub fn secret_key(&self) -> &'static str {
        match self {
            Service::Google => "client_id",
            _ => "api_key",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Service::Openai => write!(f, "OpenAI"),
            Service::Stripe => write!(f, "Stripe"),
            Service::Bmac => write!(f, "Buy Me a Coffee"),
            Service::Google => write!(f, "Google"),
        }
    }
}
