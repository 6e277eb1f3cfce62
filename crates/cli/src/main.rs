use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use travelguide_agents::{resolve_user_id, TravelAgent};
use travelguide_core::{classify, rules, DialogResponse, DialogSettings};
use travelguide_observability::{init_tracing, AppMetrics};
use travelguide_providers::{ProviderConfig, ProviderSet};
use travelguide_storage::MemorySessionStore;

#[derive(Debug, Parser)]
#[command(name = "travelguide")]
#[command(about = "TravelGuide travel-planning assistant")]
struct Cli {
    /// Departure airport for flight searches.
    #[arg(long, env = "TRAVELGUIDE_FLIGHT_ORIGIN", default_value = "BER")]
    flight_origin: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive planning session.
    Chat {
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Runs a single turn and prints the reply as JSON.
    Ask {
        text: String,
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Prints the classification of an utterance.
    Classify { text: String },
    /// Lists the intent rules in priority order.
    Rules,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("travelguide_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Chat { user_id } => {
            let agent = build_agent(&cli.flight_origin)?;
            run_chat(agent, resolve_user_id(user_id.as_deref())).await?
        }
        Command::Ask { text, user_id } => {
            let agent = build_agent(&cli.flight_origin)?;
            let response = agent
                .handle_turn(&resolve_user_id(user_id.as_deref()), &text)
                .await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Classify { text } => {
            println!("{}", serde_json::to_string_pretty(&classify(&text))?);
        }
        Command::Rules => {
            for (position, rule) in rules().iter().enumerate() {
                println!(
                    "{:>2}. {:<22} {:<20} {}",
                    position + 1,
                    rule.id,
                    rule.intent.as_code(),
                    if rule.explicit { "explicit" } else { "implicit" }
                );
                for sample in rule.samples {
                    println!("      e.g. {sample}");
                }
            }
        }
    }

    Ok(())
}

fn print_reply(response: &DialogResponse) {
    println!("\n{}\n", response.message);
    if !response.suggestions.is_empty() {
        println!("Vorschläge:");
        for suggestion in &response.suggestions {
            println!("- {suggestion}");
        }
        println!();
    }
}

async fn run_chat(agent: TravelAgent<MemorySessionStore>, user_id: String) -> Result<()> {
    println!("TravelGuide Chat ({user_id}). 'exit' beendet die Sitzung.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.is_empty() {
            continue;
        }

        let response = agent.handle_turn(&user_id, message).await;
        print_reply(&response);
    }

    Ok(())
}

fn build_agent(flight_origin: &str) -> Result<TravelAgent<MemorySessionStore>> {
    let config = ProviderConfig::from_env();
    let providers =
        ProviderSet::from_config(&config).context("failed to configure travel providers")?;
    let settings = DialogSettings {
        flight_origin: flight_origin.trim().to_uppercase(),
        ..DialogSettings::default()
    };

    Ok(TravelAgent::new(
        Arc::new(MemorySessionStore::new()),
        providers,
        settings,
        AppMetrics::shared(),
    ))
}
