//! crates/advice_client/src/bin/advice.rs
//!
//! Prints a user's sleep advice to stdout as it streams in. Ctrl-C cancels
//! the request and closes the connection.

use advice_client::{AdviceConsumer, AdviceView, ConsumerConfig, Phase};
use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "advice", about = "Stream AI sleep advice for a user")]
struct Args {
    /// The user whose sleep records are analysed.
    #[arg(long)]
    user_id: i64,

    /// Base URL of the API, including the `/api` prefix.
    #[arg(long, env = "ADVICE_API_URL", default_value = "http://localhost:8000/api")]
    base_url: String,

    /// Seconds to wait for the advice to complete.
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut consumer = AdviceConsumer::new(ConsumerConfig {
        base_url: args.base_url,
        timeout: Duration::from_secs(args.timeout_secs),
    });
    let mut updates = consumer.subscribe();
    consumer.request_advice(args.user_id);

    let mut printed = String::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                consumer.cancel();
                info!("Advice request cancelled.");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                render(&view, &mut printed);
                if view.phase.is_terminal() {
                    break;
                }
            }
        }
    }
    println!();

    let view = consumer.view();
    match view.phase {
        Phase::Completed | Phase::Cancelled => ExitCode::SUCCESS,
        _ => {
            warn!("Advice failed: {}", view.error.as_deref().unwrap_or("unknown error"));
            ExitCode::FAILURE
        }
    }
}

/// Prints what is new since the last update, or the whole text if it was rewritten.
fn render(view: &AdviceView, printed: &mut String) {
    if let Some(status) = &view.status {
        if printed.is_empty() && view.text.is_empty() {
            eprintln!("{}", status);
        }
    }

    let mut stdout = std::io::stdout().lock();
    match view.text.strip_prefix(printed.as_str()) {
        Some(new) => {
            let _ = write!(stdout, "{}", new);
        }
        None => {
            let _ = write!(stdout, "\n{}", view.text);
        }
    }
    let _ = stdout.flush();
    printed.clone_from(&view.text);
}
