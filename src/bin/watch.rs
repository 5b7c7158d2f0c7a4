//! swapdesk-watch - terminal client for one item conversation
//!
//! Polls the server on a fixed interval, prints the thread and the controls
//! available to the current user, and reads actions or chat lines from stdin.

use clap::Parser;
use std::time::Duration;
use swapdesk::config::{clamp_poll_interval, WatchConfig};
use swapdesk::poller::render::{command_for, parse_command};
use swapdesk::poller::{HttpExchangeApi, Poller, Session, View};
use swapdesk::state_machine::Action;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "swapdesk-watch")]
#[command(about = "Watch and negotiate one item exchange from the terminal")]
struct Args {
    /// Item under negotiation
    item_id: String,
    /// You
    user_id: String,
    /// The other participant
    other_user_id: String,
    /// Server base URL [env: SWAPDESK_URL]
    #[arg(long)]
    url: Option<String>,
    /// Poll interval in milliseconds [env: SWAPDESK_POLL_INTERVAL_MS]
    #[arg(long)]
    interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swapdesk=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut config = WatchConfig::from_env();
    if let Some(url) = args.url {
        config.server_url = url;
    }
    if let Some(ms) = args.interval_ms {
        config.poll_interval = clamp_poll_interval(Duration::from_millis(ms));
    }

    let api = HttpExchangeApi::new(&config.server_url, config.request_timeout)?;
    let session = Session::new(args.item_id, args.user_id, args.other_user_id);
    let mut poller = Poller::new(api, session);

    println!(
        "Watching item {} as {} with {}. Type a message, an action ({}), or 'quit'.",
        poller.session().item_id,
        poller.session().user_id,
        poller.session().other_user_id,
        Action::ALL
            .iter()
            .map(|a| command_for(*a))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut shown = String::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match poller.poll().await {
                    Ok(view) => show(&view, &mut shown),
                    Err(e) => tracing::warn!(error = %e, "Poll failed"),
                }
            }
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input == "quit" {
                    break;
                }

                if let Some(action) = parse_command(input) {
                    match poller.perform(action).await {
                        Ok(status) => println!("-> {status}"),
                        Err(e) if e.is_unknown_outcome() => {
                            println!("-> no response; the next poll will show the outcome");
                        }
                        Err(e) => println!("-> {e}"),
                    }
                } else if let Err(e) = poller.say(input).await {
                    println!("-> message not sent: {e}");
                }
                show(&poller.view(), &mut shown);
            }
        }
    }

    Ok(())
}

/// Print the view when it differs from what is already on screen
fn show(view: &View, shown: &mut String) {
    let rendered = view.render();
    if rendered != *shown {
        println!("\n{rendered}");
        *shown = rendered;
    }
}
