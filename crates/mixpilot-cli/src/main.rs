//! mixpilot - natural-language automation copilot for an audio session

mod config;
mod demo_host;

use std::io::{BufRead, Write};
use std::time::Duration;

use clap::Parser;

use mixpilot_agent::{Copilot, CopilotConfig, CopilotEvent};
use mixpilot_ai::RequestConfig;

use demo_host::DemoHost;

/// How often the control thread drains the request channel
const POLL_INTERVAL: Duration = Duration::from_millis(30);

/// mixpilot - AI automation copilot (dry-run session)
#[derive(Parser, Debug)]
#[command(name = "mixpilot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run a single request and exit; otherwise read requests interactively
    prompt: Option<String>,

    /// Model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Step cap per request
    #[arg(long)]
    max_steps: Option<u32>,

    /// Disable streaming (buffered responses)
    #[arg(long)]
    no_stream: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("mixpilot=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "mixpilot=warn".into()),
            )
            .init();
    }

    if args.init_config {
        let path = config::Config::init()?;
        println!("Config file created at: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    let file_config = config::Config::load();

    let mut request = RequestConfig::default();
    if let Some(model) = args.model.or(file_config.model) {
        request.model = model;
    }
    request.stream = if args.no_stream {
        false
    } else {
        file_config.stream.unwrap_or(true)
    };

    let mut copilot_config = CopilotConfig {
        request,
        ..CopilotConfig::default()
    };
    if let Some(max_steps) = args.max_steps.or(file_config.max_steps) {
        copilot_config.max_steps = max_steps;
    }

    let mut copilot: Copilot<DemoHost> = Copilot::new(copilot_config);
    copilot.attach_host(DemoHost::new());

    match args.prompt {
        Some(prompt) => run_request(&mut copilot, &prompt),
        None => interactive(&mut copilot),
    }
}

fn run_request(copilot: &mut Copilot<DemoHost>, prompt: &str) -> anyhow::Result<()> {
    let events = copilot.begin(prompt)?;
    render(&events);
    // Undo interception and missing-key handling never start a workflow.
    if copilot.idle() {
        return Ok(());
    }
    loop {
        let events = copilot.tick();
        if render(&events) {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    Ok(())
}

fn interactive(copilot: &mut Copilot<DemoHost>) -> anyhow::Result<()> {
    println!("mixpilot (dry run). Type a request, 'undo' to revert, 'quit' to exit.");
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        if let Err(e) = run_request(copilot, line) {
            eprintln!("Error: {e}");
        }
    }
    Ok(())
}

/// Print events; returns true once a terminal event was seen
fn render(events: &[CopilotEvent]) -> bool {
    let mut finished = false;
    for event in events {
        match event {
            CopilotEvent::Status(status) => {
                eprintln!("[{status}]");
            }
            CopilotEvent::AssistantDelta(text) => {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            CopilotEvent::Assistant(text) => {
                println!("Copilot: {text}");
            }
            CopilotEvent::Note(note) => {
                println!();
                println!("{note}");
            }
            CopilotEvent::ScriptOutput(line) => {
                println!("> {line}");
            }
            CopilotEvent::UndoAvailable(available) => {
                tracing::debug!(available, "undo availability changed");
            }
            CopilotEvent::Finished { reason, .. } => {
                println!();
                println!("{reason}");
                finished = true;
            }
        }
    }
    finished
}
