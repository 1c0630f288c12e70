use anyhow::Result;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tabula_qa::config::{load_weights, EngineConfig};
use tabula_qa::dataset::load_csv;
use tabula_qa::{AssistantResponse, QueryAssistant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabula-qa")]
#[command(about = "Ask questions about a CSV table in plain Portuguese")]
struct Args {
    /// CSV file with a header row
    file: PathBuf,

    /// Question to answer; without one, questions are read from stdin
    question: Option<String>,

    /// JSON file overriding the column scoring weights
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Print the reasoning steps behind each answer
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(path) = &args.weights {
        config.weights = load_weights(path)?;
    }

    let dataset = load_csv(&args.file)?;
    info!(
        "Loaded {} ({} rows, columns: {:?})",
        args.file.display(),
        dataset.height(),
        dataset.columns()
    );

    let assistant = QueryAssistant::from_config(&config);

    if let Some(question) = &args.question {
        print_response(&assistant.respond(&dataset, question), args.trace);
        return Ok(());
    }

    let stdin = io::stdin();
    let mut answered = 0usize;
    prompt()?;
    for line in stdin.lock().lines() {
        let question = line?;
        let question = question.trim();
        if question.is_empty() {
            prompt()?;
            continue;
        }
        if question == "sair" || question == "exit" {
            break;
        }

        let response = assistant.respond(&dataset, question);
        print_response(&response, args.trace);
        answered += 1;
        prompt()?;
    }

    info!("Answered {} questions", answered);
    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

fn print_response(response: &AssistantResponse, trace: bool) {
    if trace {
        for step in &response.reasoning_steps {
            println!("  - {}", step);
        }
    }
    println!("{}", response.answer);
}
