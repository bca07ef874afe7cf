use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use indexmap::IndexMap;

use drun::engine::{self, EngineOptions};
use drun::runtime::{HttpRemoteFetcher, InMemorySecretsStore, ProcessShellRunner, ShellDetector, TtlIncludeCache};
use drun::services::Services;
use drun::Program;

#[derive(Parser)]
#[command(name = "drun")]
#[command(about = "Semantic task runner execution engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve dependencies and run a task
    Run {
        /// name of the task to run
        target: String,

        /// parameter in K=V form, may be repeated
        #[arg(long = "param", value_name = "K=V")]
        param: Vec<String>,

        /// resolve and print the execution plan without running anything
        #[arg(long = "dry-run")]
        dry_run: bool,

        /// project file to load
        #[arg(long = "file", value_name = "PATH", default_value = "drun.yaml")]
        file: String,

        /// emit diagnostic progress as JSON lines instead of plain text
        #[arg(long = "json")]
        json: bool,
    },
}

fn parse_params(raw: &[String]) -> Result<IndexMap<String, String>, String> {
    let mut params = IndexMap::new();
    for entry in raw {
        match entry.split_once('=') {
            Some((k, v)) => {
                params.insert(k.to_string(), v.to_string());
            }
            None => return Err(format!("--param expects K=V, got '{}'", entry)),
        }
    }
    Ok(params)
}

struct JsonLineWriter;

impl std::io::Write for JsonLineWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        let line = String::from_utf8_lossy(data);
        println!("{}", serde_json::json!({"message": line.trim_end()}));
        Ok(data.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let Command::Run { target, param, dry_run, file, json } = cli.command;

    let content = match std::fs::read_to_string(&file) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error: cannot read project file: {}: {}", file, e);
            std::process::exit(1);
        }
    };

    let program: Program = match serde_yaml::from_str(&content) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Error: cannot parse project file: {}: {}", file, e);
            std::process::exit(1);
        }
    };

    let params = match parse_params(&param) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let writer: Arc<Mutex<dyn std::io::Write + Send>> = if json {
        Arc::new(Mutex::new(JsonLineWriter))
    } else {
        Arc::new(Mutex::new(std::io::stdout()))
    };

    let services = Services {
        shell: Arc::new(ProcessShellRunner::default()),
        secrets: Arc::new(InMemorySecretsStore::default()),
        detector: Arc::new(ShellDetector::new(ProcessShellRunner::default())),
        fetcher: Arc::new(HttpRemoteFetcher::new(Default::default())),
        cache: Arc::new(TtlIncludeCache::new(true)),
        writer,
        verbose: false,
    };

    let options = EngineOptions { dry_run };

    let result = engine::execute(program, &target, params, &file, &services, options).await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
