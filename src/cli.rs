use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[command(name = "pipegraph")]
#[command(about = "Compile and run a graph-shaped pipe description")]
pub struct Cli {
    /// Pipe description (JSON with `modules` and `wires`).
    pub pipe: PathBuf,

    /// Pipe name; defaults to the file stem.
    #[arg(long)]
    pub name: Option<String>,

    /// Engine config file; defaults to the platform config directory.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run on the async runtime.
    #[arg(long = "async")]
    pub async_mode: bool,

    /// Never prompt; user inputs use their defaults.
    #[arg(long)]
    pub test: bool,

    /// Log each resolved step.
    #[arg(long)]
    pub verbose: bool,

    /// Print the module types the pipe depends on instead of running it.
    #[arg(long)]
    pub describe_dependencies: bool,

    /// Print the user inputs the pipe declares instead of running it.
    #[arg(long)]
    pub describe_input: bool,

    /// User input value, `NAME=VALUE`. Repeatable.
    #[arg(long = "input", value_parser = parse_input)]
    pub inputs: Vec<(String, String)>,

    /// Stop after this many records.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print the resolved plan instead of running.
    #[arg(long)]
    pub plan: bool,
}

impl Cli {
    pub fn pipe_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.pipe
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "pipe".to_string())
        })
    }
}

fn parse_input(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}
