// Version information constants
const VERSION: &str = env!("CARGO_PKG_VERSION");

use clap::{Parser, Subcommand};
use std::error::Error;
use std::io::{BufWriter, Write};

mod cluster;
mod embed;
mod flags;

mod color;
mod error;
mod graph;
mod matrix;
mod progress;
mod table;

/// Logger manager for detailed run logging
pub struct Logger {
    writer: BufWriter<std::fs::File>,
}

impl Logger {
    pub fn new(file: std::fs::File) -> Self {
        Self {
            writer: BufWriter::new(file),
        }
    }

    /// Record detailed log information
    pub fn log(&mut self, message: &str) -> std::io::Result<()> {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.writer, "[{}] {}", timestamp, message)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group crosschecked samples into a colored cluster graph
    Cluster(cluster::ClusterArgs),
    /// Embed the crosscheck LOD matrix into a 2-D relatedness plot
    Network(embed::NetworkArgs),
    /// Decode SAM flag bitmasks into their set bit names
    ExplainFlags(flags::ExplainFlagsArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Cluster(args) => {
            let log_file = if let Some(log_path) = &args.log {
                std::fs::File::create(log_path)?
            } else {
                std::fs::File::create("cluster.log")?
            };
            let mut logger = Logger::new(log_file);
            cluster::run(&args, &mut logger)
        }
        Commands::Network(args) => {
            let log_file = if let Some(log_path) = &args.log {
                std::fs::File::create(log_path)?
            } else {
                std::fs::File::create("network.log")?
            };
            let mut logger = Logger::new(log_file);
            embed::run(&args, &mut logger)
        }
        Commands::ExplainFlags(args) => flags::run(&args),
    }
}
