//! CLI argument definitions using clap derive
//!
//! Defines all command-line arguments and subcommands.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Query NVIDIA GPUs through the CUDA driver and NVML
///
/// Reports normalized compute capabilities, management identity,
/// peer-to-peer topology and live status.
#[derive(Parser, Debug)]
#[command(name = "gpuprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "GPUPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Target GPU by index (0-based)
    #[arg(long, global = true, conflicts_with = "bus_id")]
    pub gpu: Option<u32>,

    /// Target GPU by PCI bus id
    #[arg(long, global = true)]
    pub bus_id: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all detected GPUs
    List,

    /// Show compute capability, identity and topology
    Info(InfoArgs),

    /// Show live status (power, temperature, memory, processes)
    Status,

    /// Show peer-to-peer link types between GPUs
    Topology,

    /// Show CUDA and driver versions
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the info command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Skip the per-device topology
    #[arg(long)]
    pub no_topology: bool,
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

/// Generate shell completions and print to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_list() {
        let args = Cli::try_parse_from(["gpuprobe", "list"]).unwrap();
        assert!(matches!(args.command, Commands::List));
    }

    #[test]
    fn test_cli_parse_verbose() {
        let args = Cli::try_parse_from(["gpuprobe", "-v", "status"]).unwrap();
        assert!(args.verbose);
        assert!(matches!(args.command, Commands::Status));
    }

    #[test]
    fn test_cli_parse_gpu_selection() {
        let args = Cli::try_parse_from(["gpuprobe", "--gpu", "1", "info"]).unwrap();
        assert_eq!(args.gpu, Some(1));

        let args =
            Cli::try_parse_from(["gpuprobe", "info", "--bus-id", "00000000:3B:00.0"]).unwrap();
        assert_eq!(args.bus_id.as_deref(), Some("00000000:3B:00.0"));
    }

    #[test]
    fn test_cli_selectors_conflict() {
        let result =
            Cli::try_parse_from(["gpuprobe", "--gpu", "0", "--bus-id", "0000:01:00.0", "list"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_info_flags() {
        let args = Cli::try_parse_from(["gpuprobe", "info", "--no-topology"]).unwrap();
        match args.command {
            Commands::Info(info) => assert!(info.no_topology),
            other => panic!("Expected Info command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_format() {
        let args = Cli::try_parse_from(["gpuprobe", "--format", "json", "topology"]).unwrap();
        assert!(matches!(args.format, OutputFormat::Json));
        assert!(matches!(args.command, Commands::Topology));
    }

    #[test]
    fn test_cli_parse_completions() {
        let args = Cli::try_parse_from(["gpuprobe", "completions", "bash"]).unwrap();
        assert!(matches!(
            args.command,
            Commands::Completions { shell: Shell::Bash }
        ));
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }
}
