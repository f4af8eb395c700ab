//! gpuprobe - GPU query tool
//!
//! A command-line tool for inspecting NVIDIA GPUs through the CUDA driver
//! and NVML.

use clap::Parser;
use gpuprobe::bootstrap::bootstrap;
use gpuprobe::cli::args::{generate_completions, Cli, Commands};
use gpuprobe::commands::{run_info, run_list, run_status, run_topology, run_version, Target};
use gpuprobe::config::{Config, ConfigBuilder};
use gpuprobe::error::AppError;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    if let Err(e) = run(&cli) {
        log::error!("{}", e);
        print_error(&e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<Config, AppError> {
    let config = ConfigBuilder::new()
        .with_file(cli.config.as_deref())?
        .with_verbose(cli.verbose.then_some(true))
        .with_gpu_index(cli.gpu)
        .with_bus_id(cli.bus_id.clone())
        .build()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<(), AppError> {
    if let Commands::Completions { shell } = &cli.command {
        generate_completions(*shell);
        return Ok(());
    }

    let config = load_config(cli)?;
    if config.general.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    let inspector = bootstrap(&config, log::logger());
    let target = Target::from_config(&config.gpu);

    match &cli.command {
        Commands::List => run_list(&inspector, cli.format),

        Commands::Info(args) => run_info(&inspector, args, cli.format, &target),

        Commands::Status => run_status(&inspector, cli.format, &target),

        Commands::Topology => run_topology(&inspector, cli.format),

        Commands::Version => run_version(&inspector, cli.format),

        Commands::Completions { .. } => Ok(()),
    }
}

fn print_error(err: &AppError) {
    eprintln!("Error: {}", err);

    match err {
        AppError::ComputeUnavailable => {
            eprintln!();
            eprintln!("Hint: libcuda.so could not be loaded.");
            eprintln!("      Install the NVIDIA driver or set library.cuda in the config file.");
        }
        AppError::ManagementUnavailable => {
            eprintln!();
            eprintln!("Hint: libnvidia-ml.so could not be loaded.");
            eprintln!("      Make sure the NVIDIA driver is installed.");
        }
        AppError::DeviceNotFound(_) => {
            eprintln!();
            eprintln!("Hint: Run 'gpuprobe list' to see the available GPUs.");
        }
        _ => {}
    }
}
