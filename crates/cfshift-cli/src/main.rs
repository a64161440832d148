mod commands;

use cfshift_core::Config;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_MANIFEST_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "cfshift",
    version,
    about = "Normalize Cloud Foundry manifests into canonical application definitions"
)]
struct Cli {
    /// Path to a config file (default: ~/.config/cfshift/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Normalize a manifest and print the canonical applications as JSON.
    Normalize {
        /// Path to manifest YAML or JSON file.
        #[arg(default_value = "manifest.yml")]
        manifest: PathBuf,
        /// Write the canonical JSON to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Domain appended to routes synthesized from the application name.
        #[arg(long)]
        domain: Option<String>,
        /// Number of parallel normalization workers.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Validate a manifest and report every failing application.
    Check {
        /// Path to manifest YAML or JSON file.
        #[arg(default_value = "manifest.yml")]
        manifest: PathBuf,
        /// Stop at the first failing application.
        #[arg(long, default_value_t = false)]
        fail_fast: bool,
    },
    /// Summarize the normalized applications of a manifest.
    Inspect {
        /// Path to manifest YAML or JSON file.
        #[arg(default_value = "manifest.yml")]
        manifest: PathBuf,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CFSHIFT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let json_output = cli.json;
    let needs_config = matches!(
        cli.command,
        Commands::Normalize { .. } | Commands::Check { .. } | Commands::Inspect { .. }
    );
    let config = if needs_config {
        match Config::load_or_default(cli.config.as_deref()) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Normalize {
            manifest,
            output,
            domain,
            workers,
        } => {
            let mut config = config;
            if let Some(d) = domain.as_deref() {
                config = config.with_domain(d);
            }
            if let Some(w) = workers {
                config.workers = w.max(1);
            }
            commands::normalize::run(&manifest, output.as_deref(), &config, json_output)
        }
        Commands::Check {
            manifest,
            fail_fast,
        } => {
            let mut config = config;
            config.fail_fast |= fail_fast;
            commands::check::run(&manifest, &config, json_output)
        }
        Commands::Inspect { manifest } => commands::inspect::run(&manifest, &config, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("manifest error:")
                || msg.starts_with("failed to parse manifest")
                || msg.starts_with("failed to read manifest")
            {
                EXIT_MANIFEST_ERROR
            } else if msg.starts_with("config error:") {
                EXIT_CONFIG_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
