use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use recode::commands::{
    batch_command, install_script_command, serve_command, show_config_command, BatchArgs,
};
use recode::{init_tracing, load_config};

/// Decompile executables with Ghidra headless and relay the output to a
/// text-generation API.
#[derive(Parser, Debug)]
#[command(name = "recode", version, about = "Headless decompiler relay", long_about = None)]
struct Cli {
    /// Optional YAML config file. Environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Tracing filter, e.g. `info` or `recode_core=debug`.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (`POST /decompile`, `POST /translate`).
    Serve {
        /// Listen address. Defaults to `server.bind` (or RECODE_BIND).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Decompile one blob and upload the C output.
    ///
    /// Reads CONNECTION_STRING, BLOB_NAME and AZURE_CONTAINER_NAME unless
    /// overridden by flags. Exits non-zero on any failure.
    Batch {
        /// Blob to decompile (overrides BLOB_NAME).
        #[arg(long)]
        blob: Option<String>,

        /// Container holding the input binary.
        #[arg(long)]
        source_container: Option<String>,

        /// Container receiving `<name>.c` (overrides AZURE_CONTAINER_NAME).
        #[arg(long)]
        output_container: Option<String>,

        /// Create the output container if it does not exist.
        #[arg(long, default_value_t = false)]
        create_container: bool,
    },

    /// Write the Ghidra post-script used for decompilation.
    InstallScript {
        /// Target directory. Defaults to `ghidra.script_dir`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Print the effective configuration (secrets omitted).
    ShowConfig {
        /// Emit JSON instead of YAML.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { bind } => serve_command(&config, bind).await?,
        Command::Batch { blob, source_container, output_container, create_container } => {
            let args = BatchArgs { blob, source_container, output_container, create_container };
            batch_command(&config, args).await?;
        }
        Command::InstallScript { dir } => {
            install_script_command(&config, dir.as_deref())?;
        }
        Command::ShowConfig { json } => show_config_command(&config, json)?,
    }

    Ok(())
}
