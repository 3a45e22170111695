use clap::{Parser, Subcommand};
use imgpipe::api::Api;
use imgpipe::params::ParameterSet;
use imgpipe::{config, imaging, logging, output, process};
use std::path::PathBuf;

/// Parameters given on the command line.
#[derive(clap::Args, Clone)]
struct ParamArgs {
    /// Request parameter as key=value (repeatable), e.g. -p fm=webp -p q=80
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Request parameters as a query string, e.g. "fm=webp&q=80"
    #[arg(long, value_name = "QUERY")]
    query: Option<String>,
}

impl ParamArgs {
    /// Query string first, then `-p` pairs on top.
    fn to_params(&self) -> ParameterSet {
        let mut params = self
            .query
            .as_deref()
            .map(ParameterSet::from_query)
            .unwrap_or_default();
        for (key, value) in &self.params {
            params.insert(key.as_str(), value.as_str());
        }
        params
    }
}

fn parse_param(arg: &str) -> Result<(String, String), String> {
    ParameterSet::parse_pair(arg).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "imgpipe")]
#[command(about = "Parameter-driven image manipulation pipeline")]
#[command(long_about = "\
Parameter-driven image manipulation pipeline

Images are decoded, passed through a chain of manipulators configured in
imgpipe.toml, and re-encoded. Every manipulator sees the same parameters:

  w, h     Target width / height in pixels
  dpr      Device pixel ratio applied to w and h (0-8)
  fit      contain (default), max, stretch, crop
  fm       Output format: avif, gif, jpg, pjpg, png, webp, tiff
  q        Quality 0-100 (default 90)
  p        Comma-separated preset names from the config

Invalid values never fail a request; they fall back to defaults.

Run 'imgpipe gen-config' to generate a documented imgpipe.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one image through the pipeline
    Run {
        /// Source image
        input: PathBuf,
        /// Where to write the result
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Run every image under a directory through the pipeline
    Batch {
        input_dir: PathBuf,
        output_dir: PathBuf,
        #[command(flatten)]
        params: ParamArgs,
        /// Disable the output cache and re-encode every image
        #[arg(long)]
        no_cache: bool,
    },
    /// List supported output formats
    Formats,
    /// Print a stock imgpipe.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Formats => {
            for line in output::format_formats_table() {
                println!("{}", line);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Run {
            input,
            output: output_path,
            params,
        } => {
            let config = config::load_config(&cli.config)?;
            logging::init_from_config(&config.logging, cli.verbose, cli.json_logs);
            let api = build_api(&config)?;

            let params = config.resolve_params(&params.to_params());
            let source = std::fs::read(&input)?;
            let encoded = api.run(&source, &params)?;
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&output_path, &encoded.bytes)?;
            for line in output::format_run_output(&encoded, &output_path) {
                println!("{}", line);
            }
        }
        Command::Batch {
            input_dir,
            output_dir,
            params,
            no_cache,
        } => {
            let config = config::load_config(&cli.config)?;
            logging::init_from_config(&config.logging, cli.verbose, cli.json_logs);
            init_thread_pool(&config.processing);
            let api = build_api(&config)?;

            let params = config.resolve_params(&params.to_params());
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result =
                process::process_batch(&api, &input_dir, &output_dir, &params, !no_cache, Some(tx));
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            let result = result?;

            for line in output::format_batch_summary(&result.cache_stats, result.failures.len()) {
                println!("{}", line);
            }
            if !result.failures.is_empty() {
                return Err(format!("{} image(s) failed", result.failures.len()).into());
            }
        }
    }

    Ok(())
}

fn build_api(config: &config::AppConfig) -> Result<Api, Box<dyn std::error::Error>> {
    let backend = imaging::backend_for(config.backend, &config.magick.program);
    Ok(Api::from_names(backend, config.manipulators.as_slice(), &config.limits)?)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Never exceeds the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
