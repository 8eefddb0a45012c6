use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gosl::{Config, GoslError};

/// gosl: translates annotated Go code into WGSL compute shaders
#[derive(Parser, Debug)]
#[command(name = "gosl", version, about)]
struct Cli {
    /// Package directory to translate
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Output directory for shader code, relative to the package
    #[arg(long, default_value = "shaders")]
    out: PathBuf,

    /// Comma-separated list of function names to exclude
    #[arg(long, default_value = "Update,Defaults")]
    exclude: String,

    /// Keep the intermediate Go files in <out>/imports
    #[arg(long)]
    keep: bool,

    /// Print debugging output
    #[arg(long)]
    debug: bool,

    /// WGSL validator to run on each kernel; empty to skip
    #[arg(long, default_value = "naga")]
    validator: String,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            output: cli.out,
            exclude: cli.exclude,
            keep: cli.keep,
            debug: cli.debug,
            validator: cli.validator,
        }
    }
}

const LONG_FLAGS: &[&str] = &["out", "exclude", "keep", "debug", "validator"];

/// Accepts Go flag style `-out dir` and `-keep` alongside `--out`.
fn normalize_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    args.into_iter()
        .map(|arg| {
            let Some(rest) = arg.strip_prefix('-') else {
                return arg;
            };
            let name = rest.split('=').next().unwrap_or(rest);
            if !rest.starts_with('-') && LONG_FLAGS.contains(&name) {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_args(std::env::args()));

    let level = if cli.debug { "gosl=debug" } else { "gosl=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let dir = cli.dir.clone();
    match run(cli.into(), dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config, dir: PathBuf) -> Result<(), GoslError> {
    let summary = gosl::run(config, &dir)?;
    if !summary.diagnostics.is_empty() {
        tracing::warn!(
            "[GOSL] {} translation problems; see errors above",
            summary.diagnostics.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        normalize_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn single_dash_long_flags() {
        assert_eq!(
            args(&["gosl", "-out", "gpu", "-keep", "--debug", "-exclude=A,B", "."]),
            ["gosl", "--out", "gpu", "--keep", "--debug", "--exclude=A,B", "."]
        );
    }

    #[test]
    fn cli_defaults_match_config() {
        let cli = Cli::parse_from(["gosl"]);
        assert_eq!(cli.dir, PathBuf::from("."));
        let config: Config = cli.into();
        let default = Config::default();
        assert_eq!(config.output, default.output);
        assert_eq!(config.exclude, default.exclude);
        assert_eq!(config.validator, default.validator);
        assert!(!config.keep);
    }
}
