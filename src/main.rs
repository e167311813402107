// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

//!
//! cargo-hotpath
//! This is the entry point for our cargo extension, and what is ultimately run
//! when you type `cargo hotpath` on the command line. To run, it must be present in
//! the user's path.
//!
//!  # Where the program comes from
//!
//!   We don't parse source ourselves. A front end resolves the program being checked
//!   into a symbol graph - types, members, override and interface edges, and the
//!   syntax of every member body - and writes it out as JSON or RON. We are pointed
//!   at that file with `--graph`.
//!
//!  # What happens next
//!
//!   1. Configuration is loaded: `--config` if given, otherwise `hotpath.ron` at the
//!      cargo workspace root, otherwise the defaults.
//!   2. The graph is loaded and validated.
//!   3. An analysis session locates the project's `.hotpath/allowlist.txt` from the
//!      graph's source files and loads it, exactly once.
//!   4. Every member body whose restriction verdict is `Restricted` is walked, and
//!      each call and property access in it is classified.
//!   5. Diagnostics are printed, and we exit non-zero if any of them is an error.
//!

#![warn(rust_2018_idioms, unused_lifetimes)]

mod render;

use ansi_term::Colour::{Blue, Green, Red, Yellow};
use ansi_term::Style;
use anyhow::{Context, Result, bail};
use hotpath_common::cli::{HotpathArgs, HotpathCommand};
use hotpath_common::workspace::{CONFIG_FILE_NAME, find_workspace_config};
use hotpath_lint_config::{AnalyzerConfig, ConfigBuilder};
use hotpath_lint_impl::{AnalysisSession, ProgramGraph};
use std::env;
use std::path::Path;
use std::process::exit;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `HOTPATH_LOG=debug`
const LOG_ENV: &str = "HOTPATH_LOG";

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn show_help() {
    println!("{}", help_message());
}

fn show_version() {
    println!(
        "{} {}",
        Style::new().bold().paint("cargo-hotpath version"),
        Green.paint(env!("CARGO_PKG_VERSION"))
    );
}

pub fn main() {
    // Handle help and version flags
    if env::args().any(|a| a == "--help" || a == "-h") {
        show_help();
        return;
    }

    if env::args().any(|a| a == "--version" || a == "-V") {
        show_version();
        return;
    }

    init_logging();

    let args = HotpathArgs::parse(env::args());
    for arg in &args.unrecognized {
        eprintln!("{} ignoring unrecognized argument '{}'", Yellow.bold().paint("warning:"), arg);
    }
    debug!(args = %args.to_env_str(), "starting");

    match process(&args) {
        Ok(code) => exit(code),
        Err(e) => {
            eprintln!("{} {:#}", Red.bold().paint("error:"), e);
            exit(2);
        }
    }
}

/// Runs the requested command, returning the process exit code
fn process(args: &HotpathArgs) -> Result<i32> {
    match args.command {
        HotpathCommand::GenerateConfig => {
            generate_config(Path::new(CONFIG_FILE_NAME))?;
            Ok(0)
        }
        HotpathCommand::PrintRestricted => {
            let config = load_config(args)?;
            let graph = load_graph(args)?;
            let session = AnalysisSession::new(&graph, &config);
            print!("{}", render::render_restricted(&session.restricted_members()));
            Ok(0)
        }
        HotpathCommand::Check => {
            let config = load_config(args)?;
            let graph = load_graph(args)?;
            let session = AnalysisSession::new(&graph, &config);
            session.load_allowlist();

            let report = session.run();
            print!("{}", render::render_report(&report));
            Ok(if report.has_errors() { 1 } else { 0 })
        }
    }
}

fn generate_config(path: &Path) -> Result<()> {
    if path.exists() {
        println!("{} {} already exists.", Red.bold().paint("Error:"), path.display());
        println!("Remove it if you want to regenerate the configuration.");
        bail!("refusing to overwrite {}", path.display());
    }
    ConfigBuilder::new().write_new_file(path)?;
    println!("Created {}", Green.paint(path.display().to_string()));
    Ok(())
}

/// `--config`, then `hotpath.ron` at the workspace root, then the defaults.
/// `--allow` entries are added on top of whichever was picked.
fn load_config(args: &HotpathArgs) -> Result<AnalyzerConfig> {
    let path = match &args.config_path {
        Some(path) => Some(Path::new(path).to_path_buf()),
        None => find_workspace_config(),
    };

    let mut builder = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            ConfigBuilder::read_from_file(&path)
                .with_context(|| format!("Failed to read configuration from {}", path.display()))?
        }
        None => ConfigBuilder::new(),
    };

    for signature in &args.allow {
        builder = builder.allow(signature.clone());
    }
    Ok(builder.build())
}

fn load_graph(args: &HotpathArgs) -> Result<ProgramGraph> {
    let Some(path) = &args.graph_path else {
        bail!("no symbol graph given; pass one with --graph <FILE>");
    };
    ProgramGraph::load(path)
}

#[must_use]
pub fn help_message() -> String {
    format!("
{title}: Keeps heap allocation out of your hot paths.

{usage_label}:
    cargo hotpath [COMMAND] --graph <FILE> [OPTIONS]

{commands_label}:
    {check}             Check restricted members for allocations (default)
    {print_restricted}  Print every member that must stay allocation-free
    {generate_config}   Generates an initial hotpath.ron for your project.

{options_label}:
    --graph <FILE>         Symbol graph written by the front end (.json or .ron)
    --config <FILE>        Configuration to use instead of ./hotpath.ron
    --allow <SIGNATURE>    Treat a member signature as allocation-free (repeatable)
    -h, --help             Print this message
    -V, --version          Print version info and exit

{note} in .hotpath/allowlist.txt, one signature per line, e.g.:
    System.Nullable<T>.Value
",
        title = Style::new().bold().paint("cargo-hotpath"),
        usage_label = Blue.bold().paint("Usage"),
        commands_label = Blue.bold().paint("Commands"),
        check = Green.paint("check"),
        print_restricted = Green.paint("print-restricted"),
        generate_config = Green.paint("generate-config"),
        options_label = Blue.bold().paint("Options"),
        note = Yellow.paint("Pre-approved signatures live"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotpath_lint_config::Severity;
    use std::fs;
    use tempfile::TempDir;

    fn args(config_path: Option<&Path>) -> HotpathArgs {
        HotpathArgs {
            config_path: config_path.map(|p| p.display().to_string()),
            ..HotpathArgs::default()
        }
    }

    #[test]
    fn test_generate_config_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        generate_config(&path).unwrap();
        let written = ConfigBuilder::read_from_file(&path).unwrap().build();
        assert_eq!(written, AnalyzerConfig::default());

        assert!(generate_config(&path).is_err());
    }

    #[test]
    fn test_load_config_from_explicit_path_with_extra_allows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.ron");
        ConfigBuilder::new()
            .allow("string.Length")
            .with_severity("HAA0702", Severity::Warn)
            .write_to_file(&path)
            .unwrap();

        let mut args = args(Some(&path));
        args.allow.push("System.Array.Length".into());
        let config = load_config(&args).unwrap();

        assert_eq!(config.allowlist, vec!["string.Length", "System.Array.Length"]);
        assert_eq!(config.severity_for("HAA0702"), Some(Severity::Warn));
    }

    #[test]
    fn test_load_config_reports_bad_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.ron");
        fs::write(&path, "(parallel: maybe)").unwrap();

        let err = load_config(&args(Some(&path))).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read configuration"));
    }

    #[test]
    fn test_check_requires_a_graph() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hotpath.ron");
        ConfigBuilder::new().write_to_file(&path).unwrap();

        let err = process(&args(Some(&path))).unwrap_err();
        assert!(err.to_string().contains("--graph"));
    }

    #[test]
    fn test_help_mentions_every_command() {
        let help = help_message();
        assert!(help.contains("check"));
        assert!(help.contains("print-restricted"));
        assert!(help.contains("generate-config"));
    }
}
