use std::io::{IsTerminal, Read, Write};
use std::process::ExitCode;

use clap::Parser;
use fixgen_core::{
    DocumentFetchOptions, FileSystemFetchOptions, GeneratorOptions, HttpFetchOptions,
    ParserOptions,
};

#[derive(Parser)]
#[command(
    name = "fixgen",
    version,
    about = "Generate random JSON data matching a JSON Schema"
)]
struct Cli {
    /// Read the JSON Schema from this file instead of stdin.
    #[arg(long)]
    file: Option<String>,
    /// Write generated output to this file instead of stdout.
    #[arg(long)]
    output: Option<String>,
    /// Pretty-print the JSON output.
    #[arg(long)]
    format: bool,
    /// Print compile warnings and errors to stderr.
    #[arg(long)]
    verbose: bool,
    /// Seed for deterministic output.
    #[arg(long)]
    seed: Option<u64>,

    /// Hosts allowed for HTTP(S) $ref resolution (comma separated).
    /// HTTP fetching stays disabled when empty.
    #[arg(long, value_name = "HOSTS")]
    allowed_hosts: Option<String>,
    /// Allow fetching $ref documents over plain http.
    #[arg(long)]
    allow_insecure: bool,
    /// Filesystem paths allowed for file:// $ref resolution (comma
    /// separated).
    #[arg(long, value_name = "PATHS")]
    allowed_paths: Option<String>,
    /// Allow file:// $ref documents outside the working directory.
    #[arg(long)]
    allow_outside_cwd: bool,
    /// Base URI for unqualified external references.
    #[arg(long)]
    relative_to: Option<String>,

    /// Skip the cyclic-reference check when generating recursive schemas.
    #[arg(long)]
    bypass_cyclic_reference_check: bool,
    /// Maximum depth of $ref resolutions in flight.
    #[arg(long, default_value_t = 10)]
    maximum_reference_depth: usize,
    /// Maximum attempts to satisfy 'if' conditions.
    #[arg(long, default_value_t = 100)]
    maximum_if_attempts: u32,
    /// Maximum attempts to satisfy 'oneOf' exclusively.
    #[arg(long, default_value_t = 100)]
    maximum_oneof_attempts: u32,
    /// Steps before generation falls back to minimal structure.
    #[arg(long, default_value_t = 1000)]
    maximum_generation_steps: u64,
    /// Steps before generation aborts and returns partial output.
    #[arg(long, default_value_t = 2000)]
    cutoff_generation_steps: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let schema = read_schema(cli)?;

    let mut parser_options = ParserOptions::default()
        .with_document_fetch(document_fetch_options(cli));
    if let Some(relative_to) = &cli.relative_to {
        parser_options = parser_options.with_relative_to(relative_to.clone());
    }

    let root = fixgen_core::parse_schema(&schema, &parser_options)
        .map_err(|err| err.to_string())?;

    if cli.verbose && root.metadata.errors.has_errors() {
        eprintln!("schema compiled with the following warnings:");
        for (location, error) in root.metadata.errors.collect() {
            eprintln!(" - [{location}] {error}");
        }
    }

    let mut generator_options = GeneratorOptions::default()
        .with_bypass_cyclic_reference_check(cli.bypass_cyclic_reference_check)
        .with_maximum_reference_depth(cli.maximum_reference_depth)
        .with_maximum_if_attempts(cli.maximum_if_attempts)
        .with_maximum_one_of_attempts(cli.maximum_oneof_attempts)
        .with_maximum_generation_steps(cli.maximum_generation_steps)
        .with_cutoff_generation_steps(cli.cutoff_generation_steps);
    if let Some(seed) = cli.seed {
        generator_options = generator_options.with_seed(seed);
    }

    let value = root.generate(&generator_options);
    let rendered = if cli.format {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .map_err(|err| format!("failed to serialize output: {err}"))?;

    match &cli.output {
        Some(path) => write_output(path, &rendered),
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}

fn read_schema(cli: &Cli) -> Result<Vec<u8>, String> {
    if let Some(path) = &cli.file {
        return std::fs::read(path).map_err(|err| format!("failed to read '{path}': {err}"));
    }

    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err("no schema specified (on stdin or through --file)".to_string());
    }
    let mut buffer = Vec::new();
    stdin
        .read_to_end(&mut buffer)
        .map_err(|err| format!("failed to read stdin: {err}"))?;
    Ok(buffer)
}

fn write_output(path: &str, rendered: &str) -> Result<(), String> {
    if std::path::Path::new(path).exists() {
        return Err(format!("file '{path}' already exists"));
    }
    let mut file =
        std::fs::File::create(path).map_err(|err| format!("failed to create '{path}': {err}"))?;
    file.write_all(rendered.as_bytes())
        .map_err(|err| format!("failed to write '{path}': {err}"))
}

fn document_fetch_options(cli: &Cli) -> DocumentFetchOptions {
    let allowed_hosts = split_list(cli.allowed_hosts.as_deref());
    let http_enabled = !allowed_hosts.is_empty() || cli.allow_insecure;
    let http = HttpFetchOptions::default()
        .with_enabled(http_enabled)
        .with_allowed_hosts(allowed_hosts)
        .with_allow_insecure(cli.allow_insecure);

    let allowed_paths = split_list(cli.allowed_paths.as_deref());
    let file_system_enabled = !allowed_paths.is_empty() || cli.allow_outside_cwd;
    let file_system = FileSystemFetchOptions::default()
        .with_enabled(file_system_enabled)
        .with_allowed_paths(allowed_paths)
        .with_allow_outside_cwd(cli.allow_outside_cwd);

    DocumentFetchOptions::default()
        .with_http(http)
        .with_file_system(file_system)
}

fn split_list(input: Option<&str>) -> Vec<String> {
    input
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
