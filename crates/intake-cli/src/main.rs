//! `intake` - check schemas, prefill values and run offline submissions
//!
//! JSON results go to stdout; logs go to stderr.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use intake_form::render::step_index;
use intake_form::{FormConfig, FormEngine, StaticOptionsResolver, SubmissionSink, SubmitOutcome};
use intake_schema::{prefill_values, FieldValues, IntakeSchema, SelectOption};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaFormat {
    Json,
    Yaml,
}

impl SchemaFormat {
    fn infer(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }

    fn parse(tag: &str) -> Result<Self> {
        match tag {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => bail!("unknown schema format: {other}"),
        }
    }
}

/// Sink that prints the payload as pretty JSON on stdout
#[derive(Debug, Default)]
struct StdoutSink;

#[async_trait]
impl SubmissionSink for StdoutSink {
    type Error = std::io::Error;

    async fn submit(&self, payload: Value) -> Result<(), Self::Error> {
        let mut out = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, &payload)?;
        writeln!(out)
    }
}

fn cli() -> Command {
    let schema_arg = Arg::new("schema")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Intake schema file (JSON or YAML)");

    Command::new("intake")
        .version(intake_form::VERSION)
        .about("Schema-driven intake forms")
        .subcommand_required(true)
        .arg(
            Arg::new("format")
                .long("format")
                .global(true)
                .value_parser(["json", "yaml"])
                .help("Schema file format (default: from extension)"),
        )
        .subcommand(
            Command::new("check")
                .about("Validate a schema and print its step index")
                .arg(schema_arg.clone()),
        )
        .subcommand(
            Command::new("prefill")
                .about("Print the initial field values read from a saved profile")
                .arg(schema_arg.clone())
                .arg(
                    Arg::new("profile")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Nested profile JSON"),
                ),
        )
        .subcommand(
            Command::new("submit")
                .about("Validate values and print the nested payload")
                .arg(schema_arg)
                .arg(
                    Arg::new("values")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Flat field-id to value JSON"),
                )
                .arg(
                    Arg::new("from-profile")
                        .long("from-profile")
                        .action(ArgAction::SetTrue)
                        .help("Treat the values file as a nested profile"),
                )
                .arg(
                    Arg::new("options")
                        .long("options")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON map of options ref to [{value, label}]"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Form configuration TOML"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("check", args)) => check(args),
        Some(("prefill", args)) => prefill(args),
        Some(("submit", args)) => submit(args).await,
        _ => unreachable!("subcommand_required"),
    }
}

fn check(args: &ArgMatches) -> Result<()> {
    let schema = load_schema(args)?;

    println!("{} ({} fields)", schema.label, schema.field_count());
    for (entry, step) in step_index(&schema).iter().zip(&schema.steps) {
        println!("{}. {} [{}] ({} fields)", entry.number, entry.label, entry.id, step.fields.len());
    }
    Ok(())
}

fn prefill(args: &ArgMatches) -> Result<()> {
    let schema = load_schema(args)?;
    let profile: Value = read_json(path_arg(args, "profile")?)?;

    let values = prefill_values(&schema, &profile);
    tracing::info!("Prefilled {} of {} fields", values.len(), schema.field_count());
    println!("{}", serde_json::to_string_pretty(&values)?);
    Ok(())
}

async fn submit(args: &ArgMatches) -> Result<()> {
    let schema = load_schema(args)?;

    let initial: FieldValues = if args.get_flag("from-profile") {
        let profile: Value = read_json(path_arg(args, "values")?)?;
        prefill_values(&schema, &profile)
    } else {
        read_json(path_arg(args, "values")?)?
    };

    let resolver = match args.get_one::<PathBuf>("options") {
        Some(path) => {
            let table: HashMap<String, Vec<SelectOption>> = read_json(path)?;
            StaticOptionsResolver::from(table)
        }
        None => StaticOptionsResolver::new(),
    };

    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            FormConfig::from_toml_str(&text)?
        }
        None => FormConfig::default(),
    };

    let engine = FormEngine::with_config(schema, initial, resolver, StdoutSink, config)?;

    match engine.submit().await? {
        SubmitOutcome::Submitted(_) => Ok(()),
        SubmitOutcome::Invalid(errors) => {
            println!("{}", serde_json::to_string_pretty(&errors)?);
            std::process::exit(1);
        }
    }
}

fn path_arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a PathBuf> {
    args.get_one::<PathBuf>(name)
        .with_context(|| format!("missing argument: {name}"))
}

fn load_schema(args: &ArgMatches) -> Result<IntakeSchema> {
    let path = path_arg(args, "schema")?;
    let format = args
        .get_one::<String>("format")
        .map(|tag| SchemaFormat::parse(tag))
        .transpose()?;
    read_schema(path, format)
}

fn read_schema(path: &Path, format: Option<SchemaFormat>) -> Result<IntakeSchema> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let schema = match format.unwrap_or_else(|| SchemaFormat::infer(path)) {
        SchemaFormat::Json => IntakeSchema::from_json(&text),
        SchemaFormat::Yaml => IntakeSchema::from_yaml(&text),
    }
    .with_context(|| format!("loading schema {}", path.display()))?;

    tracing::info!(
        "Loaded schema {} ({} steps, {} fields)",
        schema.template_id,
        schema.steps.len(),
        schema.field_count()
    );
    Ok(schema)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
