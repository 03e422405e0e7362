//! oxide-formstate CLI
//!
//! Loads a JSON form definition, fills in values and runs a submission or
//! a single field validation. The outcome is printed as JSON.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

use oxide_formstate::{
    FieldErrors, Form, FormDefinition, FormError, SubmitOutcome, ValidationError, ValueMap,
};

/// Validate form values against a JSON form definition.
#[derive(Parser)]
#[command(name = "oxide-formstate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Form definition file.
    #[arg(short, long, env = "FORMSTATE_DEFINITION")]
    definition: PathBuf,

    /// JSON object of field values.
    #[arg(long)]
    values: Option<PathBuf>,

    /// Field value as `name=value`. JSON values are parsed, anything else
    /// is taken as a string. Applied after `--values`.
    #[arg(short, long = "set", value_parser = parse_assignment)]
    set: Vec<(String, Value)>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every field and report the submission outcome.
    Submit,

    /// Validate a single field.
    Validate {
        /// Field name.
        #[arg(short, long)]
        field: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum Report {
    Submit {
        outcome: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        values: Option<ValueMap>,
        #[serde(skip_serializing_if = "Option::is_none")]
        errors: Option<FieldErrors>,
    },
    Validate {
        field: String,
        value: Value,
        is_valid: bool,
        errors: Vec<ValidationError>,
    },
}

impl Report {
    fn passed(&self) -> bool {
        match self {
            Self::Submit { outcome, .. } => *outcome == "finished",
            Self::Validate { is_valid, .. } => *is_valid,
        }
    }
}

fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    if name.is_empty() {
        return Err(format!("missing field name in `{raw}`"));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn load_definition(path: &Path) -> anyhow::Result<FormDefinition> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading form definition {}", path.display()))?;
    Ok(FormDefinition::from_json(&json)?)
}

fn load_values(path: &Path) -> anyhow::Result<ValueMap> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading values {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing values {}", path.display()))
}

fn apply_values(
    form: &Form,
    values: impl IntoIterator<Item = (String, Value)>,
) -> anyhow::Result<()> {
    for (name, value) in values {
        debug!(field = %name, %value, "setting value");
        if !form.controller().set_field_value(&name, value)? {
            return Err(FormError::UnknownField(name).into());
        }
    }
    Ok(())
}

async fn submit(form: &Form) -> anyhow::Result<Report> {
    let mut finished = None;
    let mut failed = None;
    let outcome = form
        .controller()
        .submit(
            |values| finished = Some(values.clone()),
            |errors| failed = Some(errors.clone()),
        )
        .await?;

    let outcome = match outcome {
        SubmitOutcome::Finished => "finished",
        SubmitOutcome::Failed => "failed",
        SubmitOutcome::Ignored => "ignored",
    };
    Ok(Report::Submit {
        outcome,
        values: finished,
        errors: failed,
    })
}

async fn validate(form: &Form, field: &str) -> anyhow::Result<Report> {
    let controller = form.controller();
    if controller.field(field)?.is_none() {
        return Err(FormError::UnknownField(field.to_string()).into());
    }
    controller.validate_field(field).await?;

    let record = controller
        .field(field)?
        .ok_or_else(|| FormError::UnknownField(field.to_string()))?;
    Ok(Report::Validate {
        field: field.to_string(),
        value: record.value,
        is_valid: record.is_valid,
        errors: record.errors,
    })
}

async fn run(cli: Cli) -> anyhow::Result<Report> {
    let definition = load_definition(&cli.definition)?;
    let (form, items) = definition.build()?;
    info!(
        form = definition.name.as_deref().unwrap_or("<unnamed>"),
        fields = items.len(),
        "loaded form definition"
    );

    if let Some(path) = &cli.values {
        apply_values(&form, load_values(path)?)?;
    }
    apply_values(&form, cli.set)?;

    match cli.command {
        Commands::Submit => submit(&form).await,
        Commands::Validate { field } => validate(&form, &field).await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let report = run(cli).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
