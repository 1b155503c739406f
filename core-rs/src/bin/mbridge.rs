//! mbridge - browse a model snapshot through the bridge
//!
//! Loads a YAML model snapshot into an in-memory kernel, serves it through
//! the configured domains and runs a single command. Results are printed to
//! stdout as JSON; logs go to stderr.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use model_bridge::{
    BridgeConfig, ExternalName, InMemoryKernel, KernelHandle, ManagementBridge, ModelSnapshot, OpenValue,
};
use serde_json::{json, Value as JsonValue};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(name = "mbridge")]
#[command(version)]
#[command(about = "Browse a management model through the introspection bridge", long_about = None)]
struct Cli {
    /// Model snapshot (YAML)
    #[arg(long, short = 's')]
    snapshot: PathBuf,

    /// Bridge configuration (YAML); defaults apply when omitted
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List entity names, optionally filtered by a name pattern
    Query {
        /// Pattern such as `mgmt:subsystem=*,*`
        pattern: Option<String>,
    },
    /// Show the descriptor of an entity
    Info {
        name: String,
    },
    /// Read one or more attributes
    Get {
        name: String,
        #[arg(required = true)]
        attributes: Vec<String>,
    },
    /// Write an attribute; the value is JSON
    Set {
        name: String,
        attribute: String,
        value: String,
    },
    /// Invoke an operation; each parameter is JSON
    Invoke {
        name: String,
        operation: String,
        params: Vec<String>,
    },
    /// Count addressable entities across all domains
    Count,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let snapshot = ModelSnapshot::load(&cli.snapshot)
        .with_context(|| format!("Failed to load snapshot {}", cli.snapshot.display()))?;
    let config = match &cli.config {
        Some(path) => BridgeConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    let kernel = Arc::new(InMemoryKernel::from_snapshot(snapshot)?);
    let bridge = ManagementBridge::new(&config, KernelHandle::from_shared(kernel))?;

    let output = run(&bridge, cli.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    bridge.close();
    Ok(())
}

fn run(bridge: &ManagementBridge, command: Commands) -> Result<JsonValue> {
    match command {
        Commands::Query { pattern } => {
            let pattern = pattern.as_deref().map(ExternalName::parse).transpose()?;
            let names: Vec<String> = bridge
                .query_names(pattern.as_ref())
                .iter()
                .map(ToString::to_string)
                .collect();
            Ok(json!(names))
        }

        Commands::Info { name } => {
            let name = ExternalName::parse(&name)?;
            Ok(bridge.describe(&name)?.to_json())
        }

        Commands::Get { name, attributes } => {
            let name = ExternalName::parse(&name)?;
            let attributes: Vec<&str> = attributes.iter().map(String::as_str).collect();
            let values = bridge.get_attributes(&name, &attributes)?;
            let mut out = serde_json::Map::new();
            for (attribute, value) in values {
                out.insert(attribute, value.to_json());
            }
            Ok(JsonValue::Object(out))
        }

        Commands::Set { name, attribute, value } => {
            let name = ExternalName::parse(&name)?;
            let descriptor = bridge.describe(&name)?;
            let info = descriptor
                .attribute(&attribute)
                .or_else(|| {
                    descriptor
                        .attributes
                        .iter()
                        .find(|a| model_bridge::naming::camel_to_kebab(&a.name) == attribute)
                })
                .ok_or_else(|| anyhow!("Unknown attribute {} on {}", attribute, name))?;
            let json: JsonValue = serde_json::from_str(&value).context("Value must be JSON")?;
            let value = OpenValue::from_json(&info.open_type, &json)?;
            bridge.set_attribute(&name, &attribute, &value)?;
            Ok(json!({ "written": attribute }))
        }

        Commands::Invoke { name, operation, params } => {
            let name = ExternalName::parse(&name)?;
            let descriptor = bridge.describe(&name)?;
            let info = descriptor
                .operation(&operation)
                .ok_or_else(|| anyhow!("Unknown operation {} on {}", operation, name))?;
            if info.parameters.len() != params.len() {
                bail!(
                    "{} takes {} parameter(s), got {}",
                    operation,
                    info.parameters.len(),
                    params.len()
                );
            }
            let values = info
                .parameters
                .iter()
                .zip(&params)
                .map(|(parameter, text)| {
                    let json: JsonValue = serde_json::from_str(text)
                        .with_context(|| format!("Parameter {} must be JSON", parameter.name))?;
                    Ok(OpenValue::from_json(&parameter.open_type, &json)?)
                })
                .collect::<Result<Vec<OpenValue>>>()?;
            let reply = bridge.invoke(&name, &operation, &values)?;
            Ok(reply.map(|r| r.to_json()).unwrap_or(JsonValue::Null))
        }

        Commands::Count => Ok(json!(bridge.resource_count())),
    }
}
