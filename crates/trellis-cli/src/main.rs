//! Trellis CLI - Command-line interface
//!
//! Usage:
//!   trellis vertex get <id>
//!   trellis vertex create --data '{"name": "James"}'
//!   trellis edge create <out> <label> <in>
//!   trellis index lookup <name> <key> <value>
//!   trellis --backend rexster gremlin 'g.V.count()'

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value as JsonValue};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use trellis_core::config::{NEO4J_URI, REXSTER_URI, TITAN_URI};
use trellis_core::{
    Config, Element, ElementId, Graph, Index, IndexKind, PropertyMap, Response, Value,
};

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Inspect and mutate a graph database from the shell")]
#[command(version)]
struct Cli {
    /// Backend speaking at the root URI
    #[arg(long, value_enum, default_value_t = Backend::Neo4j, global = true)]
    backend: Backend,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root URI, overriding config and environment
    #[arg(long, global = true)]
    uri: Option<String>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Neo4j,
    Rexster,
    Titan,
}

impl Backend {
    fn default_uri(self) -> &'static str {
        match self {
            Self::Neo4j => NEO4J_URI,
            Self::Rexster => REXSTER_URI,
            Self::Titan => TITAN_URI,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Vertex operations
    Vertex {
        #[command(subcommand)]
        action: VertexAction,
    },
    /// Edge operations
    Edge {
        #[command(subcommand)]
        action: EdgeAction,
    },
    /// Index operations
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Run a Gremlin script
    Gremlin {
        script: String,
        /// Script parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
    },
}

#[derive(Subcommand)]
enum VertexAction {
    Get { id: String },
    Create {
        /// Properties as a JSON object
        #[arg(long)]
        data: Option<String>,
    },
    /// Replace a vertex's properties
    Update {
        id: String,
        #[arg(long)]
        data: String,
    },
    Delete { id: String },
}

#[derive(Subcommand)]
enum EdgeAction {
    Get { id: String },
    Create {
        out_v: String,
        label: String,
        in_v: String,
        #[arg(long)]
        data: Option<String>,
    },
    Delete { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Exact,
    Unique,
    Automatic,
}

impl From<Kind> for IndexKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Exact => IndexKind::Exact,
            Kind::Unique => IndexKind::Unique,
            Kind::Automatic => IndexKind::Automatic,
        }
    }
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct IndexTarget {
    /// Index edges instead of vertices
    #[arg(long)]
    edge: bool,
    #[arg(long, value_enum, default_value_t = Kind::Exact)]
    kind: Kind,
}

#[derive(Subcommand)]
enum IndexAction {
    Create {
        name: String,
        #[command(flatten)]
        target: IndexTarget,
    },
    Lookup {
        name: String,
        key: String,
        value: String,
        #[command(flatten)]
        target: IndexTarget,
    },
    Put {
        name: String,
        id: String,
        key: String,
        value: String,
        #[command(flatten)]
        target: IndexTarget,
    },
    Remove {
        name: String,
        id: String,
        key: String,
        value: String,
        #[command(flatten)]
        target: IndexTarget,
    },
    Count {
        name: String,
        key: String,
        value: String,
        #[command(flatten)]
        target: IndexTarget,
    },
}

/// Config file, then environment, then `--uri`
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?.with_env_override()?,
        None => {
            let mut config = Config::from_env()?;
            if std::env::var("TRELLIS_ROOT_URI").is_err() {
                config.root_uri = cli.backend.default_uri().to_string();
            }
            config
        }
    };
    if let Some(uri) = &cli.uri {
        config.root_uri = uri.clone();
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(verbose: u8, fallback: &str) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn connect(backend: Backend, config: Config) -> trellis_core::Result<Graph> {
    match backend {
        Backend::Neo4j => trellis_neo4j::connect(config),
        Backend::Rexster => trellis_rexster::connect(config),
        Backend::Titan => trellis_rexster::connect_titan(config),
    }
}

/// A JSON object argument
fn parse_object(raw: Option<&str>) -> anyhow::Result<Map<String, JsonValue>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<JsonValue>(raw).context("expected a JSON object")? {
        JsonValue::Object(map) => Ok(map),
        other => anyhow::bail!("expected a JSON object, got {other}"),
    }
}

/// Property values arrive as JSON; anything that is not JSON is a string
fn parse_value(graph: &Graph, raw: &str) -> Value {
    let json = serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()));
    graph.client().type_system().host().to_host(&json)
}

fn parse_data(graph: &Graph, raw: Option<&str>) -> anyhow::Result<PropertyMap> {
    let map = parse_object(raw)?;
    Ok(graph.client().type_system().host().to_host_map(&map))
}

fn element_json(element: &Element) -> anyhow::Result<JsonValue> {
    let core = element.core();
    let mut out = core
        .client()
        .type_system()
        .database()
        .to_db_map(&element.data())?;
    out.insert("_id".to_string(), core.id().to_json());
    out.insert("_type".to_string(), JsonValue::String(core.base().to_string()));
    if let Some(label) = core.label() {
        out.insert("_label".to_string(), JsonValue::String(label.to_string()));
    }
    if let Some(out_v) = core.out_v_id() {
        out.insert("_outV".to_string(), out_v.to_json());
    }
    if let Some(in_v) = core.in_v_id() {
        out.insert("_inV".to_string(), in_v.to_json());
    }
    Ok(JsonValue::Object(out))
}

fn print_json(value: &JsonValue) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_element(element: &Element) -> anyhow::Result<()> {
    print_json(&element_json(element)?)
}

fn open_index(graph: &Graph, name: &str, target: IndexTarget) -> trellis_core::Result<Index> {
    let proxy = if target.edge {
        graph.edge_indices(target.kind.into())
    } else {
        graph.vertex_indices(target.kind.into())
    };
    proxy.get(name)
}

fn run_vertex(graph: &Graph, action: VertexAction) -> anyhow::Result<()> {
    match action {
        VertexAction::Get { id } => print_element(&graph.vertices.get(&ElementId::parse(&id))?),
        VertexAction::Create { data } => {
            let data = parse_data(graph, data.as_deref())?;
            print_element(&graph.vertices.create(&data)?)
        }
        VertexAction::Update { id, data } => {
            let data = parse_data(graph, Some(&data))?;
            print_element(&graph.vertices.update(&ElementId::parse(&id), &data)?)
        }
        VertexAction::Delete { id } => {
            graph.vertices.delete(&ElementId::parse(&id))?;
            tracing::info!("Deleted vertex {}", id);
            Ok(())
        }
    }
}

fn run_edge(graph: &Graph, action: EdgeAction) -> anyhow::Result<()> {
    match action {
        EdgeAction::Get { id } => print_element(&graph.edges.get(&ElementId::parse(&id))?),
        EdgeAction::Create {
            out_v,
            label,
            in_v,
            data,
        } => {
            let data = parse_data(graph, data.as_deref())?;
            let edge = graph.edges.create(
                &ElementId::parse(&out_v),
                &label,
                &ElementId::parse(&in_v),
                &data,
            )?;
            print_element(&edge)
        }
        EdgeAction::Delete { id } => {
            graph.edges.delete(&ElementId::parse(&id))?;
            tracing::info!("Deleted edge {}", id);
            Ok(())
        }
    }
}

fn run_index(graph: &Graph, action: IndexAction) -> anyhow::Result<()> {
    match action {
        IndexAction::Create { name, target } => {
            let proxy = if target.edge {
                graph.edge_indices(target.kind.into())
            } else {
                graph.vertex_indices(target.kind.into())
            };
            let index = proxy.get_or_create(&name)?;
            print_json(&serde_json::json!({
                "name": index.name(),
                "class": index.base().as_str(),
                "type": index.kind().as_str(),
            }))
        }
        IndexAction::Lookup {
            name,
            key,
            value,
            target,
        } => {
            let index = open_index(graph, &name, target)?;
            let found = index
                .lookup((key, parse_value(graph, &value)))?
                .map(|element| element_json(&element?))
                .collect::<anyhow::Result<Vec<_>>>()?;
            print_json(&JsonValue::Array(found))
        }
        IndexAction::Put {
            name,
            id,
            key,
            value,
            target,
        } => {
            let index = open_index(graph, &name, target)?;
            let entry = (key, parse_value(graph, &value));
            let id = ElementId::parse(&id);
            if index.kind() == IndexKind::Unique {
                index.put_unique(&id, entry)?;
            } else {
                index.put(&id, entry)?;
            }
            Ok(())
        }
        IndexAction::Remove {
            name,
            id,
            key,
            value,
            target,
        } => {
            let index = open_index(graph, &name, target)?;
            index.remove(&ElementId::parse(&id), (key, parse_value(graph, &value)))?;
            Ok(())
        }
        IndexAction::Count {
            name,
            key,
            value,
            target,
        } => {
            let index = open_index(graph, &name, target)?;
            println!("{}", index.count((key, parse_value(graph, &value)))?);
            Ok(())
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(cli.verbose, &config.log_level);

    let graph = connect(cli.backend, config)
        .with_context(|| format!("failed to connect to {:?} backend", cli.backend))?;

    match cli.command {
        Commands::Vertex { action } => run_vertex(&graph, action),
        Commands::Edge { action } => run_edge(&graph, action),
        Commands::Index { action } => run_index(&graph, action),
        Commands::Gremlin { script, params } => {
            let params = parse_object(params.as_deref())?;
            let response = graph.gremlin(&script, &params)?;
            print_json(response.content().unwrap_or(&JsonValue::Null))
        }
    }
}
