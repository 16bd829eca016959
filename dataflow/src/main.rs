use clap::Parser;
use tracing_subscriber::EnvFilter;

use tfdataflow::error::Error;
use tfdataflow::graph::{GraphOptions, MergePolicy};
use tfdataflow::pipeline::{compute_fingerprint, trace_operations, trace_text};
use tfdataflow::{Bindings, Catalog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum EmitStage {
    Graph,
    Dot,
    Tree,
    Value,
    Trace,
    Catalog,
    Fingerprint,
}

#[derive(Parser, Debug)]
#[command(
    name = "tfdf",
    version,
    about = "Reconstructs a TensorFlow-style expression and traces element-level dataflow"
)]
struct Cli {
    /// Expression text, e.g. `tf.reduce_sum(in1, axis=0)`
    expression: Option<String>,

    /// Bind one input as NAME=LITERAL (repeatable)
    #[arg(short, long = "input", value_name = "NAME=LITERAL")]
    input: Vec<String>,

    /// JSON inputs: a file path or inline JSON (array binds in1, in2, …)
    #[arg(long)]
    inputs: Option<String>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Graph)]
    emit: EmitStage,

    /// Decimal places for float values
    #[arg(long, default_value_t = 2)]
    decimals: u32,

    /// Give every visit of a leaf its own node
    #[arg(long)]
    no_merge: bool,

    /// Debug logging on stderr
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let catalog = Catalog::standard();

    if cli.emit == EmitStage::Catalog {
        let listing: Vec<_> = catalog.all_descriptors().iter().map(|d| d.summary()).collect();
        print_json(&listing);
        return;
    }

    let Some(expression) = cli.expression.as_deref() else {
        eprintln!("tfdf: error: an expression is required for --emit {:?}", cli.emit);
        std::process::exit(2);
    };

    if cli.emit == EmitStage::Fingerprint {
        print_json(&compute_fingerprint(expression, catalog).to_json());
        return;
    }

    let bindings = match load_bindings(&cli) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("tfdf: error: {e}");
            std::process::exit(2);
        }
    };
    tracing::debug!(inputs = bindings.len(), "loaded bindings");

    let options = GraphOptions {
        merge: if cli.no_merge {
            MergePolicy::Never
        } else {
            MergePolicy::SharedLeaves
        },
        decimals: cli.decimals,
    };

    let traced = match trace_text(expression, &bindings, catalog, options) {
        Ok(t) => t,
        Err(e) => fail(e),
    };

    match cli.emit {
        EmitStage::Graph => print_json(&traced.graph),
        EmitStage::Dot => print!("{}", tfdataflow::dot::emit_dot(&traced.graph)),
        EmitStage::Tree => print_json(&traced.value.to_tree(cli.decimals)),
        EmitStage::Value => println!("{}", traced.value.value_string(cli.decimals)),
        EmitStage::Trace => match trace_operations(&traced.value, catalog) {
            Ok(traces) => print_json(&traces),
            Err(e) => fail(e.into()),
        },
        EmitStage::Catalog | EmitStage::Fingerprint => {}
    }
}

fn load_bindings(cli: &Cli) -> Result<Bindings, Error> {
    let mut bindings = match cli.inputs.as_deref() {
        Some(text) => {
            let trimmed = text.trim_start();
            let json = if trimmed.starts_with('[') || trimmed.starts_with('{') {
                text.to_string()
            } else {
                std::fs::read_to_string(text)
                    .map_err(|e| Error::Bindings(format!("{text}: {e}")))?
            };
            Bindings::from_json(&serde_json::from_str(&json)?)?
        }
        None => Bindings::new(),
    };
    for assignment in &cli.input {
        bindings.assign(assignment)?;
    }
    Ok(bindings)
}

/// Expression errors exit 1; internal inconsistencies exit 3.
fn fail(error: Error) -> ! {
    let code = match error {
        Error::Trace(_) | Error::Catalog(_) => 3,
        _ => 1,
    };
    eprintln!("tfdf: error: {error}");
    std::process::exit(code);
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("tfdf: error: {e}");
            std::process::exit(3);
        }
    }
}
