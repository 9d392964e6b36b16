use clap::Parser;
use log::{debug, LevelFilter};
use std::path::PathBuf;

use meshpart::config::TargetConfig;
use meshpart::error::Error;
use meshpart::pass::PassId;
use meshpart::pipeline::{self, Compilation};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    Summary,
    Partitions,
    Switch,
    Dot,
    Json,
}

impl EmitStage {
    fn terminal(self) -> PassId {
        match self {
            EmitStage::Partitions => PassId::Partition,
            EmitStage::Summary | EmitStage::Dot => PassId::Layout,
            EmitStage::Switch | EmitStage::Json => PassId::Route,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "meshpart",
    version,
    about = "Partitions a stream graph onto a tiled mesh and emits static switch routes"
)]
struct Cli {
    /// Input stream graph (JSON)
    graph: PathBuf,

    /// Target configuration file (JSON); flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mesh rows
    #[arg(long)]
    rows: Option<u32>,

    /// Mesh columns
    #[arg(long)]
    cols: Option<u32>,

    /// Tile budget (defaults to the whole mesh)
    #[arg(short, long)]
    tiles: Option<usize>,

    /// Per-tile code cache size
    #[arg(long)]
    code_cache: Option<u64>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Summary)]
    emit: EmitStage,

    /// Output file path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print pass timing (RUST_LOG overrides)
    #[arg(long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(level)
        .target(env_logger::Target::Stderr)
        .parse_default_env()
        .init();
}

fn load_config(cli: &Cli) -> Result<TargetConfig, String> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("{}: {}", path.display(), e))?;
            serde_json::from_str::<TargetConfig>(&text)
                .map_err(|e| format!("{}: {}", path.display(), e))?
        }
        None => TargetConfig::default(),
    };
    if let Some(rows) = cli.rows {
        config.rows = rows;
    }
    if let Some(cols) = cli.cols {
        config.cols = cols;
    }
    if let Some(tiles) = cli.tiles {
        config.tiles = Some(tiles);
    }
    if let Some(size) = cli.code_cache {
        config.code_cache_size = size;
    }
    Ok(config)
}

fn render(state: &Compilation, emit: EmitStage) -> Result<String, Error> {
    match emit {
        EmitStage::Summary => pipeline::render_summary(state),
        EmitStage::Partitions => pipeline::render_partitions(state),
        EmitStage::Json => pipeline::render_json(state),
        EmitStage::Switch => {
            let (program, mesh) = match (&state.switch, &state.mesh) {
                (Some(p), Some(m)) => (p, m),
                _ => return Err(Error::Internal("switch code was not produced".into())),
            };
            program.render(mesh)
        }
        EmitStage::Dot => match (&state.steady, &state.partitions) {
            (Some(steady), Some(result)) => Ok(meshpart::dot::emit_dot(
                &state.graph,
                steady,
                result,
                state.layout.as_ref(),
            )),
            _ => Err(Error::Internal("partitions were not produced".into())),
        },
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    debug!("graph  = {}", cli.graph.display());
    debug!("emit   = {:?}", cli.emit);

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("meshpart: error: {}", e);
            std::process::exit(2);
        }
    };

    let text = match std::fs::read_to_string(&cli.graph) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("meshpart: error: {}: {}", cli.graph.display(), e);
            std::process::exit(2);
        }
    };

    let output = pipeline::compile(&text, config, cli.emit.terminal()).and_then(|state| {
        for warning in pipeline::warnings(&state) {
            eprintln!("meshpart: {}", warning);
        }
        render(&state, cli.emit)
    });
    let output = match output {
        Ok(s) => s,
        Err(e) => {
            eprintln!("meshpart: {}", e.to_diagnostic());
            std::process::exit(1);
        }
    };

    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &output) {
                eprintln!("meshpart: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
            debug!("wrote {}", path.display());
        }
        None => print!("{}", output),
    }
}
