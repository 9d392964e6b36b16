// pipeline.rs — Compilation state and pass orchestration
//
// Holds every pass artifact and runs the minimal set of passes for a given
// terminal PassId. The first failing pass aborts the run; there is no
// partial output.
//
// Preconditions: the graph text is JSON accepted by `StreamGraph::from_json`.
// Postconditions: artifacts for all passes in `required_passes(terminal)` are
//                 populated and their certificates pass.
// Failure modes: any pass error; a certificate with failed obligations
//                (reported as `Error::InvalidGraph`); a pass without its
//                inputs (`Error::Internal`).
// Side effects: logs per-pass timing through `log`.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::{Duration, Instant};

use log::info;
use serde::Serialize;

use crate::config::TargetConfig;
use crate::cost::CostModel;
use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::error::{Error, Result};
use crate::flow::{steady_state, SteadyState};
use crate::id::TileId;
use crate::layout::{Dependency, Layout};
use crate::mesh::Mesh;
use crate::partition::{
    partition_with_model, verify_partitions, PartitionCert, PartitionRecord, PartitionResult,
};
use crate::pass::{descriptor, required_passes, PassId, StageCert};
use crate::stream::StreamGraph;
use crate::switch::{synthesize, verify_routes, RouteCert, SwitchProgram};

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for reproducible output.
///
/// `graph_hash`: SHA-256 of the raw graph text.
/// `config_fingerprint`: SHA-256 of the compact JSON of the effective config.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub graph_hash: [u8; 32],
    pub config_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    /// Hex string of the graph hash (64 characters).
    pub fn graph_hash_hex(&self) -> String {
        bytes_to_hex(&self.graph_hash)
    }

    /// Hex string of the config fingerprint (64 characters).
    pub fn config_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.config_fingerprint)
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(text: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Compute provenance from graph text and the effective config.
pub fn compute_provenance(graph_text: &str, config: &TargetConfig) -> Result<Provenance> {
    let canonical = serde_json::to_string(config)?;
    Ok(Provenance {
        graph_hash: sha256(graph_text),
        config_fingerprint: sha256(&canonical),
        compiler_version: env!("CARGO_PKG_VERSION"),
    })
}

// ── Compilation state ──────────────────────────────────────────────────────

/// All artifacts of one compilation.
#[derive(Debug)]
pub struct Compilation {
    pub graph: StreamGraph,
    pub config: TargetConfig,
    pub provenance: Provenance,
    pub steady: Option<SteadyState>,
    pub model: Option<CostModel>,
    pub partitions: Option<PartitionResult>,
    pub partition_cert: Option<PartitionCert>,
    pub mesh: Option<Mesh>,
    pub layout: Option<Layout>,
    pub switch: Option<SwitchProgram>,
    pub route_cert: Option<RouteCert>,
}

impl Compilation {
    fn new(graph: StreamGraph, config: TargetConfig, provenance: Provenance) -> Self {
        Compilation {
            graph,
            config,
            provenance,
            steady: None,
            model: None,
            partitions: None,
            partition_cert: None,
            mesh: None,
            layout: None,
            switch: None,
            route_cert: None,
        }
    }
}

/// Parse, validate, and run every pass up to `terminal`.
pub fn compile(graph_text: &str, config: TargetConfig, terminal: PassId) -> Result<Compilation> {
    let graph = StreamGraph::from_json(graph_text)?;
    config.validate()?;
    let provenance = compute_provenance(graph_text, &config)?;
    let mut state = Compilation::new(graph, config, provenance);
    run_passes(&mut state, terminal)?;
    Ok(state)
}

/// Run passes on an already built graph (provenance hashes its JSON form).
pub fn compile_graph(graph: StreamGraph, config: TargetConfig, terminal: PassId) -> Result<Compilation> {
    config.validate()?;
    let text = serde_json::to_string(graph.root())?;
    let provenance = compute_provenance(&text, &config)?;
    let mut state = Compilation::new(graph, config, provenance);
    run_passes(&mut state, terminal)?;
    Ok(state)
}

fn missing(pass: PassId) -> Error {
    Error::Internal(format!(
        "pass '{}' ran before its inputs were produced",
        descriptor(pass).name
    ))
}

fn check_cert(state: &Compilation, pass: PassId, cert: &impl StageCert) -> Result<()> {
    if cert.all_pass() {
        return Ok(());
    }
    Err(Error::InvalidGraph {
        node: state.graph.root().describe(),
        detail: format!(
            "{} verification failed: {}",
            descriptor(pass).name,
            cert.failures().join(", ")
        ),
    })
}

fn finish_pass(pass: PassId, elapsed: Duration) {
    info!(
        "{} complete, {:.1}ms",
        descriptor(pass).name,
        elapsed.as_secs_f64() * 1000.0
    );
}

/// Run the minimal set of passes to produce `terminal`.
pub fn run_passes(state: &mut Compilation, terminal: PassId) -> Result<()> {
    for pass in required_passes(terminal) {
        let t = Instant::now();
        match pass {
            PassId::Flow => {
                state.steady = Some(steady_state(&state.graph)?);
            }
            PassId::BuildConfig => {
                state.mesh = Some(Mesh::from_config(&state.config)?);
                state.model = Some(CostModel::new(&state.config));
            }
            PassId::Partition => {
                let steady = state.steady.as_ref().ok_or_else(|| missing(pass))?;
                let model = state.model.as_ref().ok_or_else(|| missing(pass))?;
                let result =
                    partition_with_model(&state.graph, steady, model, state.config.tile_budget())?;
                let cert = verify_partitions(&state.graph, &result, &state.config);
                check_cert(state, pass, &cert)?;
                state.partitions = Some(result);
                state.partition_cert = Some(cert);
            }
            PassId::Layout => {
                let steady = state.steady.as_ref().ok_or_else(|| missing(pass))?;
                let result = state.partitions.as_ref().ok_or_else(|| missing(pass))?;
                let mesh = state.mesh.as_ref().ok_or_else(|| missing(pass))?;
                state.layout = Some(crate::layout::layout(&state.graph, steady, result, mesh)?);
            }
            PassId::Route => {
                let mesh = state.mesh.as_ref().ok_or_else(|| missing(pass))?;
                let layout = state.layout.as_ref().ok_or_else(|| missing(pass))?;
                let program = synthesize(mesh, &layout.dependencies)?;
                let cert = verify_routes(&program, mesh);
                check_cert(state, pass, &cert)?;
                state.switch = Some(program);
                state.route_cert = Some(cert);
            }
        }
        finish_pass(pass, t.elapsed());
    }
    Ok(())
}

/// Non-fatal findings about a finished compilation.
pub fn warnings(state: &Compilation) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    if let Some(result) = &state.partitions {
        if result.tiles_used() < result.budget {
            out.push(
                Diagnostic::new(
                    DiagLevel::Warning,
                    format!(
                        "only {} of {} budgeted tiles are used",
                        result.tiles_used(),
                        result.budget
                    ),
                )
                .with_code(codes::W0100)
                .with_subject(state.graph.root().describe())
                .with_cause(format!(
                    "more tiles do not lower the bottleneck of {}",
                    result.bottleneck()
                ))
                .with_hint(format!("--tiles {} gives the same result", result.tiles_used())),
            );
        }
    }
    out
}

// ── Output ─────────────────────────────────────────────────────────────────

/// Partition listing: one line per partition.
pub fn render_partitions(state: &Compilation) -> Result<String> {
    let result = state.partitions.as_ref().ok_or_else(|| missing(PassId::Partition))?;
    let mut out = String::new();
    for record in &result.partitions {
        let hosts: Vec<String> = record
            .hosted
            .iter()
            .map(|&h| {
                state
                    .graph
                    .node(h)
                    .map(|n| n.name().to_string())
                    .unwrap_or_else(|| h.to_string())
            })
            .collect();
        let _ = write!(
            out,
            "partition {}: work={} code={} data={} filters=[{}]",
            record.index,
            record.work,
            record.code,
            record.data,
            record.names.join(", ")
        );
        if !hosts.is_empty() {
            let _ = write!(out, " hosts=[{}]", hosts.join(", "));
        }
        out.push('\n');
    }
    Ok(out)
}

/// Short human-readable summary.
pub fn render_summary(state: &Compilation) -> Result<String> {
    let result = state.partitions.as_ref().ok_or_else(|| missing(PassId::Partition))?;
    let layout = state.layout.as_ref().ok_or_else(|| missing(PassId::Layout))?;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "graph: {} ({} filters)",
        state.graph.root().name(),
        state.graph.filter_count()
    );
    let _ = writeln!(
        out,
        "mesh: {}x{}, budget {}, minimum {} tiles",
        state.config.rows, state.config.cols, result.budget, result.min_tiles
    );
    let _ = writeln!(
        out,
        "bottleneck: {} on {} tiles",
        result.bottleneck(),
        result.tiles_used()
    );
    for record in &result.partitions {
        let tile = layout
            .tile_of(record.index)
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {} {}: work {} [{}]",
            record.index,
            tile,
            record.work,
            record.names.join(", ")
        );
    }
    let _ = writeln!(out, "dependencies: {}", layout.dependencies.len());
    Ok(out)
}

/// Machine-readable report of every artifact.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub compiler_version: &'static str,
    pub graph_hash: String,
    pub config_fingerprint: String,
    pub budget: usize,
    pub min_tiles: usize,
    pub bottleneck: u64,
    pub partitions: &'a [PartitionRecord],
    pub placement: &'a [TileId],
    pub dependencies: &'a [Dependency],
    pub words: u64,
    pub switch: BTreeMap<String, Vec<String>>,
}

pub fn report(state: &Compilation) -> Result<Report<'_>> {
    let result = state.partitions.as_ref().ok_or_else(|| missing(PassId::Partition))?;
    let layout = state.layout.as_ref().ok_or_else(|| missing(PassId::Layout))?;
    let program = state.switch.as_ref().ok_or_else(|| missing(PassId::Route))?;
    let mesh = state.mesh.as_ref().ok_or_else(|| missing(PassId::Route))?;
    let switch = program
        .rendered(mesh)?
        .into_iter()
        .map(|(tile, lines)| (tile.to_string(), lines))
        .collect();
    Ok(Report {
        compiler_version: state.provenance.compiler_version,
        graph_hash: state.provenance.graph_hash_hex(),
        config_fingerprint: state.provenance.config_fingerprint_hex(),
        budget: result.budget,
        min_tiles: result.min_tiles,
        bottleneck: result.bottleneck(),
        partitions: &result.partitions,
        placement: &layout.placement,
        dependencies: &layout.dependencies,
        words: program.words,
        switch,
    })
}

pub fn render_json(state: &Compilation) -> Result<String> {
    let mut text = serde_json::to_string_pretty(&report(state)?)?;
    text.push('\n');
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = r#"{
        "type": "pipeline", "name": "chain",
        "children": [
            {"type": "filter", "name": "a", "pop": 1, "push": 1, "work": 10, "code": 16},
            {"type": "filter", "name": "b", "pop": 1, "push": 1, "work": 40, "code": 16},
            {"type": "filter", "name": "c", "pop": 1, "push": 1, "work": 10, "code": 16}
        ]
    }"#;

    #[test]
    fn partition_terminal_skips_layout() {
        let state = compile(CHAIN, TargetConfig::for_tile_count(3), PassId::Partition).unwrap();
        assert!(state.partitions.is_some());
        assert!(state.layout.is_none());
        assert!(state.switch.is_none());
        assert!(state.partition_cert.as_ref().unwrap().all_pass());
    }

    #[test]
    fn full_run_produces_switch_code() {
        let state = compile(CHAIN, TargetConfig::for_tile_count(3), PassId::Route).unwrap();
        let program = state.switch.as_ref().unwrap();
        // a -> b and b -> c both cross between the two tiles.
        assert_eq!(program.words, 2);
        assert!(state.route_cert.as_ref().unwrap().all_pass());
    }

    #[test]
    fn missing_inputs_are_internal_errors() {
        let graph = StreamGraph::from_json(CHAIN).unwrap();
        let config = TargetConfig::for_tile_count(2);
        let provenance = compute_provenance(CHAIN, &config).unwrap();
        let state = Compilation::new(graph, config, provenance);
        for err in [
            render_summary(&state).unwrap_err(),
            render_partitions(&state).unwrap_err(),
            render_json(&state).unwrap_err(),
        ] {
            assert!(matches!(err, Error::Internal(_)), "{err}");
            assert_eq!(err.code(), codes::E0500);
        }
    }

    #[test]
    fn idle_tiles_produce_a_warning() {
        let state = compile(CHAIN, TargetConfig::for_tile_count(3), PassId::Partition).unwrap();
        let warnings = warnings(&state);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, DiagLevel::Warning);
        assert_eq!(warnings[0].code, Some(codes::W0100));
        assert_eq!(warnings[0].message, "only 2 of 3 budgeted tiles are used");
        assert_eq!(warnings[0].cause_chain.len(), 1);

        let tight = compile(CHAIN, TargetConfig::for_tile_count(2), PassId::Partition).unwrap();
        assert!(super::warnings(&tight).is_empty());
    }

    #[test]
    fn provenance_is_stable() {
        let config = TargetConfig::default();
        let a = compute_provenance(CHAIN, &config).unwrap();
        let b = compute_provenance(CHAIN, &config).unwrap();
        assert_eq!(a.graph_hash, b.graph_hash);
        assert_eq!(a.graph_hash_hex().len(), 64);
        let c = compute_provenance(CHAIN, &config.with_code_cache(1)).unwrap();
        assert_ne!(a.config_fingerprint, c.config_fingerprint);
    }

    #[test]
    fn summary_lists_partitions() {
        let state = compile(CHAIN, TargetConfig::for_tile_count(3), PassId::Route).unwrap();
        let summary = render_summary(&state).unwrap();
        assert!(summary.contains("bottleneck: 40 on 2 tiles"), "{summary}");
        assert!(summary.contains("  0 t0: work 20 [a, c]"), "{summary}");
        assert!(summary.contains("  1 t1: work 40 [b]"), "{summary}");
    }

    #[test]
    fn json_report_parses() {
        let state = compile(CHAIN, TargetConfig::for_tile_count(2), PassId::Route).unwrap();
        let text = render_json(&state).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["bottleneck"], 40);
        assert_eq!(value["partitions"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn errors_abort_without_output() {
        let err = compile(CHAIN, TargetConfig::for_tile_count(3).with_code_cache(8), PassId::Route)
            .unwrap_err();
        assert!(matches!(err, Error::OversizedLeaf { .. }));
    }
}
