// pass.rs — Pass descriptor module: metadata, dependency resolution, artifact IDs
//
// Declares the five passes between a validated stream graph and switch code,
// their dependency edges, and the artifacts they produce. Used by the
// pipeline runner to compute the minimal pass subset for each --emit target.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each compiler pass (graph loading is handled before the runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Flow,
    BuildConfig,
    Partition,
    Layout,
    Route,
}

/// Machine-readable artifact identifiers. Each maps to a concrete type
/// in the compilation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Steady,     // SteadyState
    CostModel,  // CostModel
    Partitions, // PartitionResult
    PartCert,   // PartitionCert
    Layout,     // Layout
    Switch,     // SwitchProgram
    RouteCert,  // RouteCert
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a compiler pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// Pre/post conditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Flow => PassDescriptor {
            name: "flow",
            inputs: &[],
            outputs: &[ArtifactId::Steady],
            invariants: "balance equations hold on every live channel",
        },
        PassId::BuildConfig => PassDescriptor {
            name: "build_config",
            inputs: &[],
            outputs: &[ArtifactId::CostModel],
            invariants: "target config validated, no filter exceeds the code cache",
        },
        PassId::Partition => PassDescriptor {
            name: "partition",
            inputs: &[PassId::Flow, PassId::BuildConfig],
            outputs: &[ArtifactId::Partitions, ArtifactId::PartCert],
            invariants: "P1-P4 obligations verified",
        },
        PassId::Layout => PassDescriptor {
            name: "layout",
            inputs: &[PassId::Partition],
            outputs: &[ArtifactId::Layout],
            invariants: "placement injective, dependencies merged per tile pair",
        },
        PassId::Route => PassDescriptor {
            name: "route",
            inputs: &[PassId::Layout],
            outputs: &[ArtifactId::Switch, ArtifactId::RouteCert],
            invariants: "R1-R2 obligations verified",
        },
    }
}

// ── Stage certificates ─────────────────────────────────────────────────────

/// Machine-checkable evidence that a pass met its postconditions.
pub trait StageCert {
    fn all_pass(&self) -> bool;
    /// Named obligations with their outcome, in declaration order.
    fn obligations(&self) -> Vec<(&'static str, bool)>;

    /// Names of the obligations that did not hold.
    fn failures(&self) -> Vec<&'static str> {
        self.obligations()
            .into_iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| name)
            .collect()
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 5] = [
    PassId::Flow,
    PassId::BuildConfig,
    PassId::Partition,
    PassId::Layout,
    PassId::Route,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────
