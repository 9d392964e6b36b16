// switch.rs — Static switch instruction synthesis
//
// Every item of a dependency is one word routed hop by hop along the XY path
// from its source tile to its destination tile. A word entering the network
// at step `s` crosses hop `k` at step `s + k`; it is scheduled at the
// earliest `s` where each hop's input and output ports are free at that tile
// and step. Words are placed in dependency order, so instruction text is
// reproducible byte for byte.
//
// Preconditions: dependencies come from `layout::dependencies` on the same
//                mesh (src != dst, both inside the mesh).
// Postconditions: within one instruction no input or output port repeats;
//                 every connection is between adjacent tiles or the local
//                 processor (checked by `verify_routes`).
// Failure modes: `Error::MalformedRoute` for a missing or unknown endpoint;
//                `Error::NotAdjacent` when rendering a non-neighbour hop.
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::error::{Error, Result};
use crate::id::TileId;
use crate::layout::Dependency;
use crate::mesh::{Direction, Mesh};

// ── Ports ───────────────────────────────────────────────────────────────────

/// One side of a switch connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Port {
    /// The tile's own processor.
    Proc,
    Link(Direction),
}

impl Port {
    /// Name of the port when it feeds the switch.
    pub fn input_name(self) -> String {
        match self {
            Port::Proc => "$csto".to_string(),
            Port::Link(d) => format!("$c{}i", d.letter()),
        }
    }

    /// Name of the port when the switch drives it.
    pub fn output_name(self) -> String {
        match self {
            Port::Proc => "$csti".to_string(),
            Port::Link(d) => format!("$c{}o", d.letter()),
        }
    }
}

// ── Route instruction ───────────────────────────────────────────────────────

/// All connections one tile's switch makes in a single step. Each route is
/// a (source tile, destination tile) pair; a tile naming itself means its
/// processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInstruction {
    tile: TileId,
    routes: Vec<(TileId, TileId)>,
}

impl RouteInstruction {
    pub fn new(tile: TileId) -> Self {
        RouteInstruction {
            tile,
            routes: Vec::new(),
        }
    }

    pub fn tile(&self) -> TileId {
        self.tile
    }

    pub fn routes(&self) -> &[(TileId, TileId)] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Append a connection. A missing or unknown endpoint is an upstream
    /// bug and fails immediately.
    pub fn add(&mut self, mesh: &Mesh, src: Option<TileId>, dst: Option<TileId>) -> Result<()> {
        let src = src.ok_or_else(|| self.malformed("route has no source tile".into()))?;
        let dst = dst.ok_or_else(|| self.malformed("route has no destination tile".into()))?;
        for t in [self.tile, src, dst] {
            if !mesh.contains(t) {
                return Err(self.malformed(format!("{} is not a tile of the mesh", t)));
            }
        }
        self.routes.push((src, dst));
        Ok(())
    }

    fn malformed(&self, detail: String) -> Error {
        Error::MalformedRoute {
            tile: self.tile,
            detail,
        }
    }

    fn port_toward(&self, mesh: &Mesh, other: TileId) -> Result<Port> {
        if other == self.tile {
            Ok(Port::Proc)
        } else {
            mesh.direction(self.tile, other).map(Port::Link)
        }
    }

    /// Resolved (input, output) ports of every route, in insertion order.
    pub fn connections(&self, mesh: &Mesh) -> Result<Vec<(Port, Port)>> {
        self.routes
            .iter()
            .map(|&(src, dst)| Ok((self.port_toward(mesh, src)?, self.port_toward(mesh, dst)?)))
            .collect()
    }

    /// `route $cWi->$cEo, $csto->$cSo`, or `nop` when idle.
    pub fn render(&self, mesh: &Mesh) -> Result<String> {
        if self.routes.is_empty() {
            return Ok("nop".to_string());
        }
        let parts: Vec<String> = self
            .connections(mesh)?
            .into_iter()
            .map(|(i, o)| format!("{}->{}", i.input_name(), o.output_name()))
            .collect();
        Ok(format!("route {}", parts.join(", ")))
    }
}

// ── Program ─────────────────────────────────────────────────────────────────

/// Instruction stream of one tile's switch, one entry per step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileStream {
    pub tile: TileId,
    pub instructions: Vec<RouteInstruction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SwitchProgram {
    /// Streams of every tile with at least one route, by tile id.
    pub streams: Vec<TileStream>,
    /// Words routed per steady state.
    pub words: u64,
}

impl SwitchProgram {
    /// Length of the longest stream.
    pub fn steps(&self) -> usize {
        self.streams
            .iter()
            .map(|s| s.instructions.len())
            .max()
            .unwrap_or(0)
    }

    pub fn stream(&self, tile: TileId) -> Option<&TileStream> {
        self.streams.iter().find(|s| s.tile == tile)
    }

    /// Rendered instruction text per tile.
    pub fn rendered(&self, mesh: &Mesh) -> Result<Vec<(TileId, Vec<String>)>> {
        self.streams
            .iter()
            .map(|s| {
                let lines = s
                    .instructions
                    .iter()
                    .map(|ins| ins.render(mesh))
                    .collect::<Result<Vec<_>>>()?;
                Ok((s.tile, lines))
            })
            .collect()
    }

    /// Human-readable listing of every stream.
    pub fn render(&self, mesh: &Mesh) -> Result<String> {
        let mut out = String::new();
        for (tile, lines) in self.rendered(mesh)? {
            let (row, col) = mesh
                .tile(tile)
                .map(|t| (t.row, t.col))
                .unwrap_or_default();
            out.push_str(&format!("{} ({},{}):\n", tile, row, col));
            for (step, line) in lines.iter().enumerate() {
                out.push_str(&format!("  {}: {}\n", step, line));
            }
        }
        Ok(out)
    }
}

/// Schedule every word of every dependency onto the switches.
pub fn synthesize(mesh: &Mesh, dependencies: &[Dependency]) -> Result<SwitchProgram> {
    let mut streams: BTreeMap<TileId, Vec<RouteInstruction>> = BTreeMap::new();
    let mut used_in: BTreeSet<(TileId, usize, Port)> = BTreeSet::new();
    let mut used_out: BTreeSet<(TileId, usize, Port)> = BTreeSet::new();
    let mut words = 0u64;

    for dep in dependencies {
        let path = mesh.route(dep.src, dep.dst)?;
        let hops = hops(mesh, &path)?;
        let mut start = 0usize;
        for _ in 0..dep.items {
            while !hops.iter().enumerate().all(|(k, h)| {
                !used_in.contains(&(h.tile, start + k, h.input))
                    && !used_out.contains(&(h.tile, start + k, h.output))
            }) {
                start += 1;
            }
            for (k, h) in hops.iter().enumerate() {
                let step = start + k;
                used_in.insert((h.tile, step, h.input));
                used_out.insert((h.tile, step, h.output));
                let stream = streams.entry(h.tile).or_default();
                while stream.len() <= step {
                    stream.push(RouteInstruction::new(h.tile));
                }
                stream[step].add(mesh, Some(h.from), Some(h.to))?;
            }
            start += 1;
            words += 1;
        }
        debug!(
            "switch: {} -> {} ({} words over {} hops)",
            dep.src,
            dep.dst,
            dep.items,
            path.len() - 1
        );
    }

    Ok(SwitchProgram {
        streams: streams
            .into_iter()
            .map(|(tile, instructions)| TileStream { tile, instructions })
            .collect(),
        words,
    })
}

/// One switch traversal of a word.
struct Hop {
    tile: TileId,
    from: TileId,
    to: TileId,
    input: Port,
    output: Port,
}

fn hops(mesh: &Mesh, path: &[TileId]) -> Result<Vec<Hop>> {
    let last = path.len().saturating_sub(1);
    path.iter()
        .enumerate()
        .map(|(k, &tile)| {
            let from = if k == 0 { tile } else { path[k - 1] };
            let to = if k == last { tile } else { path[k + 1] };
            let input = if from == tile {
                Port::Proc
            } else {
                Port::Link(mesh.direction(tile, from)?)
            };
            let output = if to == tile {
                Port::Proc
            } else {
                Port::Link(mesh.direction(tile, to)?)
            };
            Ok(Hop {
                tile,
                from,
                to,
                input,
                output,
            })
        })
        .collect()
}

// ── Verification ────────────────────────────────────────────────────────────

/// Machine-checkable evidence for switch postconditions (R1-R2).
#[derive(Debug, Clone)]
pub struct RouteCert {
    /// R1: Every connection resolves to the processor or an adjacent tile.
    pub r1_ports_adjacent: bool,
    /// R2: No port is used twice within one instruction.
    pub r2_no_port_reuse: bool,
}

impl crate::pass::StageCert for RouteCert {
    fn all_pass(&self) -> bool {
        self.r1_ports_adjacent && self.r2_no_port_reuse
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("R1_ports_adjacent", self.r1_ports_adjacent),
            ("R2_no_port_reuse", self.r2_no_port_reuse),
        ]
    }
}

pub fn verify_routes(program: &SwitchProgram, mesh: &Mesh) -> RouteCert {
    let mut r1 = true;
    let mut r2 = true;
    for ins in program.streams.iter().flat_map(|s| &s.instructions) {
        match ins.connections(mesh) {
            Ok(conns) => {
                let inputs: BTreeSet<Port> = conns.iter().map(|c| c.0).collect();
                let outputs: BTreeSet<Port> = conns.iter().map(|c| c.1).collect();
                if inputs.len() != conns.len() || outputs.len() != conns.len() {
                    r2 = false;
                }
            }
            Err(_) => r1 = false,
        }
    }
    RouteCert {
        r1_ports_adjacent: r1,
        r2_no_port_reuse: r2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::StageCert;

    fn dep(src: u32, dst: u32, items: u64) -> Dependency {
        Dependency {
            src: TileId(src),
            dst: TileId(dst),
            items,
        }
    }

    #[test]
    fn add_rejects_null_endpoints() {
        let mesh = Mesh::new(2, 2).unwrap();
        let mut ins = RouteInstruction::new(TileId(0));
        let err = ins.add(&mesh, None, Some(TileId(1))).unwrap_err();
        assert!(matches!(err, Error::MalformedRoute { tile: TileId(0), .. }));
        assert!(ins.add(&mesh, Some(TileId(0)), None).is_err());
        assert!(ins.add(&mesh, Some(TileId(0)), Some(TileId(9))).is_err());
        assert!(ins.is_empty());
    }

    #[test]
    fn render_joins_connections_in_order() {
        let mesh = Mesh::new(2, 2).unwrap();
        let mut ins = RouteInstruction::new(TileId(1));
        ins.add(&mesh, Some(TileId(0)), Some(TileId(3))).unwrap();
        ins.add(&mesh, Some(TileId(1)), Some(TileId(0))).unwrap();
        assert_eq!(ins.render(&mesh).unwrap(), "route $cWi->$cSo, $csto->$cWo");
        assert_eq!(RouteInstruction::new(TileId(2)).render(&mesh).unwrap(), "nop");
    }

    #[test]
    fn render_fails_for_non_neighbour() {
        let mesh = Mesh::new(3, 3).unwrap();
        let mut ins = RouteInstruction::new(TileId(0));
        ins.add(&mesh, Some(TileId(8)), Some(TileId(0))).unwrap();
        assert!(matches!(ins.render(&mesh), Err(Error::NotAdjacent { .. })));
    }

    #[test]
    fn single_hop_words_pipeline() {
        let mesh = Mesh::new(1, 2).unwrap();
        let program = synthesize(&mesh, &[dep(0, 1, 2)]).unwrap();
        assert_eq!(program.words, 2);
        assert_eq!(program.steps(), 3);
        let rendered = program.rendered(&mesh).unwrap();
        assert_eq!(
            rendered,
            vec![
                (
                    TileId(0),
                    vec!["route $csto->$cEo".to_string(), "route $csto->$cEo".to_string()]
                ),
                (
                    TileId(1),
                    vec![
                        "nop".to_string(),
                        "route $cWi->$csti".to_string(),
                        "route $cWi->$csti".to_string()
                    ]
                ),
            ]
        );
    }

    #[test]
    fn independent_dependencies_share_a_step() {
        let mesh = Mesh::new(1, 2).unwrap();
        let program = synthesize(&mesh, &[dep(0, 1, 1), dep(1, 0, 1)]).unwrap();
        let t0 = program.stream(TileId(0)).unwrap();
        assert_eq!(t0.instructions[0].render(&mesh).unwrap(), "route $csto->$cEo");
        assert_eq!(t0.instructions[1].render(&mesh).unwrap(), "route $cEi->$csti");
        let t1 = program.stream(TileId(1)).unwrap();
        assert_eq!(
            t1.instructions[0].render(&mesh).unwrap(),
            "route $csto->$cWo"
        );
        assert_eq!(
            t1.instructions[1].render(&mesh).unwrap(),
            "route $cWi->$csti"
        );
        assert!(verify_routes(&program, &mesh).all_pass());
    }

    #[test]
    fn cert_flags_port_reuse() {
        let mesh = Mesh::new(1, 2).unwrap();
        let mut ins = RouteInstruction::new(TileId(0));
        ins.add(&mesh, Some(TileId(0)), Some(TileId(1))).unwrap();
        ins.add(&mesh, Some(TileId(0)), Some(TileId(1))).unwrap();
        let program = SwitchProgram {
            streams: vec![TileStream {
                tile: TileId(0),
                instructions: vec![ins],
            }],
            words: 2,
        };
        let cert = verify_routes(&program, &mesh);
        assert!(cert.r1_ports_adjacent);
        assert!(!cert.r2_no_port_reuse);
    }
}
