//! State of one (object, quantity) bake cycle: what to put back, and what to remove.

use anyhow::{Result, anyhow};

use crate::{
    graph::{Graph, InputRef, NodeId, OutputRef},
    scene::{MaterialId, Scene},
    synth::Scratch,
};

/// Links feeding a sink's Surface and Displacement, plus the graph's active node,
/// captured before the cycle mutates anything.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkCheckpoint {
    surface: InputRef,
    displacement: InputRef,
    surface_from: Option<OutputRef>,
    displacement_from: Option<OutputRef>,
    active: Option<NodeId>,
}

impl SinkCheckpoint {
    pub fn take(graph: &Graph, sink: NodeId) -> Result<Self> {
        let surface = graph.input(sink, "Surface")?;
        let displacement = graph.input(sink, "Displacement")?;
        Ok(Self {
            surface,
            displacement,
            surface_from: graph.incoming(surface),
            displacement_from: graph.incoming(displacement),
            active: graph.active(),
        })
    }

    pub fn restore(&self, graph: &mut Graph) -> Result<()> {
        for (input, from) in [
            (self.surface, self.surface_from),
            (self.displacement, self.displacement_from),
        ] {
            match from {
                Some(from) => graph.link(from, input)?,
                None => {
                    graph.unlink(input);
                }
            }
        }
        match self.active {
            Some(id) if graph.contains(id) => graph.set_active(id)?,
            _ => graph.clear_active(),
        }
        Ok(())
    }
}

struct Touched {
    material: MaterialId,
    checkpoint: Option<SinkCheckpoint>,
    scratch: Scratch,
}

/// Every material a cycle touched. [`BakeCycle::finish`] must run whether or not the
/// cycle succeeded.
#[derive(Default)]
pub struct BakeCycle {
    touched: Vec<Touched>,
}

impl BakeCycle {
    /// Checkpoint `material` on first touch and hand out its scratch set.
    pub fn touch<'s>(&'s mut self, scene: &Scene, material: MaterialId) -> Result<&'s mut Scratch> {
        let idx = match self.touched.iter().position(|t| t.material == material) {
            Some(idx) => idx,
            None => {
                let graph = &scene.material(material)?.graph;
                let checkpoint = match graph.sink() {
                    Some(sink) => Some(SinkCheckpoint::take(graph, sink)?),
                    None => None,
                };
                self.touched.push(Touched {
                    material,
                    checkpoint,
                    scratch: Scratch::default(),
                });
                self.touched.len() - 1
            }
        };
        self.touched
            .get_mut(idx)
            .map(|t| &mut t.scratch)
            .ok_or_else(|| anyhow!("bake cycle lost track of {material:?}"))
    }

    /// Restore every checkpoint and remove every scratch node. All materials are
    /// processed even if one fails; the first error is returned.
    pub fn finish(self, scene: &mut Scene) -> Result<()> {
        let mut first_err = None;
        for t in self.touched {
            let result = scene.material_mut(t.material).and_then(|m| {
                let restored = match &t.checkpoint {
                    Some(c) => c.restore(&mut m.graph),
                    None => Ok(()),
                };
                let removed = t.scratch.teardown(&mut m.graph);
                restored.and(removed)
            });
            if let Err(e) = result {
                tracing::warn!(material = ?t.material, "failed to restore material after bake: {e:#}");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
