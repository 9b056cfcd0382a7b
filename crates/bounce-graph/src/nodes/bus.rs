//! Send and return nodes.
//!
//! A send is a transparent pass-through that advertises a bus id; a
//! return mixes every send on its bus into its own signal. Returns
//! resolve their sends once, during preparation, by swapping their input
//! for a summing node that owns the old input and references the sends.

use crate::error::GraphError;
use crate::node::{BusId, Node, NodeProperties, NodeRef, PrepareContext, ProcessContext, make_node};
use crate::nodes::SumNode;

/// Forwards its input unchanged while exposing it on a bus.
pub struct SendNode {
    input: NodeRef,
    bus: BusId,
}

impl SendNode {
    /// Expose `input` on `bus`.
    pub fn new(input: NodeRef, bus: BusId) -> Self {
        Self { input, bus }
    }
}

impl Node for SendNode {
    fn properties(&self) -> NodeProperties {
        self.input.properties()
    }

    fn direct_inputs(&self) -> Vec<NodeRef> {
        vec![self.input.clone()]
    }

    fn send_bus(&self) -> Option<BusId> {
        Some(self.bus)
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let source = self.input.processed_output();
        ctx.audio.copy_from(source.audio());
        ctx.midi.merge_from(source.midi());
        Ok(())
    }
}

/// Mixes every send on its bus into its own input.
pub struct ReturnNode {
    input: NodeRef,
    bus: BusId,
    resolved: bool,
}

impl ReturnNode {
    /// Collect sends on `bus` into the signal of `input`.
    pub fn new(input: NodeRef, bus: BusId) -> Self {
        Self {
            input,
            bus,
            resolved: false,
        }
    }
}

impl Node for ReturnNode {
    fn properties(&self) -> NodeProperties {
        self.input.properties()
    }

    fn direct_inputs(&self) -> Vec<NodeRef> {
        vec![self.input.clone()]
    }

    fn prepare(&mut self, ctx: &PrepareContext) -> Result<(), GraphError> {
        if self.resolved {
            return Ok(());
        }
        let sends = ctx.sends_for_bus(self.bus);
        if !sends.is_empty() {
            tracing::debug!(bus = self.bus.0, sends = sends.len(), "resolving return");
            let sum = make_node(SumNode::with_references(vec![self.input.clone()], sends));
            let claimed = sum.claim_id(ctx.next_id());
            debug_assert!(claimed);
            sum.prepare(ctx)?;
            self.input = sum;
        }
        self.resolved = true;
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let source = self.input.processed_output();
        ctx.audio.copy_from(source.audio());
        ctx.midi.merge_from(source.midi());
        Ok(())
    }
}
