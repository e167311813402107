// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use crate::diagnostics::RuleDescriptor;
use crate::graph::{SymbolGraph, SyntaxNode};

///
/// Recognizes one syntactic allocation pattern, e.g. boxing or closure
/// capture. Shapes add findings on top of the call and property checks.
///
/// They only see nodes inside restricted bodies, and anything they match
/// inside a safe scope is dropped before it is reported.
///
pub trait AllocationShape: Sync + Send {
    ///
    /// Short name, used in logs when the shape matches
    ///
    fn name(&self) -> String;

    /// The rule reported for a match
    fn descriptor(&self) -> &'static RuleDescriptor;

    fn matches(&self, graph: &dyn SymbolGraph, node: &SyntaxNode) -> bool;
}

///
/// The shapes registered on a session.
///
#[derive(Default)]
pub struct ShapeCollection {
    shapes: Vec<Box<dyn AllocationShape>>,
}

impl ShapeCollection {
    pub fn new(shapes: Vec<Box<dyn AllocationShape>>) -> ShapeCollection {
        ShapeCollection { shapes }
    }

    pub fn push(&mut self, shape: Box<dyn AllocationShape>) {
        self.shapes.push(shape);
    }

    pub fn shapes(&self) -> &[Box<dyn AllocationShape>] {
        &self.shapes
    }

    /// Every shape matching `node`, in registration order
    pub fn matching<'s>(
        &'s self,
        graph: &'s dyn SymbolGraph,
        node: &'s SyntaxNode,
    ) -> impl Iterator<Item = &'s dyn AllocationShape> + 's {
        self.shapes
            .iter()
            .map(|shape| shape.as_ref())
            .filter(move |shape| shape.matches(graph, node))
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
