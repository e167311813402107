// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use crate::error::EngineError;
use crate::graph::{NodeId, SymbolGraph, SyntaxKind, TypeId};

///
/// Finds nodes shielded by an allocation-free scope.
///
/// A scope is opened either by a using-style statement acquiring the marker
/// type, or by a local of the marker type declared earlier in an enclosing
/// block. "Earlier" means earlier in program order. Control flow is not
/// followed, so a declaration before an early return still covers everything
/// after it in the block. This is a convention, not a dataflow proof.
///
pub struct SafeScopeDetector<'g> {
    graph: &'g dyn SymbolGraph,
    marker_type: String,
}

impl<'g> SafeScopeDetector<'g> {
    /// `marker_type` is the qualified name, e.g. `HotPath.AllocationFreeScope`
    pub fn new(graph: &'g dyn SymbolGraph, marker_type: impl Into<String>) -> Self {
        Self {
            graph,
            marker_type: marker_type.into(),
        }
    }

    pub fn marker_type(&self) -> &str {
        &self.marker_type
    }

    pub fn is_in_safe_scope(&self, node: NodeId) -> Result<bool, EngineError> {
        let mut current = node;

        // A well-formed tree reaches its root in fewer steps than it has nodes
        for _ in 0..=self.graph.node_count() {
            let Some(parent_id) = self.node_parent(current)? else {
                return Ok(false);
            };
            let parent = self
                .graph
                .node(parent_id)
                .ok_or(EngineError::UnknownNode(parent_id))?;

            match parent.kind {
                SyntaxKind::UsingStatement {
                    resource_type: Some(ty),
                } if self.is_marker(ty)? => return Ok(true),
                SyntaxKind::Block => {
                    for sibling in parent.children.iter().take_while(|id| **id != current) {
                        if self.declares_marker(*sibling)? {
                            return Ok(true);
                        }
                    }
                }
                _ => {}
            }

            current = parent_id;
        }

        Err(EngineError::UnterminatedAncestry(node))
    }

    fn node_parent(&self, id: NodeId) -> Result<Option<NodeId>, EngineError> {
        self.graph
            .node(id)
            .map(|node| node.parent)
            .ok_or(EngineError::UnknownNode(id))
    }

    fn declares_marker(&self, statement: NodeId) -> Result<bool, EngineError> {
        let node = self
            .graph
            .node(statement)
            .ok_or(EngineError::UnknownNode(statement))?;
        match node.kind {
            SyntaxKind::LocalDeclaration {
                declared_type: Some(ty),
            } => self.is_marker(ty),
            _ => Ok(false),
        }
    }

    fn is_marker(&self, ty: TypeId) -> Result<bool, EngineError> {
        let symbol = self
            .graph
            .type_symbol(ty)
            .ok_or(EngineError::UnknownType(ty))?;
        Ok(symbol.qualified_name() == self.marker_type)
    }
}
