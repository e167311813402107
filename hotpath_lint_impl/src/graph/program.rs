// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{MemberId, MemberKind, MemberSymbol, NodeId, SymbolGraph, SyntaxKind, SyntaxNode, TypeId, TypeSymbol};
use crate::error::GraphError;

/// The serialized shape of a program, as a front end writes it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GraphParts {
    #[serde(default)]
    types: Vec<TypeSymbol>,
    #[serde(default)]
    members: Vec<MemberSymbol>,
    #[serde(default)]
    nodes: Vec<SyntaxNode>,
}

///
/// In-memory [`SymbolGraph`]. Ids are dense: the symbol with id `n` lives at
/// index `n` of its table, which [`ProgramGraph::from_parts`] checks along with
/// every cross reference.
///
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GraphParts", into = "GraphParts")]
pub struct ProgramGraph {
    types: Vec<TypeSymbol>,
    members: Vec<MemberSymbol>,
    nodes: Vec<SyntaxNode>,
}

impl TryFrom<GraphParts> for ProgramGraph {
    type Error = GraphError;

    fn try_from(parts: GraphParts) -> std::result::Result<Self, Self::Error> {
        ProgramGraph::from_parts(parts.types, parts.members, parts.nodes)
    }
}

impl From<ProgramGraph> for GraphParts {
    fn from(graph: ProgramGraph) -> Self {
        GraphParts {
            types: graph.types,
            members: graph.members,
            nodes: graph.nodes,
        }
    }
}

impl ProgramGraph {
    pub fn from_parts(
        types: Vec<TypeSymbol>,
        members: Vec<MemberSymbol>,
        nodes: Vec<SyntaxNode>,
    ) -> std::result::Result<Self, GraphError> {
        let graph = ProgramGraph {
            types,
            members,
            nodes,
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Loads a graph written by a front end. `.ron` files are read as RON,
    /// anything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read symbol graph: {}", path.display()))?;

        let is_ron = path.extension().is_some_and(|ext| ext == "ron");
        let graph = if is_ron {
            ron::from_str(&content)
                .with_context(|| format!("Failed to parse RON graph: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON graph: {}", path.display()))?
        };
        Ok(graph)
    }

    fn validate(&self) -> std::result::Result<(), GraphError> {
        for (index, ty) in self.types.iter().enumerate() {
            check_position("type", index, ty.id.index())?;
            let owner = ty.id.to_string();
            for base in ty.base.iter().chain(ty.interfaces.iter()) {
                self.check_type(&owner, *base)?;
            }
            for member in &ty.members {
                self.check_member(&owner, *member)?;
            }
        }

        for (index, member) in self.members.iter().enumerate() {
            check_position("member", index, member.id.index())?;
            let owner = member.id.to_string();
            self.check_type(&owner, member.declaring_type)?;
            for other in member.overrides.iter().chain(member.implements.iter()) {
                self.check_member(&owner, *other)?;
            }
            match member.kind {
                MemberKind::Property { getter, setter } => {
                    for accessor in getter.iter().chain(setter.iter()) {
                        self.check_member(&owner, *accessor)?;
                    }
                }
                MemberKind::PropertyGetter { property } | MemberKind::PropertySetter { property } => {
                    self.check_member(&owner, property)?;
                }
                _ => {}
            }
        }

        for (index, node) in self.nodes.iter().enumerate() {
            check_position("node", index, node.id.index())?;
            let owner = node.id.to_string();
            if let Some(symbol) = node.symbol {
                self.check_member(&owner, symbol)?;
            }
            match node.kind {
                SyntaxKind::MemberBody { member } => self.check_member(&owner, member)?,
                SyntaxKind::UsingStatement {
                    resource_type: Some(ty),
                }
                | SyntaxKind::LocalDeclaration {
                    declared_type: Some(ty),
                } => self.check_type(&owner, ty)?,
                _ => {}
            }
            for child in &node.children {
                let child_node = self.check_node(&owner, *child)?;
                if child_node.parent != Some(node.id) {
                    return Err(GraphError::ParentMismatch {
                        parent: node.id,
                        child: *child,
                    });
                }
            }
            if let Some(parent) = node.parent {
                let parent_node = self.check_node(&owner, parent)?;
                if !parent_node.children.contains(&node.id) {
                    return Err(GraphError::ParentMismatch {
                        parent,
                        child: node.id,
                    });
                }
            }
        }

        self.check_ancestry_terminates()
    }

    fn check_ancestry_terminates(&self) -> std::result::Result<(), GraphError> {
        for node in &self.nodes {
            let mut current = node.parent;
            let mut steps = 0;
            while let Some(parent) = current {
                steps += 1;
                if steps > self.nodes.len() {
                    return Err(GraphError::CyclicAncestry(node.id));
                }
                current = self.nodes[parent.index()].parent;
            }
        }
        Ok(())
    }

    fn check_type(&self, owner: &str, id: TypeId) -> std::result::Result<(), GraphError> {
        self.types
            .get(id.index())
            .map(|_| ())
            .ok_or_else(|| dangling(owner, "type", id.0))
    }

    fn check_member(&self, owner: &str, id: MemberId) -> std::result::Result<(), GraphError> {
        self.members
            .get(id.index())
            .map(|_| ())
            .ok_or_else(|| dangling(owner, "member", id.0))
    }

    fn check_node(&self, owner: &str, id: NodeId) -> std::result::Result<&SyntaxNode, GraphError> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| dangling(owner, "node", id.0))
    }
}

fn check_position(kind: &'static str, index: usize, id: usize) -> std::result::Result<(), GraphError> {
    if index == id {
        Ok(())
    } else {
        Err(GraphError::MisplacedId { kind, index, id })
    }
}

fn dangling(owner: &str, kind: &'static str, id: u32) -> GraphError {
    GraphError::DanglingReference {
        owner: owner.to_string(),
        kind,
        id,
    }
}

impl SymbolGraph for ProgramGraph {
    fn member(&self, id: MemberId) -> Option<&MemberSymbol> {
        self.members.get(id.index())
    }

    fn type_symbol(&self, id: TypeId) -> Option<&TypeSymbol> {
        self.types.get(id.index())
    }

    fn node(&self, id: NodeId) -> Option<&SyntaxNode> {
        self.nodes.get(id.index())
    }

    fn members(&self) -> Box<dyn Iterator<Item = &MemberSymbol> + '_> {
        Box::new(self.members.iter())
    }

    fn nodes(&self) -> Box<dyn Iterator<Item = &SyntaxNode> + '_> {
        Box::new(self.nodes.iter())
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
