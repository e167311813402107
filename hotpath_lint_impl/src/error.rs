// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use thiserror::Error;

use crate::graph::{MemberId, NodeId, TypeId};

/// Internal inconsistencies hit while classifying a single node or member.
///
/// These are never user-facing violations; a session records them and keeps
/// going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("restriction resolution for {member} exceeded the depth limit of {limit}")]
    ResolutionDepthExceeded { member: MemberId, limit: usize },

    #[error("{0} is not present in the symbol graph")]
    UnknownMember(MemberId),

    #[error("{0} is not present in the symbol graph")]
    UnknownType(TypeId),

    #[error("{0} is not present in the symbol graph")]
    UnknownNode(NodeId),

    #[error("lexical ancestry of {0} does not reach a root")]
    UnterminatedAncestry(NodeId),
}

/// Structural problems found while building a [`crate::graph::ProgramGraph`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("{kind} at index {index} carries id {id}; ids must match their position")]
    MisplacedId {
        kind: &'static str,
        index: usize,
        id: usize,
    },

    #[error("{owner} references unknown {kind} #{id}")]
    DanglingReference {
        owner: String,
        kind: &'static str,
        id: u32,
    },

    #[error("{child} and {parent} disagree about their parent/child link")]
    ParentMismatch { parent: NodeId, child: NodeId },

    #[error("ancestry of {0} loops back on itself")]
    CyclicAncestry(NodeId),
}
