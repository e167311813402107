// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

//! The read-only view of a program the engine works over.
//!
//! A front end resolves source into members, types and syntax nodes and hands
//! them over through [`SymbolGraph`]. Nothing in the engine mutates the graph;
//! every component borrows it for the length of an analysis session.

mod builder;
mod program;

pub use builder::ProgramGraphBuilder;
pub use program::ProgramGraph;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

macro_rules! graph_id {
    ($(#[$attr:meta])* $name:ident, $prefix:literal) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

graph_id!(
    /// Identity of a declared member
    MemberId,
    "member"
);
graph_id!(
    /// Identity of a declared type
    TypeId,
    "type"
);
graph_id!(
    /// Identity of a syntax node
    NodeId,
    "node"
);

/// Markers a front end may attach to members and types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marker {
    /// The member must stay allocation-free, and so must everything overriding
    /// or implementing it
    Restricted,
    /// Local opt-out from an inherited restriction
    IgnoreRestriction,
}

impl Marker {
    const ALL: [Marker; 2] = [Marker::Restricted, Marker::IgnoreRestriction];

    fn bit(self) -> u8 {
        match self {
            Marker::Restricted => 0b01,
            Marker::IgnoreRestriction => 0b10,
        }
    }
}

/// A small set of [`Marker`]s, serialized as a list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Marker>", into = "Vec<Marker>")]
pub struct MarkerSet {
    bits: u8,
}

impl MarkerSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, marker: Marker) -> Self {
        self.insert(marker);
        self
    }

    pub fn insert(&mut self, marker: Marker) {
        self.bits |= marker.bit();
    }

    pub fn contains(&self, marker: Marker) -> bool {
        self.bits & marker.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Marker> + '_ {
        Marker::ALL.into_iter().filter(|m| self.contains(*m))
    }
}

impl From<Vec<Marker>> for MarkerSet {
    fn from(markers: Vec<Marker>) -> Self {
        markers.into_iter().fold(MarkerSet::empty(), MarkerSet::with)
    }
}

impl From<MarkerSet> for Vec<Marker> {
    fn from(set: MarkerSet) -> Self {
        set.iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    Method,
    Constructor,
    Property {
        getter: Option<MemberId>,
        setter: Option<MemberId>,
    },
    PropertyGetter {
        property: MemberId,
    },
    PropertySetter {
        property: MemberId,
    },
    Field,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSymbol {
    pub id: MemberId,
    pub name: String,
    /// Canonical signature used for allowlist matching and diagnostics
    pub signature: String,
    pub declaring_type: TypeId,
    pub kind: MemberKind,
    #[serde(default)]
    pub markers: MarkerSet,
    /// The member this one overrides, if any
    #[serde(default)]
    pub overrides: Option<MemberId>,
    /// Interface members implemented by this one, in declaration order
    #[serde(default)]
    pub implements: Vec<MemberId>,
    /// Emitted by the compiler rather than written by the user
    #[serde(default)]
    pub synthesized: bool,
}

impl MemberSymbol {
    pub fn getter(&self) -> Option<MemberId> {
        match self.kind {
            MemberKind::Property { getter, .. } => getter,
            _ => None,
        }
    }

    /// The property an accessor belongs to
    pub fn owning_property(&self) -> Option<MemberId> {
        match self.kind {
            MemberKind::PropertyGetter { property } | MemberKind::PropertySetter { property } => {
                Some(property)
            }
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self.kind,
            MemberKind::Method
                | MemberKind::Constructor
                | MemberKind::PropertyGetter { .. }
                | MemberKind::PropertySetter { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSymbol {
    pub id: TypeId,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub base: Option<TypeId>,
    #[serde(default)]
    pub interfaces: Vec<TypeId>,
    /// Members declared directly on this type, compiler-synthesized ones included
    #[serde(default)]
    pub members: Vec<MemberId>,
    #[serde(default)]
    pub markers: MarkerSet,
}

impl TypeSymbol {
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyntaxKind {
    /// Root of a member's body; everything below belongs to `member`
    MemberBody { member: MemberId },
    /// A statement block; its children are statements in program order
    Block,
    /// Scoped resource acquisition with guaranteed release
    UsingStatement { resource_type: Option<TypeId> },
    LocalDeclaration { declared_type: Option<TypeId> },
    Invocation,
    ObjectCreation,
    MemberAccess,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxNode {
    pub id: NodeId,
    pub kind: SyntaxKind,
    #[serde(default)]
    pub parent: Option<NodeId>,
    /// Child nodes in program order
    #[serde(default)]
    pub children: Vec<NodeId>,
    /// What the front end resolved this node to. `None` for nodes that don't
    /// refer to a member, or that could not be resolved.
    #[serde(default)]
    pub symbol: Option<MemberId>,
    /// Source text, only used in diagnostics
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub location: Location,
}

/// Read-only queries the engine makes against a resolved program.
pub trait SymbolGraph: Send + Sync {
    fn member(&self, id: MemberId) -> Option<&MemberSymbol>;

    fn type_symbol(&self, id: TypeId) -> Option<&TypeSymbol>;

    fn node(&self, id: NodeId) -> Option<&SyntaxNode>;

    fn members(&self) -> Box<dyn Iterator<Item = &MemberSymbol> + '_>;

    fn nodes(&self) -> Box<dyn Iterator<Item = &SyntaxNode> + '_>;

    fn node_count(&self) -> usize;

    /// The member whose body lexically contains `node`
    fn enclosing_member(&self, node: NodeId) -> Option<MemberId> {
        let mut current = self.node(node)?;
        for _ in 0..=self.node_count() {
            if let SyntaxKind::MemberBody { member } = current.kind {
                return Some(member);
            }
            current = self.node(current.parent?)?;
        }
        None
    }

    /// Nodes below `root` in pre-order, not descending into nested member
    /// bodies and not including `root` itself.
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let Some(root) = self.node(root) else {
            return out;
        };

        let mut stack: Vec<NodeId> = root.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if out.len() > self.node_count() {
                break;
            }
            let Some(node) = self.node(id) else {
                continue;
            };
            if matches!(node.kind, SyntaxKind::MemberBody { .. }) {
                continue;
            }
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Distinct source files mentioned by syntax node locations
    fn source_files(&self) -> BTreeSet<PathBuf> {
        self.nodes()
            .map(|node| node.location.file.clone())
            .filter(|file| !file.as_os_str().is_empty())
            .collect()
    }
}
