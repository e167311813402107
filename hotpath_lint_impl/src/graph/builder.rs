// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use std::path::PathBuf;

use super::{
    Location, Marker, MarkerSet, MemberId, MemberKind, MemberSymbol, NodeId, ProgramGraph,
    SyntaxKind, SyntaxNode, TypeId, TypeSymbol,
};
use crate::error::GraphError;

///
/// Assembles a [`ProgramGraph`] by hand. Used when embedding the engine behind
/// a front end that doesn't serialize, and throughout the tests.
///
/// Every syntax node gets its own line in the current source file so
/// diagnostics stay distinguishable.
///
#[derive(Debug)]
pub struct ProgramGraphBuilder {
    types: Vec<TypeSymbol>,
    members: Vec<MemberSymbol>,
    nodes: Vec<SyntaxNode>,
    source_file: PathBuf,
    next_line: u32,
}

impl Default for ProgramGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramGraphBuilder {
    pub fn new() -> Self {
        Self {
            types: Vec::new(),
            members: Vec::new(),
            nodes: Vec::new(),
            source_file: PathBuf::from("Program.cs"),
            next_line: 1,
        }
    }

    /// Nodes added from now on are located in `path`
    pub fn source_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.source_file = path.into();
        self
    }

    // Types

    pub fn add_type(&mut self, namespace: &str, name: &str) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeSymbol {
            id,
            name: name.to_string(),
            namespace: namespace.to_string(),
            base: None,
            interfaces: Vec::new(),
            members: Vec::new(),
            markers: MarkerSet::empty(),
        });
        id
    }

    pub fn set_base(&mut self, ty: TypeId, base: TypeId) -> &mut Self {
        self.types[ty.index()].base = Some(base);
        self
    }

    pub fn implement_interface(&mut self, ty: TypeId, interface: TypeId) -> &mut Self {
        self.types[ty.index()].interfaces.push(interface);
        self
    }

    pub fn mark_type(&mut self, ty: TypeId, marker: Marker) -> &mut Self {
        self.types[ty.index()].markers.insert(marker);
        self
    }

    // Members

    fn push_member(&mut self, ty: TypeId, name: &str, signature: String, kind: MemberKind, synthesized: bool) -> MemberId {
        let id = MemberId(self.members.len() as u32);
        self.members.push(MemberSymbol {
            id,
            name: name.to_string(),
            signature,
            declaring_type: ty,
            kind,
            markers: MarkerSet::empty(),
            overrides: None,
            implements: Vec::new(),
            synthesized,
        });
        self.types[ty.index()].members.push(id);
        id
    }

    fn default_signature(&self, ty: TypeId, name: &str) -> String {
        format!("{}.{}", self.types[ty.index()].qualified_name(), name)
    }

    pub fn add_method(&mut self, ty: TypeId, name: &str) -> MemberId {
        let signature = self.default_signature(ty, name);
        self.push_member(ty, name, signature, MemberKind::Method, false)
    }

    pub fn add_constructor(&mut self, ty: TypeId) -> MemberId {
        let signature = self.default_signature(ty, ".ctor");
        self.push_member(ty, ".ctor", signature, MemberKind::Constructor, false)
    }

    pub fn add_field(&mut self, ty: TypeId, name: &str) -> MemberId {
        let signature = self.default_signature(ty, name);
        self.push_member(ty, name, signature, MemberKind::Field, false)
    }

    /// A property with a user-written getter
    pub fn add_property(&mut self, ty: TypeId, name: &str) -> MemberId {
        self.push_property(ty, name, false)
    }

    /// A property whose getter and backing field the compiler generated
    pub fn add_auto_property(&mut self, ty: TypeId, name: &str) -> MemberId {
        let backing = format!("<{name}>k__BackingField");
        let signature = self.default_signature(ty, &backing);
        self.push_member(ty, &backing, signature, MemberKind::Field, true);
        self.push_property(ty, name, true)
    }

    fn push_property(&mut self, ty: TypeId, name: &str, synthesized_getter: bool) -> MemberId {
        let signature = self.default_signature(ty, name);
        let property = self.push_member(
            ty,
            name,
            signature,
            MemberKind::Property {
                getter: None,
                setter: None,
            },
            false,
        );

        let getter_name = format!("get_{name}");
        let getter_signature = self.default_signature(ty, &getter_name);
        let getter = self.push_member(
            ty,
            &getter_name,
            getter_signature,
            MemberKind::PropertyGetter { property },
            synthesized_getter,
        );
        self.members[property.index()].kind = MemberKind::Property {
            getter: Some(getter),
            setter: None,
        };
        property
    }

    pub fn getter(&self, property: MemberId) -> Option<MemberId> {
        self.members.get(property.index()).and_then(MemberSymbol::getter)
    }

    pub fn set_signature(&mut self, member: MemberId, signature: &str) -> &mut Self {
        self.members[member.index()].signature = signature.to_string();
        self
    }

    pub fn mark(&mut self, member: MemberId, marker: Marker) -> &mut Self {
        self.members[member.index()].markers.insert(marker);
        self
    }

    pub fn set_overrides(&mut self, member: MemberId, base: MemberId) -> &mut Self {
        self.members[member.index()].overrides = Some(base);
        self
    }

    pub fn add_implements(&mut self, member: MemberId, interface_member: MemberId) -> &mut Self {
        self.members[member.index()].implements.push(interface_member);
        self
    }

    /// Links a property override and, where both sides have one, its getter
    pub fn override_property(&mut self, property: MemberId, base: MemberId) -> &mut Self {
        self.set_overrides(property, base);
        if let (Some(getter), Some(base_getter)) = (self.getter(property), self.getter(base)) {
            self.set_overrides(getter, base_getter);
        }
        self
    }

    /// Links a property to the interface property it implements, getters included
    pub fn implement_property(&mut self, property: MemberId, interface_property: MemberId) -> &mut Self {
        self.add_implements(property, interface_property);
        if let (Some(getter), Some(interface_getter)) =
            (self.getter(property), self.getter(interface_property))
        {
            self.add_implements(getter, interface_getter);
        }
        self
    }

    // Syntax

    pub fn add_node(
        &mut self,
        parent: Option<NodeId>,
        kind: SyntaxKind,
        symbol: Option<MemberId>,
        text: &str,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let location = Location {
            file: self.source_file.clone(),
            line: self.next_line,
            column: 1,
        };
        self.next_line += 1;

        self.nodes.push(SyntaxNode {
            id,
            kind,
            parent,
            children: Vec::new(),
            symbol,
            text: text.to_string(),
            location,
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    /// Gives `member` a body and returns the body's top-level block
    pub fn body(&mut self, member: MemberId) -> NodeId {
        let name = self.members[member.index()].name.clone();
        let root = self.add_node(None, SyntaxKind::MemberBody { member }, None, &name);
        self.add_node(Some(root), SyntaxKind::Block, None, "{ }")
    }

    pub fn block(&mut self, parent: NodeId) -> NodeId {
        self.add_node(Some(parent), SyntaxKind::Block, None, "{ }")
    }

    pub fn statement(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.add_node(Some(parent), SyntaxKind::Other, None, text)
    }

    pub fn invocation(&mut self, parent: NodeId, target: Option<MemberId>, text: &str) -> NodeId {
        self.add_node(Some(parent), SyntaxKind::Invocation, target, text)
    }

    pub fn object_creation(&mut self, parent: NodeId, constructor: Option<MemberId>, text: &str) -> NodeId {
        self.add_node(Some(parent), SyntaxKind::ObjectCreation, constructor, text)
    }

    pub fn member_access(&mut self, parent: NodeId, target: Option<MemberId>, text: &str) -> NodeId {
        self.add_node(Some(parent), SyntaxKind::MemberAccess, target, text)
    }

    pub fn local_declaration(&mut self, parent: NodeId, declared_type: Option<TypeId>, text: &str) -> NodeId {
        self.add_node(Some(parent), SyntaxKind::LocalDeclaration { declared_type }, None, text)
    }

    pub fn using_statement(&mut self, parent: NodeId, resource_type: Option<TypeId>, text: &str) -> NodeId {
        self.add_node(Some(parent), SyntaxKind::UsingStatement { resource_type }, None, text)
    }

    pub fn build(self) -> Result<ProgramGraph, GraphError> {
        ProgramGraph::from_parts(self.types, self.members, self.nodes)
    }
}
