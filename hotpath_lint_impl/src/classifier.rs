// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use crate::allowlist::AllowlistStore;
use crate::diagnostics::{RuleDescriptor, UNSAFE_METHOD_CALL, UNSAFE_PROPERTY_ACCESS};
use crate::error::EngineError;
use crate::graph::{MemberId, MemberKind, MemberSymbol, SymbolGraph, SyntaxKind, SyntaxNode};
use crate::restriction::{RestrictionResolver, RestrictionVerdict};
use crate::safe_scope::SafeScopeDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Allowed,
    /// The front end couldn't resolve the target. Neither flagged nor
    /// approved.
    Unresolved,
    Violation(&'static RuleDescriptor),
}

///
/// Decides whether a call or property access inside a restricted body may
/// allocate. Callers are expected to have checked that the node's enclosing
/// member is restricted.
///
/// For a resolved target, in order:
///
/// 1. an `IgnoreRestriction` target (or getter) is allowed;
/// 2. a restricted target (or getter) is allowed, since its own body is checked;
/// 3. auto-implemented properties and fields are allowed;
/// 4. allowlisted signatures are allowed;
/// 5. anything inside a safe scope is allowed;
/// 6. everything else is a violation.
///
pub struct ExpressionClassifier<'a> {
    graph: &'a dyn SymbolGraph,
    allowlist: &'a AllowlistStore,
    resolver: &'a RestrictionResolver<'a>,
    scopes: &'a SafeScopeDetector<'a>,
}

impl<'a> ExpressionClassifier<'a> {
    pub fn new(
        graph: &'a dyn SymbolGraph,
        allowlist: &'a AllowlistStore,
        resolver: &'a RestrictionResolver<'a>,
        scopes: &'a SafeScopeDetector<'a>,
    ) -> Self {
        Self {
            graph,
            allowlist,
            resolver,
            scopes,
        }
    }

    pub fn classify(&self, node: &SyntaxNode) -> Result<Classification, EngineError> {
        let rule = match node.kind {
            SyntaxKind::Invocation | SyntaxKind::ObjectCreation => &UNSAFE_METHOD_CALL,
            SyntaxKind::MemberAccess => &UNSAFE_PROPERTY_ACCESS,
            _ => return Ok(Classification::Allowed),
        };

        let Some(target_id) = node.symbol else {
            return Ok(Classification::Unresolved);
        };
        let target = self.member(target_id)?;

        let safe = match (&node.kind, &target.kind) {
            (SyntaxKind::MemberAccess, MemberKind::Property { getter, .. }) => {
                self.property_is_safe(node, target, *getter)?
            }
            // Some front ends resolve a property read straight to its getter
            (SyntaxKind::MemberAccess, MemberKind::PropertyGetter { property }) => {
                let owner = self.member(*property)?;
                self.property_is_safe(node, owner, Some(target.id))?
            }
            // Plain fields can't run user code. Method groups are judged at
            // the invocation that uses them.
            (SyntaxKind::MemberAccess, _) => true,
            (_, _) if target.is_callable() => self.call_is_safe(node, target)?,
            // Invoking something that isn't a method, e.g. a delegate field
            _ => true,
        };

        Ok(if safe {
            Classification::Allowed
        } else {
            Classification::Violation(rule)
        })
    }

    fn call_is_safe(&self, node: &SyntaxNode, target: &MemberSymbol) -> Result<bool, EngineError> {
        Ok(self.resolver.opts_out(target.id)?
            || self.is_restricted(target.id)?
            || self.allowlist.contains(&target.signature)
            || self.scopes.is_in_safe_scope(node.id)?)
    }

    fn property_is_safe(
        &self,
        node: &SyntaxNode,
        property: &MemberSymbol,
        getter: Option<MemberId>,
    ) -> Result<bool, EngineError> {
        if self.resolver.opts_out(property.id)? {
            return Ok(true);
        }
        if let Some(getter) = getter {
            if self.resolver.opts_out(getter)? {
                return Ok(true);
            }
        }

        if self.is_restricted(property.id)? {
            return Ok(true);
        }
        if let Some(getter) = getter {
            if self.is_restricted(getter)? {
                return Ok(true);
            }
        }

        Ok(self.is_auto_property(property, getter)?
            || self.allowlist.contains(&property.signature)
            || self.scopes.is_in_safe_scope(node.id)?)
    }

    fn is_restricted(&self, member: MemberId) -> Result<bool, EngineError> {
        Ok(self.resolver.is_restricted(member)? == RestrictionVerdict::Restricted)
    }

    /// A property is auto-implemented when its type declares a synthesized
    /// backing field named after it, or when its getter was synthesized.
    fn is_auto_property(
        &self,
        property: &MemberSymbol,
        getter: Option<MemberId>,
    ) -> Result<bool, EngineError> {
        let declaring = self
            .graph
            .type_symbol(property.declaring_type)
            .ok_or(EngineError::UnknownType(property.declaring_type))?;

        let pattern = format!("<{}>", property.name);
        for id in &declaring.members {
            let member = self.member(*id)?;
            if member.synthesized
                && member.kind == MemberKind::Field
                && member.name.contains(&pattern)
            {
                return Ok(true);
            }
        }

        match getter {
            Some(getter) => Ok(self.member(getter)?.synthesized),
            None => Ok(false),
        }
    }

    fn member(&self, id: MemberId) -> Result<&'a MemberSymbol, EngineError> {
        self.graph.member(id).ok_or(EngineError::UnknownMember(id))
    }
}
