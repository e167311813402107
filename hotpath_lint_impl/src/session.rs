// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use std::fmt;

use hotpath_common::project_context::ProjectContext;
use hotpath_lint_config::{AnalyzerConfig, Severity};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::allowlist::AllowlistStore;
use crate::classifier::{Classification, ExpressionClassifier};
use crate::diagnostics::{Diagnostic, DiagnosticEmitter};
use crate::error::EngineError;
use crate::graph::{MemberId, MemberSymbol, NodeId, SymbolGraph, SyntaxKind, SyntaxNode};
use crate::restriction::{RestrictionResolver, RestrictionVerdict};
use crate::safe_scope::SafeScopeDetector;
use crate::shape::{AllocationShape, ShapeCollection};

/// An engine failure tied to the member or node it happened on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalError {
    pub member: Option<MemberId>,
    pub node: Option<NodeId>,
    pub error: EngineError,
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.member, self.node) {
            (_, Some(node)) => write!(f, "while analyzing {node}: {}", self.error),
            (Some(member), None) => write!(f, "while resolving {member}: {}", self.error),
            (None, None) => write!(f, "{}", self.error),
        }
    }
}

/// Outcome of [`AnalysisSession::run`]
#[derive(Debug, Default)]
pub struct AnalysisReport {
    /// Ordered by location, then code
    pub diagnostics: Vec<Diagnostic>,
    pub internal_errors: Vec<InternalError>,
    pub nodes_visited: usize,
    /// Member bodies found restricted and walked
    pub restricted_bodies: usize,
}

impl AnalysisReport {
    /// True when the run should fail a build
    pub fn has_errors(&self) -> bool {
        !self.internal_errors.is_empty()
            || self
                .diagnostics
                .iter()
                .any(|diagnostic| diagnostic.severity == Severity::Error)
    }
}

#[derive(Default)]
struct BodyOutcome {
    restricted: bool,
    visited: usize,
    errors: Vec<InternalError>,
}

///
/// One analysis pass over one symbol graph.
///
/// Owns the allowlist, the verdict cache and the diagnostic sink, so
/// separate sessions never share state. Load the allowlist before calling
/// [`AnalysisSession::run`] or [`AnalysisSession::analyze_node`].
///
pub struct AnalysisSession<'g> {
    graph: &'g dyn SymbolGraph,
    allowlist_file_name: String,
    parallel: bool,
    allowlist: AllowlistStore,
    resolver: RestrictionResolver<'g>,
    scopes: SafeScopeDetector<'g>,
    emitter: DiagnosticEmitter,
    shapes: ShapeCollection,
}

impl<'g> AnalysisSession<'g> {
    pub fn new(graph: &'g dyn SymbolGraph, config: &AnalyzerConfig) -> Self {
        Self {
            graph,
            allowlist_file_name: config.allowlist_file_name.clone(),
            parallel: config.parallel,
            allowlist: AllowlistStore::with_entries(config.allowlist.iter().cloned()),
            resolver: RestrictionResolver::new(graph, config.max_resolution_depth),
            scopes: SafeScopeDetector::new(graph, config.safe_scope_type.clone()),
            emitter: DiagnosticEmitter::new(config),
            shapes: ShapeCollection::default(),
        }
    }

    pub fn allowlist(&self) -> &AllowlistStore {
        &self.allowlist
    }

    pub fn resolver(&self) -> &RestrictionResolver<'g> {
        &self.resolver
    }

    pub fn add_shape(&mut self, shape: Box<dyn AllocationShape>) -> &mut Self {
        self.shapes.push(shape);
        self
    }

    /// Locates the allowlist from the graph's source files and loads it
    pub fn load_allowlist(&self) {
        let context = ProjectContext::from_source_files(self.graph.source_files());
        self.load_allowlist_from(&context);
    }

    pub fn load_allowlist_from(&self, context: &ProjectContext) {
        self.allowlist.load_once(context, &self.allowlist_file_name);
    }

    ///
    /// Classifies a single node, reporting whatever it finds. Nodes whose
    /// enclosing member isn't restricted are skipped. Returns the number of
    /// diagnostics reported.
    ///
    pub fn analyze_node(&self, node: NodeId) -> Result<usize, EngineError> {
        let Some(member) = self.graph.enclosing_member(node) else {
            return Ok(0);
        };
        if self.resolver.is_restricted(member)? != RestrictionVerdict::Restricted {
            return Ok(0);
        }

        let node = self.graph.node(node).ok_or(EngineError::UnknownNode(node))?;
        self.inspect(node)
    }

    /// Walks every restricted member body and drains the diagnostics
    pub fn run(&self) -> AnalysisReport {
        let bodies: Vec<(MemberId, NodeId)> = self
            .graph
            .nodes()
            .filter_map(|node| match node.kind {
                SyntaxKind::MemberBody { member } => Some((member, node.id)),
                _ => None,
            })
            .collect();

        let outcomes: Vec<BodyOutcome> = if self.parallel {
            bodies
                .par_iter()
                .map(|(member, body)| self.visit_body(*member, *body))
                .collect()
        } else {
            bodies
                .iter()
                .map(|(member, body)| self.visit_body(*member, *body))
                .collect()
        };

        let mut report = AnalysisReport::default();
        for outcome in outcomes {
            report.nodes_visited += outcome.visited;
            report.restricted_bodies += usize::from(outcome.restricted);
            report.internal_errors.extend(outcome.errors);
        }

        report.diagnostics = self.emitter.take();
        report
            .diagnostics
            .sort_by(|a, b| a.location.cmp(&b.location).then_with(|| a.code.cmp(&b.code)));

        debug!(
            bodies = bodies.len(),
            restricted = report.restricted_bodies,
            visited = report.nodes_visited,
            diagnostics = report.diagnostics.len(),
            "analysis finished"
        );
        report
    }

    /// Members whose verdict is `Restricted`, in graph order. Members that
    /// fail to resolve are logged and left out.
    pub fn restricted_members(&self) -> Vec<&'g MemberSymbol> {
        let graph = self.graph;
        graph
            .members()
            .filter(|member| match self.resolver.is_restricted(member.id) {
                Ok(verdict) => verdict == RestrictionVerdict::Restricted,
                Err(error) => {
                    warn!(member = %member.id, %error, "could not resolve restriction");
                    false
                }
            })
            .collect()
    }

    fn visit_body(&self, member: MemberId, body: NodeId) -> BodyOutcome {
        let mut outcome = BodyOutcome::default();

        match self.resolver.is_restricted(member) {
            Ok(RestrictionVerdict::Restricted) => outcome.restricted = true,
            Ok(_) => return outcome,
            Err(error) => {
                warn!(member = %member, %error, "internal error, skipping member");
                outcome.errors.push(InternalError {
                    member: Some(member),
                    node: None,
                    error,
                });
                return outcome;
            }
        }

        for id in self.graph.descendants(body) {
            outcome.visited += 1;
            let result = self
                .graph
                .node(id)
                .ok_or(EngineError::UnknownNode(id))
                .and_then(|node| self.inspect(node));

            if let Err(error) = result {
                warn!(node = %id, %error, "internal error, skipping node");
                outcome.errors.push(InternalError {
                    member: Some(member),
                    node: Some(id),
                    error,
                });
            }
        }
        outcome
    }

    fn inspect(&self, node: &SyntaxNode) -> Result<usize, EngineError> {
        let classifier =
            ExpressionClassifier::new(self.graph, &self.allowlist, &self.resolver, &self.scopes);
        let mut reported = 0;

        match classifier.classify(node)? {
            Classification::Violation(rule) => {
                self.emitter
                    .report(node, self.signature_of(node), rule, &self.allowlist);
                reported += 1;
            }
            Classification::Unresolved => {
                debug!(node = %node.id, text = %node.text, "unresolved target, not classified");
            }
            Classification::Allowed => {}
        }

        if self.shapes.is_empty() {
            return Ok(reported);
        }

        let matched: Vec<&dyn AllocationShape> = self.shapes.matching(self.graph, node).collect();
        if matched.is_empty() || self.scopes.is_in_safe_scope(node.id)? {
            return Ok(reported);
        }
        for shape in matched {
            debug!(shape = %shape.name(), node = %node.id, "allocation shape matched");
            self.emitter
                .report(node, self.signature_of(node), shape.descriptor(), &self.allowlist);
            reported += 1;
        }
        Ok(reported)
    }

    fn signature_of<'n>(&self, node: &'n SyntaxNode) -> &'n str
    where
        'g: 'n,
    {
        let graph = self.graph;
        node.symbol
            .and_then(|id| graph.member(id))
            .map(|member| member.signature.as_str())
            .unwrap_or(node.text.as_str())
    }
}
