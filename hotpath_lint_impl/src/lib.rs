// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

//! Allocation analysis for restricted ("hot path") members.
//!
//! The engine works over a resolved [`graph::SymbolGraph`] produced by a
//! front end. It decides which members are restricted, walks their bodies and
//! reports calls and property accesses that may allocate.

pub mod allowlist;
pub mod classifier;
pub mod diagnostics;
mod error;
pub mod graph;
pub mod restriction;
pub mod safe_scope;
pub mod session;
pub mod shape;

// Re-export our public API
pub use allowlist::{AllowlistState, AllowlistStore};
pub use classifier::{Classification, ExpressionClassifier};
pub use diagnostics::{Diagnostic, DiagnosticEmitter, RuleDescriptor};
pub use error::{EngineError, GraphError};
pub use graph::{ProgramGraph, ProgramGraphBuilder, SymbolGraph};
pub use restriction::{RestrictionResolver, RestrictionVerdict};
pub use safe_scope::SafeScopeDetector;
pub use session::{AnalysisReport, AnalysisSession, InternalError};
pub use shape::{AllocationShape, ShapeCollection};
