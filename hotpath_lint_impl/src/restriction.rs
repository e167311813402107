// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

//! Decides which members must stay allocation-free.
//!
//! A restriction flows downward: from an interface member to its
//! implementations, from a virtual member to its overrides, from a property to
//! its accessors and from a marked type to the members it declares. An
//! `IgnoreRestriction` marker exempts the member carrying it and nothing else;
//! anything overriding an exempted member still inherits from above it.

use dashmap::DashMap;

use crate::error::EngineError;
use crate::graph::{Marker, MemberId, MemberSymbol, SymbolGraph, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestrictionVerdict {
    Restricted,
    NotRestricted,
    ExplicitlyIgnored,
}

/// A cached verdict and how many levels of ancestors its search walked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Resolved {
    verdict: RestrictionVerdict,
    reach: usize,
}

/// Where a member may inherit its restriction from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Member(MemberId),
    Type(TypeId),
}

pub struct RestrictionResolver<'g> {
    graph: &'g dyn SymbolGraph,
    max_depth: usize,
    // Verdicts are published whole and the first writer wins, so concurrent
    // resolution of the same member can only ever waste work. Each entry keeps
    // its reach so a cached answer hits the depth cap exactly where a fresh
    // search would.
    verdicts: DashMap<MemberId, Resolved>,
}

impl<'g> RestrictionResolver<'g> {
    pub fn new(graph: &'g dyn SymbolGraph, max_depth: usize) -> Self {
        Self {
            graph,
            max_depth,
            verdicts: DashMap::new(),
        }
    }

    /// Resolves `member`. A depth overflow is reported against `member`
    /// itself, whichever ancestor hit the cap.
    pub fn is_restricted(&self, member: MemberId) -> Result<RestrictionVerdict, EngineError> {
        match self.verdict(member, 0) {
            Ok(resolved) => Ok(resolved.verdict),
            Err(EngineError::ResolutionDepthExceeded { limit, .. }) => {
                Err(EngineError::ResolutionDepthExceeded { member, limit })
            }
            Err(error) => Err(error),
        }
    }

    /// True when `member` itself carries `IgnoreRestriction`
    pub fn opts_out(&self, member: MemberId) -> Result<bool, EngineError> {
        Ok(self
            .symbol(member)?
            .markers
            .contains(Marker::IgnoreRestriction))
    }

    /// Number of verdicts computed so far in this session
    pub fn cached(&self) -> usize {
        self.verdicts.len()
    }

    fn symbol(&self, member: MemberId) -> Result<&'g MemberSymbol, EngineError> {
        self.graph
            .member(member)
            .ok_or(EngineError::UnknownMember(member))
    }

    fn check_depth(&self, member: MemberId, depth: usize) -> Result<(), EngineError> {
        if depth > self.max_depth {
            return Err(EngineError::ResolutionDepthExceeded {
                member,
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn verdict(&self, member: MemberId, depth: usize) -> Result<Resolved, EngineError> {
        if let Some(cached) = self.verdicts.get(&member).map(|entry| *entry) {
            self.check_depth(member, depth + cached.reach)?;
            return Ok(cached);
        }
        self.check_depth(member, depth)?;

        let symbol = self.symbol(member)?;
        let resolved = if symbol.markers.contains(Marker::IgnoreRestriction) {
            Resolved {
                verdict: RestrictionVerdict::ExplicitlyIgnored,
                reach: 0,
            }
        } else {
            let (restricted, reach) = self.inherits(symbol, depth)?;
            Resolved {
                verdict: if restricted {
                    RestrictionVerdict::Restricted
                } else {
                    RestrictionVerdict::NotRestricted
                },
                reach,
            }
        };

        Ok(*self.verdicts.entry(member).or_insert(resolved))
    }

    /// Whether `symbol` is restricted by its own marker or by anything above
    /// it, disregarding its own opt-out. Also returns how many levels above
    /// `symbol` the search looked.
    fn inherits(&self, symbol: &MemberSymbol, depth: usize) -> Result<(bool, usize), EngineError> {
        self.check_depth(symbol.id, depth)?;

        if symbol.markers.contains(Marker::Restricted) {
            return Ok((true, 0));
        }

        let mut reach = 0;
        for origin in origins(symbol) {
            let inherited = match origin {
                Origin::Member(parent) => {
                    let resolved = self.verdict(parent, depth + 1)?;
                    reach = reach.max(resolved.reach + 1);
                    match resolved.verdict {
                        RestrictionVerdict::Restricted => true,
                        // The parent's opt-out is its own business
                        RestrictionVerdict::ExplicitlyIgnored => {
                            let (restricted, above) =
                                self.inherits(self.symbol(parent)?, depth + 1)?;
                            reach = reach.max(above + 1);
                            restricted
                        }
                        RestrictionVerdict::NotRestricted => false,
                    }
                }
                Origin::Type(ty) => self
                    .graph
                    .type_symbol(ty)
                    .ok_or(EngineError::UnknownType(ty))?
                    .markers
                    .contains(Marker::Restricted),
            };
            if inherited {
                return Ok((true, reach));
            }
        }

        Ok((false, reach))
    }
}

/// Search order: the overridden member, implemented interface members in
/// declaration order, the owning property of an accessor, the declaring type.
fn origins(symbol: &MemberSymbol) -> impl Iterator<Item = Origin> + '_ {
    symbol
        .overrides
        .into_iter()
        .chain(symbol.implements.iter().copied())
        .chain(symbol.owning_property())
        .map(Origin::Member)
        .chain(std::iter::once(Origin::Type(symbol.declaring_type)))
}
