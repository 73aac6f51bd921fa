//! Lock evaluation against an acting identity

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{LockExpr, LockFn};
use crate::access::{PermissionContext, PermissionResolver};
use crate::error::{BbsError, Result};
use crate::models::ActingIdentity;
use crate::repo::FactionDirectory;

/// Evaluates a lock expression for an actor
#[async_trait]
pub trait LockEvaluator: Send + Sync {
    async fn evaluate(&self, expr: &str, actor: &ActingIdentity) -> Result<bool>;
}

/// Everything a compiled expression can ask about the actor.
///
/// Faction standing is resolved up front so evaluation itself is pure.
#[derive(Debug, Clone)]
pub struct LockFacts<'a> {
    actor: &'a ActingIdentity,
    /// Lower-cased abbreviation -> standing (`None`: not a member or no such faction)
    factions: HashMap<String, Option<PermissionContext>>,
}

impl<'a> LockFacts<'a> {
    pub fn new(actor: &'a ActingIdentity) -> Self {
        Self {
            actor,
            factions: HashMap::new(),
        }
    }

    pub fn with_faction(mut self, abbreviation: &str, standing: Option<PermissionContext>) -> Self {
        self.factions.insert(abbreviation.to_lowercase(), standing);
        self
    }

    fn standing(&self, abbreviation: &str) -> Option<&PermissionContext> {
        self.factions
            .get(&abbreviation.to_lowercase())
            .and_then(Option::as_ref)
    }

    pub fn eval(&self, expr: &LockExpr) -> bool {
        match expr {
            LockExpr::Call(func) => self.call(func),
            LockExpr::Not(inner) => !self.eval(inner),
            LockExpr::And(a, b) => self.eval(a) && self.eval(b),
            LockExpr::Or(a, b) => self.eval(a) || self.eval(b),
        }
    }

    fn call(&self, func: &LockFn) -> bool {
        match func {
            LockFn::All => true,
            LockFn::None => false,
            LockFn::Admin(level) => self.actor.admin_level() >= *level,
            LockFn::User(name) => self.actor.user.username.to_lowercase() == name.to_lowercase(),
            LockFn::Name(name) => {
                self.actor.character.name.to_lowercase() == name.to_lowercase()
            }
            LockFn::Id(id) => self.actor.character_id() == *id,
            LockFn::Faction(abbr) => self.standing(abbr).is_some(),
            LockFn::Rank(abbr, rank) => self.standing(abbr).is_some_and(|ctx| ctx.rank <= *rank),
            LockFn::FactionPerm(abbr, perm) => {
                self.standing(abbr).is_some_and(|ctx| ctx.allows(perm))
            }
        }
    }
}

/// Stock evaluator backed by the faction directory
#[derive(Clone)]
pub struct ExpressionEvaluator {
    directory: Arc<dyn FactionDirectory>,
}

impl ExpressionEvaluator {
    pub fn new(directory: Arc<dyn FactionDirectory>) -> Self {
        Self { directory }
    }

    async fn facts<'a>(
        &self,
        expr: &LockExpr,
        actor: &'a ActingIdentity,
    ) -> Result<LockFacts<'a>> {
        let resolver = PermissionResolver::new(self.directory.as_ref());
        let mut facts = LockFacts::new(actor);

        for abbr in expr.factions() {
            let standing = match self.directory.find_faction_by_abbreviation(&abbr).await {
                Ok(faction) => resolver.resolve(&faction, actor.character_id()).await?,
                Err(BbsError::NotFound { .. }) => {
                    debug!(faction = %abbr, "lock references unknown faction");
                    None
                }
                Err(e) => return Err(e),
            };
            facts = facts.with_faction(&abbr, standing);
        }

        Ok(facts)
    }
}

#[async_trait]
impl LockEvaluator for ExpressionEvaluator {
    async fn evaluate(&self, expr: &str, actor: &ActingIdentity) -> Result<bool> {
        let compiled = match LockExpr::parse(expr) {
            Ok(compiled) => compiled,
            Err(e) => {
                warn!(lock_len = expr.len(), error = %e, "unparseable lock denies access");
                return Ok(false);
            }
        };

        let facts = self.facts(&compiled, actor).await?;
        Ok(facts.eval(&compiled))
    }
}
