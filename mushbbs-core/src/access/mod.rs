//! Access policy for boards and factions
//!
//! `AccessPolicy::access` walks the same four steps for every entity:
//!
//! 1. global override: `admin_level` strictly above the entity's threshold
//! 2. entity override ([`Guarded::check_override`])
//! 3. the lock defined for the requested kind, if any
//! 4. the entity's fallback ([`Guarded::fallback`], deny by default)

mod permissions;

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;
use crate::lock::{LockEvaluator, Locks};
use crate::models::{ActingIdentity, Board, Faction};
use crate::repo::FactionDirectory;

pub use permissions::{PermissionContext, PermissionResolver};

/// Faction permission and lock name that delegates board administration
pub const BBADMIN: &str = "bbadmin";

/// What the actor is trying to do
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Read,
    Post,
    Admin,
    Other(String),
}

impl AccessKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Read => "read",
            Self::Post => "post",
            Self::Admin => "admin",
            Self::Other(kind) => kind,
        }
    }
}

impl FromStr for AccessKind {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Ok(match lowered.as_str() {
            "read" => Self::Read,
            "post" => Self::Post,
            "admin" => Self::Admin,
            _ => Self::Other(lowered),
        })
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global admin thresholds; an actor passes when `admin_level > threshold`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub board_admin_threshold: i32,
    pub faction_admin_threshold: i32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            board_admin_threshold: 4,
            faction_admin_threshold: 3,
        }
    }
}

/// An entity protected by the access policy
#[async_trait]
pub trait Guarded: Send + Sync {
    fn locks(&self) -> &Locks;

    fn admin_threshold(&self, config: &AccessConfig) -> i32;

    /// Entity-specific grant evaluated after the global override
    async fn check_override(
        &self,
        policy: &AccessPolicy,
        actor: &ActingIdentity,
        kind: &AccessKind,
    ) -> Result<bool>;

    /// Decision when no lock is defined for `kind`
    async fn fallback(
        &self,
        _policy: &AccessPolicy,
        _actor: &ActingIdentity,
        _kind: &AccessKind,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Read-only policy engine, cheap to clone and share across tasks
#[derive(Clone)]
pub struct AccessPolicy {
    directory: Arc<dyn FactionDirectory>,
    evaluator: Arc<dyn LockEvaluator>,
    config: AccessConfig,
}

impl AccessPolicy {
    pub fn new(
        directory: Arc<dyn FactionDirectory>,
        evaluator: Arc<dyn LockEvaluator>,
        config: AccessConfig,
    ) -> Self {
        Self {
            directory,
            evaluator,
            config,
        }
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    pub fn directory(&self) -> &dyn FactionDirectory {
        self.directory.as_ref()
    }

    pub fn resolver(&self) -> PermissionResolver<'_> {
        PermissionResolver::new(self.directory.as_ref())
    }

    /// Evaluate a raw lock expression for `actor`
    pub async fn passes_lock(&self, expr: &str, actor: &ActingIdentity) -> Result<bool> {
        self.evaluator.evaluate(expr, actor).await
    }

    pub async fn access<G>(&self, entity: &G, actor: &ActingIdentity, kind: &AccessKind) -> Result<bool>
    where
        G: Guarded + ?Sized,
    {
        if actor.admin_level() > entity.admin_threshold(&self.config) {
            trace!(%kind, "granted by admin level");
            return Ok(true);
        }

        if entity.check_override(self, actor, kind).await? {
            trace!(%kind, "granted by entity override");
            return Ok(true);
        }

        if let Some(expr) = entity.locks().get(kind.as_str()) {
            return self.passes_lock(expr, actor).await;
        }

        entity.fallback(self, actor, kind).await
    }

    /// May `actor` administer boards in `faction` (or public boards when `None`)?
    ///
    /// Used both for board creation, where no board exists yet, and as the
    /// board override.
    pub async fn board_admin(&self, actor: &ActingIdentity, faction: Option<&Faction>) -> Result<bool> {
        if actor.admin_level() > self.config.board_admin_threshold {
            return Ok(true);
        }

        let Some(faction) = faction else {
            return Ok(false);
        };

        if self
            .resolver()
            .has_permission(faction, actor.character_id(), BBADMIN)
            .await?
        {
            return Ok(true);
        }

        match faction.locks.get(BBADMIN) {
            Some(expr) => self.passes_lock(expr, actor).await,
            None => Ok(false),
        }
    }

    pub async fn is_board_admin(&self, board: &Board, actor: &ActingIdentity) -> Result<bool> {
        self.access(board, actor, &AccessKind::Admin).await
    }
}

#[async_trait]
impl Guarded for Board {
    fn locks(&self) -> &Locks {
        &self.locks
    }

    fn admin_threshold(&self, config: &AccessConfig) -> i32 {
        config.board_admin_threshold
    }

    async fn check_override(
        &self,
        policy: &AccessPolicy,
        actor: &ActingIdentity,
        _kind: &AccessKind,
    ) -> Result<bool> {
        match self.faction_id {
            Some(id) => {
                let faction = policy.directory().get_faction(id).await?;
                policy.board_admin(actor, Some(&faction)).await
            }
            None => Ok(false),
        }
    }

    /// Without a read lock, anyone who may post may also read
    async fn fallback(
        &self,
        policy: &AccessPolicy,
        actor: &ActingIdentity,
        kind: &AccessKind,
    ) -> Result<bool> {
        if *kind != AccessKind::Read {
            return Ok(false);
        }
        match self.locks.get(AccessKind::Post.as_str()) {
            Some(expr) => policy.passes_lock(expr, actor).await,
            None => Ok(false),
        }
    }
}

#[async_trait]
impl Guarded for Faction {
    fn locks(&self) -> &Locks {
        &self.locks
    }

    fn admin_threshold(&self, config: &AccessConfig) -> i32 {
        config.faction_admin_threshold
    }

    async fn check_override(
        &self,
        policy: &AccessPolicy,
        actor: &ActingIdentity,
        kind: &AccessKind,
    ) -> Result<bool> {
        policy
            .resolver()
            .has_permission(self, actor.character_id(), kind.as_str())
            .await
    }
}
