//! Opinions per theory and their Stats aggregates.
//!
//! The book is the only shared mutable state on the opinion side. Writers
//! recompute the theory's Stats before releasing the lock; readers clone the
//! snapshots they need and aggregate outside it.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use wikio_moderation::{ContentAccess, Level, PermissionTable, UserId};
use wikio_opinion::{
    analyze, point_distribution, OpinionAnalysis, OpinionConfig, OpinionSnapshot,
    PointDistribution, PopulationHistogram, Stats, StatsKind,
};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TheoryId(pub u64);

impl std::fmt::Display for TheoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "theory:{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Theory {
    author: Option<UserId>,
    details: String,
    deleted: bool,
    opinions: BTreeMap<UserId, OpinionSnapshot>,
    stats: Vec<Stats>,
}

impl Theory {
    /// Utilization is the number of opinions other than the actor's own.
    fn access(&self, actor: UserId) -> ContentAccess {
        ContentAccess {
            utilization: self.opinions.keys().filter(|&&u| u != actor).count() as u32,
            is_author: self.author == Some(actor),
        }
    }

    fn recalculate(&mut self, id: TheoryId, config: &OpinionConfig) {
        let opinions: Vec<OpinionSnapshot> = self.opinions.values().cloned().collect();
        self.stats = Stats::recalculate_all(&opinions, config);
        tracing::debug!(theory = %id, opinions = opinions.len(), "recalculated theory stats");
    }

    fn stats(&self, kind: StatsKind) -> Stats {
        self.stats
            .iter()
            .find(|s| s.kind == kind)
            .cloned()
            .unwrap_or_else(|| Stats::empty(kind))
    }
}

/// An opinion's numbers next to the aggregate it was compared with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionReport {
    pub theory: TheoryId,
    pub user: UserId,
    pub kind: StatsKind,
    pub analysis: OpinionAnalysis,
    pub distribution: PointDistribution,
}

pub struct OpinionBook {
    config: OpinionConfig,
    permissions: PermissionTable,
    theories: RwLock<HashMap<TheoryId, Theory>>,
}

impl OpinionBook {
    pub fn new(config: OpinionConfig, permissions: PermissionTable) -> Self {
        Self {
            config,
            permissions,
            theories: RwLock::new(HashMap::new()),
        }
    }

    /// Register a theory and who wrote it.
    pub async fn create_theory(&self, id: TheoryId, author: UserId) -> Result<()> {
        let mut theories = self.theories.write().await;
        if theories.contains_key(&id) {
            return Err(Error::InvalidInput(format!("{} already exists", id)));
        }
        theories.insert(
            id,
            Theory {
                author: Some(author),
                ..Theory::default()
            },
        );
        Ok(())
    }

    /// Replace `user`'s opinion on `theory` and refresh the Stats. Only the
    /// owner may write it.
    pub async fn submit(
        &self,
        theory: TheoryId,
        user: UserId,
        actor: UserId,
        actor_level: Level,
        opinion: OpinionSnapshot,
    ) -> Result<()> {
        self.permissions.require(
            self.permissions.can_edit_opinion(actor == user),
            actor_level,
            "edit another user's opinion",
        )?;
        let mut theories = self.theories.write().await;
        let entry = live_mut(&mut theories, theory)?;
        entry.opinions.insert(user, opinion);
        entry.recalculate(theory, &self.config);
        Ok(())
    }

    pub async fn remove(
        &self,
        theory: TheoryId,
        user: UserId,
        actor: UserId,
        actor_level: Level,
    ) -> Result<()> {
        self.permissions.require(
            self.permissions.can_edit_opinion(actor == user),
            actor_level,
            "remove another user's opinion",
        )?;
        let mut theories = self.theories.write().await;
        let entry = live_mut(&mut theories, theory)?;
        if entry.opinions.remove(&user).is_none() {
            return Err(Error::NotFound(format!("opinion of {} on {}", user, theory)));
        }
        entry.recalculate(theory, &self.config);
        Ok(())
    }

    /// Compare `user`'s opinion with the `kind` Stats of the theory.
    pub async fn analyze(&self, theory: TheoryId, user: UserId, kind: StatsKind) -> Result<OpinionReport> {
        let (opinion, stats) = {
            let theories = self.theories.read().await;
            let entry = theories
                .get(&theory)
                .ok_or_else(|| Error::NotFound(theory.to_string()))?;
            let opinion = entry
                .opinions
                .get(&user)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("opinion of {} on {}", user, theory)))?;
            (opinion, entry.stats(kind))
        };

        Ok(OpinionReport {
            theory,
            user,
            kind,
            analysis: analyze(&opinion, &stats.snapshot(), &self.config),
            distribution: point_distribution(&opinion),
        })
    }

    pub async fn stats(&self, theory: TheoryId, kind: StatsKind) -> Result<Stats> {
        let theories = self.theories.read().await;
        theories
            .get(&theory)
            .map(|entry| entry.stats(kind))
            .ok_or_else(|| Error::NotFound(theory.to_string()))
    }

    pub async fn histogram(&self, theory: TheoryId) -> Result<PopulationHistogram> {
        let theories = self.theories.read().await;
        let entry = theories
            .get(&theory)
            .ok_or_else(|| Error::NotFound(theory.to_string()))?;
        Ok(PopulationHistogram::from_opinions(entry.opinions.values()))
    }

    /// Invert the theory's title: every opinion swaps true and false.
    ///
    /// Counts as an edit of the theory, so the actor needs edit rights for
    /// its utilization (opinions other than their own).
    pub async fn swap_true_false(&self, theory: TheoryId, actor: UserId, actor_level: Level) -> Result<()> {
        let mut theories = self.theories.write().await;
        let entry = live_mut(&mut theories, theory)?;

        self.permissions.require(
            self.permissions.can_edit(actor_level, entry.access(actor)),
            actor_level,
            "swap true and false",
        )?;

        for opinion in entry.opinions.values_mut() {
            opinion.swap_true_false();
        }
        entry.recalculate(theory, &self.config);
        tracing::info!(%theory, %actor, "swapped true and false");
        Ok(())
    }

    /// Replace the theory's description.
    pub async fn edit_details(
        &self,
        theory: TheoryId,
        actor: UserId,
        actor_level: Level,
        details: String,
    ) -> Result<()> {
        self.permissions.require(
            self.permissions.can_edit_details(actor_level),
            actor_level,
            "edit details",
        )?;
        let mut theories = self.theories.write().await;
        live_mut(&mut theories, theory)?.details = details;
        tracing::debug!(%theory, %actor, "edited theory details");
        Ok(())
    }

    pub async fn details(&self, theory: TheoryId) -> Result<String> {
        let theories = self.theories.read().await;
        theories
            .get(&theory)
            .map(|entry| entry.details.clone())
            .ok_or_else(|| Error::NotFound(theory.to_string()))
    }

    /// Soft delete. Opinions and Stats are kept for a later restore.
    pub async fn delete_theory(&self, theory: TheoryId, actor: UserId, actor_level: Level) -> Result<()> {
        let mut theories = self.theories.write().await;
        let entry = live_mut(&mut theories, theory)?;
        self.permissions.require(
            self.permissions.can_delete(actor_level, entry.access(actor)),
            actor_level,
            "delete this theory",
        )?;
        entry.deleted = true;
        tracing::info!(%theory, %actor, "deleted theory");
        Ok(())
    }

    pub async fn restore_theory(&self, theory: TheoryId, actor: UserId, actor_level: Level) -> Result<()> {
        self.permissions.require(
            self.permissions.can_restore(actor_level),
            actor_level,
            "restore content",
        )?;
        let mut theories = self.theories.write().await;
        let entry = theories
            .get_mut(&theory)
            .ok_or_else(|| Error::NotFound(theory.to_string()))?;
        if !entry.deleted {
            return Err(Error::InvalidInput(format!("{} is not deleted", theory)));
        }
        entry.deleted = false;
        tracing::info!(%theory, %actor, "restored theory");
        Ok(())
    }
}

/// A theory that exists and is not deleted.
fn live_mut(theories: &mut HashMap<TheoryId, Theory>, id: TheoryId) -> Result<&mut Theory> {
    let entry = theories
        .get_mut(&id)
        .ok_or_else(|| Error::NotFound(id.to_string()))?;
    if entry.deleted {
        return Err(Error::InvalidInput(format!("{} is deleted", id)));
    }
    Ok(entry)
}
