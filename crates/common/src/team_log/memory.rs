use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use super::provider::{ChainTip, ChainTipProvider, TeamLogError, TeamPoster};
use crate::sigchain::{LinkId, LinkType, Seqno};
use crate::team::{
    InnerLink, SecretBoxSet, SigMultiItem, SigMultiPayload, TeamId, TeamMembers,
};

/// A link as held by the in-memory log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedLink {
    pub seqno: Seqno,
    pub link_id: LinkId,
    pub link_type: LinkType,
    pub item: SigMultiItem,
    pub inner: InnerLink,
}

/// In-memory team log.
///
/// Accepts a submission only if every link verifies and extends the tip
/// of its chain at the moment of the write; a stale link fails the whole
/// submission with [`TeamLogError::Conflict`]. This is the server half of
/// the compare-and-swap that concurrent subteam creations race on.
#[derive(Debug, Clone)]
pub struct MemoryTeamLog {
    inner: Arc<RwLock<MemoryTeamLogInner>>,
}

#[derive(Debug, Default)]
struct MemoryTeamLogInner {
    /// team id -> links, in seqno order
    chains: HashMap<TeamId, Vec<LoggedLink>>,
    /// team id -> box sets, in generation order
    box_sets: HashMap<TeamId, Vec<SecretBoxSet>>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryTeamLogError {
    #[error("memory team log error: {0}")]
    Internal(String),
}

impl MemoryTeamLog {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryTeamLogInner::default())),
        }
    }

    /// The chain of a team, empty if it does not exist
    pub fn links(&self, id: &TeamId) -> Result<Vec<LoggedLink>, TeamLogError<MemoryTeamLogError>> {
        let inner = self.inner.read().map_err(|e| {
            TeamLogError::Provider(MemoryTeamLogError::Internal(format!(
                "failed to acquire read lock: {}",
                e
            )))
        })?;
        Ok(inner.chains.get(id).cloned().unwrap_or_default())
    }

    pub fn box_sets(
        &self,
        id: &TeamId,
    ) -> Result<Vec<SecretBoxSet>, TeamLogError<MemoryTeamLogError>> {
        let inner = self.inner.read().map_err(|e| {
            TeamLogError::Provider(MemoryTeamLogError::Internal(format!(
                "failed to acquire read lock: {}",
                e
            )))
        })?;
        Ok(inner.box_sets.get(id).cloned().unwrap_or_default())
    }
}

impl Default for MemoryTeamLog {
    fn default() -> Self {
        Self::new()
    }
}

type Staged = HashMap<TeamId, Vec<LoggedLink>>;

fn staged_tip(staged: &Staged, id: &TeamId) -> Option<(Seqno, LinkId)> {
    staged
        .get(id)
        .and_then(|links| links.last())
        .map(|link| (link.seqno, link.link_id))
}

fn check_item(
    staged: &Staged,
    item: &SigMultiItem,
) -> Result<LoggedLink, TeamLogError<MemoryTeamLogError>> {
    let tip = staged_tip(staged, &item.team_id);
    let is_head = matches!(item.link_type, LinkType::TeamRoot | LinkType::SubteamHead);

    match (is_head, tip) {
        (true, Some(_)) => {
            return Err(TeamLogError::Rejected(format!(
                "team {} already exists",
                item.team_id
            )));
        }
        (false, None) => return Err(TeamLogError::TeamNotFound(item.team_id)),
        _ => {}
    }

    let verified = item.verify(tip).map_err(|e| match e {
        crate::team::PayloadError::Link(crate::sigchain::LinkError::ChainMismatch(msg)) => {
            TeamLogError::Conflict(msg)
        }
        other => TeamLogError::Rejected(other.to_string()),
    })?;
    let inner = item
        .inner()
        .map_err(|e| TeamLogError::Rejected(e.to_string()))?;

    if item.link_type == LinkType::SubteamHead {
        check_parent(staged, item, &inner)?;
    }

    Ok(LoggedLink {
        seqno: verified.outer.seqno,
        link_id: verified.link_id,
        link_type: item.link_type,
        item: item.clone(),
        inner,
    })
}

/// A subteam head must point at the parent link registering it
fn check_parent(
    staged: &Staged,
    item: &SigMultiItem,
    inner: &InnerLink,
) -> Result<(), TeamLogError<MemoryTeamLogError>> {
    let parent = inner
        .team()
        .parent
        .as_ref()
        .ok_or_else(|| TeamLogError::Rejected("subteam head has no parent".to_string()))?;
    let registered = staged
        .get(&parent.id)
        .and_then(|links| links.iter().find(|link| link.seqno == parent.seqno))
        .filter(|link| link.link_type == LinkType::NewSubteam)
        .and_then(|link| link.inner.team().subteam.as_ref())
        .map(|subteam| subteam.id == item.team_id)
        .unwrap_or(false);
    if !registered {
        return Err(TeamLogError::Rejected(format!(
            "parent {} does not register subteam {} at seqno {}",
            parent.id, item.team_id, parent.seqno
        )));
    }
    Ok(())
}

/// Uids across every role list
fn member_uids(members: Option<&TeamMembers>) -> BTreeSet<&str> {
    members
        .map(|m| {
            m.owner
                .iter()
                .chain(&m.admin)
                .chain(&m.writer)
                .chain(&m.reader)
                .map(|uv| uv.uid.as_str())
                .collect()
        })
        .unwrap_or_default()
}

/// One box per member named by the link that introduces the key, and no others
fn check_boxes(
    box_set: &SecretBoxSet,
    introducing: &LoggedLink,
) -> Result<(), TeamLogError<MemoryTeamLogError>> {
    let members = member_uids(introducing.inner.team().members.as_ref());
    let boxed: BTreeSet<&str> = box_set.boxes.keys().map(String::as_str).collect();
    if boxed.is_empty() {
        return Err(TeamLogError::Rejected("box set has no boxes".to_string()));
    }
    if boxed != members {
        return Err(TeamLogError::Rejected(format!(
            "box set recipients {:?} do not match team members {:?}",
            boxed, members
        )));
    }
    Ok(())
}

#[async_trait]
impl ChainTipProvider for MemoryTeamLog {
    type Error = MemoryTeamLogError;

    async fn tip(&self, id: &TeamId) -> Result<ChainTip, TeamLogError<Self::Error>> {
        let inner = self.inner.read().map_err(|e| {
            TeamLogError::Provider(MemoryTeamLogError::Internal(format!(
                "failed to acquire read lock: {}",
                e
            )))
        })?;

        inner
            .chains
            .get(id)
            .and_then(|links| links.last())
            .map(|link| ChainTip {
                seqno: link.seqno,
                link_id: link.link_id,
            })
            .ok_or(TeamLogError::TeamNotFound(*id))
    }
}

#[async_trait]
impl TeamPoster for MemoryTeamLog {
    type Error = MemoryTeamLogError;

    async fn post(&self, payload: &SigMultiPayload) -> Result<(), TeamLogError<Self::Error>> {
        let mut inner = self.inner.write().map_err(|e| {
            TeamLogError::Provider(MemoryTeamLogError::Internal(format!(
                "failed to acquire write lock: {}",
                e
            )))
        })?;

        if payload.sigs.is_empty() {
            return Err(TeamLogError::Rejected("no links submitted".to_string()));
        }

        // Stage against copies of the touched chains; commit only if every
        //  link and the box set check out.
        let mut staged: Staged = HashMap::new();
        for item in &payload.sigs {
            if !staged.contains_key(&item.team_id) {
                let chain = inner.chains.get(&item.team_id).cloned().unwrap_or_default();
                staged.insert(item.team_id, chain);
            }
        }
        let mut introduced = Vec::new();
        for item in &payload.sigs {
            let logged = check_item(&staged, item)?;
            if let Some(ptk) = &logged.inner.team().per_team_key {
                introduced.push((ptk.generation, logged.clone()));
            }
            staged.entry(item.team_id).or_default().push(logged);
        }

        let box_team = match introduced.as_slice() {
            [(generation, link)] if *generation == payload.per_team_key.generation => {
                check_boxes(&payload.per_team_key, link)?;
                link.item.team_id
            }
            [(generation, _)] => {
                return Err(TeamLogError::Rejected(format!(
                    "box set generation {} does not match per-team key generation {}",
                    payload.per_team_key.generation, generation
                )));
            }
            _ => {
                return Err(TeamLogError::Rejected(
                    "a box set must accompany exactly one new per-team key".to_string(),
                ));
            }
        };

        for (team_id, chain) in staged {
            inner.chains.insert(team_id, chain);
        }
        inner
            .box_sets
            .entry(box_team)
            .or_default()
            .push(payload.per_team_key.clone());

        tracing::debug!(links = payload.sigs.len(), team_id = %box_team, "memory team log accepted submission");
        Ok(())
    }
}
