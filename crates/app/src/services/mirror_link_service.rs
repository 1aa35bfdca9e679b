//! Mirror link service — use-cases for managing source→target mirror links.

use guildwarden_domain::error::{NotFoundError, StateConflictError, WardenError};
use guildwarden_domain::id::{ChannelId, CommunityId, LinkId};
use guildwarden_domain::mirror::MirrorLink;

use crate::ports::MirrorRepository;

/// Application service for mirror link CRUD operations.
pub struct MirrorLinkService<M> {
    repo: M,
}

impl<M: MirrorRepository> MirrorLinkService<M> {
    pub fn new(repo: M) -> Self {
        Self { repo }
    }

    /// Link `source` to `target`, syncing edits and deletes by default.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Validation`] when both channels are the same,
    /// [`WardenError::StateConflict`] when the pair is already linked, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn create_link(
        &self,
        community: CommunityId,
        source: ChannelId,
        target: ChannelId,
    ) -> Result<MirrorLink, WardenError> {
        let link = MirrorLink::new(community, source, target)?;
        let existing = self.repo.links_for_source(source).await?;
        if existing.iter().any(|l| l.target_channel == target) {
            return Err(StateConflictError {
                resource: "mirror_link",
                key: format!("{source}->{target}"),
                attempts: 1,
            }
            .into());
        }
        self.repo.create_link(link).await
    }

    /// # Errors
    ///
    /// Returns [`WardenError::NotFound`] for an unknown id, or a storage
    /// error.
    pub async fn get_link(&self, id: LinkId) -> Result<MirrorLink, WardenError> {
        self.repo.get_link(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "MirrorLink",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn list_links(&self, community: CommunityId) -> Result<Vec<MirrorLink>, WardenError> {
        self.repo.links_for_community(community).await
    }

    /// Choose whether edits and deletes of source messages reach the copies.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::NotFound`] for an unknown id, or a storage
    /// error.
    #[tracing::instrument(skip(self))]
    pub async fn set_sync(
        &self,
        id: LinkId,
        sync_edits: bool,
        sync_deletes: bool,
    ) -> Result<MirrorLink, WardenError> {
        let mut link = self.get_link(id).await?;
        link.sync_edits = sync_edits;
        link.sync_deletes = sync_deletes;
        self.repo.update_link(link).await
    }

    /// Remove a link together with its message mapping. Existing copies stay
    /// in the target channel.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::NotFound`] for an unknown id, or a storage
    /// error.
    #[tracing::instrument(skip(self))]
    pub async fn delete_link(&self, id: LinkId) -> Result<(), WardenError> {
        if self.repo.delete_link(id).await? {
            Ok(())
        } else {
            Err(NotFoundError {
                entity: "MirrorLink",
                id: id.to_string(),
            }
            .into())
        }
    }
}
