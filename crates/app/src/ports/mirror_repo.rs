//! Mirror repository port — links and the source → target message map.

use std::future::Future;
use std::sync::Arc;

use guildwarden_domain::error::WardenError;
use guildwarden_domain::id::{ChannelId, CommunityId, LinkId, MessageId};
use guildwarden_domain::mirror::MirrorLink;

/// Repository for [`MirrorLink`]s and their message id maps.
pub trait MirrorRepository {
    fn create_link(
        &self,
        link: MirrorLink,
    ) -> impl Future<Output = Result<MirrorLink, WardenError>> + Send;

    fn get_link(
        &self,
        id: LinkId,
    ) -> impl Future<Output = Result<Option<MirrorLink>, WardenError>> + Send;

    fn update_link(
        &self,
        link: MirrorLink,
    ) -> impl Future<Output = Result<MirrorLink, WardenError>> + Send;

    /// Delete a link together with its message map.
    fn delete_link(&self, id: LinkId) -> impl Future<Output = Result<bool, WardenError>> + Send;

    fn links_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<MirrorLink>, WardenError>> + Send;

    /// Links whose source is `channel`.
    fn links_for_source(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<Vec<MirrorLink>, WardenError>> + Send;

    /// Record `source → target`. Returns `false`, storing nothing, when the
    /// source is already mapped or the target already backs another source.
    fn insert_mapping(
        &self,
        link: LinkId,
        source: MessageId,
        target: MessageId,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send;

    fn target_for(
        &self,
        link: LinkId,
        source: MessageId,
    ) -> impl Future<Output = Result<Option<MessageId>, WardenError>> + Send;

    /// Remove and return the mapping for `source`.
    fn remove_mapping(
        &self,
        link: LinkId,
        source: MessageId,
    ) -> impl Future<Output = Result<Option<MessageId>, WardenError>> + Send;
}

impl<T: MirrorRepository + Send + Sync> MirrorRepository for Arc<T> {
    fn create_link(
        &self,
        link: MirrorLink,
    ) -> impl Future<Output = Result<MirrorLink, WardenError>> + Send {
        (**self).create_link(link)
    }

    fn get_link(
        &self,
        id: LinkId,
    ) -> impl Future<Output = Result<Option<MirrorLink>, WardenError>> + Send {
        (**self).get_link(id)
    }

    fn update_link(
        &self,
        link: MirrorLink,
    ) -> impl Future<Output = Result<MirrorLink, WardenError>> + Send {
        (**self).update_link(link)
    }

    fn delete_link(&self, id: LinkId) -> impl Future<Output = Result<bool, WardenError>> + Send {
        (**self).delete_link(id)
    }

    fn links_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<MirrorLink>, WardenError>> + Send {
        (**self).links_for_community(community)
    }

    fn links_for_source(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<Vec<MirrorLink>, WardenError>> + Send {
        (**self).links_for_source(channel)
    }

    fn insert_mapping(
        &self,
        link: LinkId,
        source: MessageId,
        target: MessageId,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send {
        (**self).insert_mapping(link, source, target)
    }

    fn target_for(
        &self,
        link: LinkId,
        source: MessageId,
    ) -> impl Future<Output = Result<Option<MessageId>, WardenError>> + Send {
        (**self).target_for(link, source)
    }

    fn remove_mapping(
        &self,
        link: LinkId,
        source: MessageId,
    ) -> impl Future<Output = Result<Option<MessageId>, WardenError>> + Send {
        (**self).remove_mapping(link, source)
    }
}
