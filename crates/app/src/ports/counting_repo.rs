//! Counting repository port — per-channel state with optimistic concurrency.

use std::future::Future;
use std::sync::Arc;

use guildwarden_domain::counting::CountingState;
use guildwarden_domain::error::WardenError;
use guildwarden_domain::id::{ChannelId, CommunityId};

/// Repository for [`CountingState`].
pub trait CountingRepository {
    fn get(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<Option<CountingState>, WardenError>> + Send;

    /// Write `state` only if the stored version still equals
    /// `expected_version` (`0` means "not stored yet").
    ///
    /// Returns `false` without writing when another writer got there first.
    fn save_if_version(
        &self,
        state: CountingState,
        expected_version: u64,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send;

    fn list_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<CountingState>, WardenError>> + Send;

    fn delete(&self, channel: ChannelId) -> impl Future<Output = Result<bool, WardenError>> + Send;
}

impl<T: CountingRepository + Send + Sync> CountingRepository for Arc<T> {
    fn get(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<Option<CountingState>, WardenError>> + Send {
        (**self).get(channel)
    }

    fn save_if_version(
        &self,
        state: CountingState,
        expected_version: u64,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send {
        (**self).save_if_version(state, expected_version)
    }

    fn list_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<CountingState>, WardenError>> + Send {
        (**self).list_for_community(community)
    }

    fn delete(&self, channel: ChannelId) -> impl Future<Output = Result<bool, WardenError>> + Send {
        (**self).delete(channel)
    }
}
