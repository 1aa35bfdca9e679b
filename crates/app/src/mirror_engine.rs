//! Message mirror — copies messages from a source channel into a target
//! channel and keeps the copies in sync.
//!
//! The source→copy mapping is the idempotency key: a source message is
//! copied at most once per link, edits and deletes only touch mapped copies.

use std::sync::Arc;

use guildwarden_domain::error::{ExternalApiError, WardenError};
use guildwarden_domain::event::{Message, MessageEvent};
use guildwarden_domain::id::{MessageId, UserId};
use guildwarden_domain::mirror::{MirrorLink, MirrorPair, render_message, render_mirror};

use crate::executor::{Executor, is_side_effect_failure};
use crate::keyed::KeyedLocks;
use crate::ports::{MessagingApi, MirrorRepository};

/// Mirrors messages along every configured [`MirrorLink`].
pub struct MirrorEngine<M, P> {
    links: M,
    executor: Arc<Executor<P>>,
    pair_locks: KeyedLocks<MirrorPair>,
}

impl<M, P> MirrorEngine<M, P>
where
    M: MirrorRepository + Sync,
    P: MessagingApi + Sync,
{
    pub fn new(links: M, executor: Arc<Executor<P>>) -> Self {
        Self {
            links,
            executor,
            pair_locks: KeyedLocks::new(),
        }
    }

    /// Apply a message event to every link whose source is the event's
    /// channel. Returns how many copies were created, edited or deleted.
    ///
    /// A platform failure on one link is logged and the other links still
    /// run.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[tracing::instrument(skip(self, event), fields(channel = %event.channel()))]
    pub async fn handle(&self, event: &MessageEvent) -> Result<usize, WardenError> {
        let mut applied = 0;
        for link in self.links.links_for_source(event.channel()).await? {
            let result = match event {
                MessageEvent::Created(message) => {
                    self.on_create(&link, message).await.map(|c| c.is_some())
                }
                MessageEvent::Edited {
                    message,
                    author,
                    content,
                    ..
                } => self.on_edit(&link, *message, *author, content).await,
                MessageEvent::Deleted { message, .. } => self.on_delete(&link, *message).await,
            };
            match result {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(err) if is_side_effect_failure(&err) => {
                    tracing::warn!(link = %link.id, target = %link.target_channel, error = ?err, "mirror failed");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(applied)
    }

    /// Copy `message` into the link's target channel.
    ///
    /// Returns the copy's id, or `None` when nothing was posted: the
    /// message is bot-authored or already mirrored.
    ///
    /// # Errors
    ///
    /// Returns the platform error when posting fails, or a storage error.
    pub async fn on_create(
        &self,
        link: &MirrorLink,
        message: &Message,
    ) -> Result<Option<MessageId>, WardenError> {
        let _guard = self.pair_locks.lock(link.pair()).await;
        self.mirror_one(link, message).await
    }

    /// Propagate an edit of `source` to its copy. Returns whether a copy was
    /// edited.
    ///
    /// # Errors
    ///
    /// Returns the platform error when editing fails, or a storage error.
    pub async fn on_edit(
        &self,
        link: &MirrorLink,
        source: MessageId,
        author: UserId,
        content: &str,
    ) -> Result<bool, WardenError> {
        if !link.sync_edits {
            return Ok(false);
        }
        let _guard = self.pair_locks.lock(link.pair()).await;
        let Some(copy) = self.links.target_for(link.id, source).await? else {
            return Ok(false);
        };
        let body = render_mirror(author, link.source_channel, content, true);
        self.executor
            .edit_message(link.target_channel, copy, &body)
            .await?;
        tracing::debug!(link = %link.id, %source, %copy, "mirrored edit");
        Ok(true)
    }

    /// Delete the copy of `source` and forget the mapping. Returns whether a
    /// mapping was removed.
    ///
    /// # Errors
    ///
    /// Returns the platform error when deleting fails, or a storage error.
    pub async fn on_delete(&self, link: &MirrorLink, source: MessageId) -> Result<bool, WardenError> {
        if !link.sync_deletes {
            return Ok(false);
        }
        let _guard = self.pair_locks.lock(link.pair()).await;
        let Some(copy) = self.links.target_for(link.id, source).await? else {
            return Ok(false);
        };
        match self
            .executor
            .delete_message(link.target_channel, copy)
            .await
        {
            // Someone removed the copy by hand already.
            Ok(()) | Err(WardenError::ExternalApi(ExternalApiError::UnknownObject(_))) => {}
            Err(err) => return Err(err),
        }
        self.links.remove_mapping(link.id, source).await?;
        tracing::debug!(link = %link.id, %source, %copy, "mirrored delete");
        Ok(true)
    }

    /// Mirror up to `limit` of the most recent source messages, oldest
    /// first, skipping messages that already have a copy. Returns the number
    /// of copies created.
    ///
    /// # Errors
    ///
    /// Stops at the first platform or storage error.
    #[tracing::instrument(skip(self, link), fields(link = %link.id))]
    pub async fn backfill(&self, link: &MirrorLink, limit: usize) -> Result<usize, WardenError> {
        let _guard = self.pair_locks.lock(link.pair()).await;
        let mut history = self
            .executor
            .fetch_history(link.source_channel, limit)
            .await?;
        history.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut created = 0;
        for message in &history {
            if self.mirror_one(link, message).await?.is_some() {
                created += 1;
            }
        }
        tracing::info!(fetched = history.len(), created, "backfill finished");
        Ok(created)
    }

    async fn mirror_one(
        &self,
        link: &MirrorLink,
        message: &Message,
    ) -> Result<Option<MessageId>, WardenError> {
        if message.author_is_bot {
            return Ok(None);
        }
        if self.links.target_for(link.id, message.id).await?.is_some() {
            return Ok(None);
        }
        let copy = self
            .executor
            .send_message(link.target_channel, &render_message(message))
            .await?;
        if !self.links.insert_mapping(link.id, message.id, copy).await? {
            // Lost a race with another delivery of the same message.
            if let Err(err) = self.executor.delete_message(link.target_channel, copy).await {
                tracing::warn!(%copy, error = ?err, "failed to remove duplicate copy");
            }
            return Ok(None);
        }
        tracing::debug!(link = %link.id, source = %message.id, %copy, "mirrored message");
        Ok(Some(copy))
    }
}
