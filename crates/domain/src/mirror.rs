//! Mirror links — keep a target channel in sync with a source channel.
//!
//! The source → target message id mapping is persisted alongside the link by
//! the mirror repository; it must stay injective (one mirrored copy per source
//! message, never two sources on the same copy).

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, WardenError};
use crate::event::Message;
use crate::id::{ChannelId, CommunityId, LinkId, UserId};

/// Upper bound on mirrored message length accepted by the platform.
pub const MAX_MIRROR_LEN: usize = 2000;

/// A configured (source, target) channel pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorLink {
    pub id: LinkId,
    pub community: CommunityId,
    pub source_channel: ChannelId,
    pub target_channel: ChannelId,
    pub sync_edits: bool,
    pub sync_deletes: bool,
}

/// Ordering key: operations for the same pair run one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MirrorPair {
    pub source: ChannelId,
    pub target: ChannelId,
}

impl MirrorLink {
    /// Create a link that syncs edits and deletes.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SameChannel`] when source and target match.
    pub fn new(
        community: CommunityId,
        source_channel: ChannelId,
        target_channel: ChannelId,
    ) -> Result<Self, WardenError> {
        let link = Self {
            id: LinkId::new(),
            community,
            source_channel,
            target_channel,
            sync_edits: true,
            sync_deletes: true,
        };
        link.validate()?;
        Ok(link)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SameChannel`] when source and target match.
    pub fn validate(&self) -> Result<(), WardenError> {
        if self.source_channel == self.target_channel {
            return Err(ValidationError::SameChannel.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn pair(&self) -> MirrorPair {
        MirrorPair {
            source: self.source_channel,
            target: self.target_channel,
        }
    }
}

/// Render the body of a mirrored copy.
///
/// The attribution line names the author and source channel; edited copies
/// carry an `(edited)` marker. Output is clipped to [`MAX_MIRROR_LEN`].
#[must_use]
pub fn render_mirror(
    author: UserId,
    source_channel: ChannelId,
    content: &str,
    edited: bool,
) -> String {
    let body = if content.trim().is_empty() {
        "*[no text content]*"
    } else {
        content
    };
    let marker = if edited { " (edited)" } else { "" };
    let footer = format!("\n-# mirrored from <#{source_channel}> by <@{author}>{marker}");
    let budget = MAX_MIRROR_LEN.saturating_sub(footer.chars().count());
    let mut clipped: String = body.chars().take(budget).collect();
    clipped.push_str(&footer);
    clipped
}

/// Render a freshly created source message.
#[must_use]
pub fn render_message(message: &Message) -> String {
    render_mirror(message.author, message.channel, &message.content, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_reject_link_onto_same_channel() {
        let result = MirrorLink::new(CommunityId::new(1), ChannelId::new(2), ChannelId::new(2));
        assert!(matches!(
            result,
            Err(WardenError::Validation(ValidationError::SameChannel))
        ));
    }

    #[test]
    fn should_sync_edits_and_deletes_by_default() {
        let link = MirrorLink::new(CommunityId::new(1), ChannelId::new(2), ChannelId::new(3)).unwrap();
        assert!(link.sync_edits);
        assert!(link.sync_deletes);
        assert_eq!(link.pair().target, ChannelId::new(3));
    }

    #[test]
    fn should_attribute_author_and_mark_edits() {
        let text = render_mirror(UserId::new(9), ChannelId::new(4), "hi", true);
        assert!(text.starts_with("hi\n"));
        assert!(text.contains("<#4>"));
        assert!(text.contains("<@9>"));
        assert!(text.ends_with("(edited)"));
    }

    #[test]
    fn should_clip_long_content_to_platform_limit() {
        let long = "x".repeat(5000);
        let text = render_mirror(UserId::new(9), ChannelId::new(4), &long, false);
        assert_eq!(text.chars().count(), MAX_MIRROR_LEN);
    }

    #[test]
    fn should_render_placeholder_for_empty_content() {
        let text = render_mirror(UserId::new(9), ChannelId::new(4), "", false);
        assert!(text.starts_with("*[no text content]*"));
    }
}
