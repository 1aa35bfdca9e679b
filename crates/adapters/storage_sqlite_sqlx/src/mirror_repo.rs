//! `SQLite` implementation of [`MirrorRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use guildwarden_app::ports::MirrorRepository;
use guildwarden_domain::error::{StateConflictError, WardenError};
use guildwarden_domain::id::{ChannelId, CommunityId, LinkId, MessageId};
use guildwarden_domain::mirror::MirrorLink;

use crate::codec::{from_snowflake, snowflake};
use crate::error::{StorageError, is_unique_violation};

struct Wrapper(MirrorLink);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        Ok(Self(MirrorLink {
            id: LinkId::from_uuid(id),
            community: from_snowflake(row.try_get("community")?),
            source_channel: from_snowflake(row.try_get("source_channel")?),
            target_channel: from_snowflake(row.try_get("target_channel")?),
            sync_edits: row.try_get("sync_edits")?,
            sync_deletes: row.try_get("sync_deletes")?,
        }))
    }
}

const INSERT_LINK: &str = r"
    INSERT INTO mirror_links (id, community, source_channel, target_channel, sync_edits, sync_deletes)
    VALUES (?, ?, ?, ?, ?, ?)
";

const UPDATE_LINK: &str =
    "UPDATE mirror_links SET sync_edits = ?, sync_deletes = ? WHERE id = ?";

const INSERT_MAPPING: &str = r"
    INSERT INTO mirror_messages (link_id, source_id, target_id)
    VALUES (?, ?, ?)
    ON CONFLICT DO NOTHING
";

/// `SQLite`-backed store of mirror links and their message maps.
pub struct SqliteMirrorRepository {
    pool: SqlitePool,
}

impl SqliteMirrorRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl MirrorRepository for SqliteMirrorRepository {
    async fn create_link(&self, link: MirrorLink) -> Result<MirrorLink, WardenError> {
        let result = sqlx::query(INSERT_LINK)
            .bind(link.id.as_uuid())
            .bind(snowflake(link.community.get()))
            .bind(snowflake(link.source_channel.get()))
            .bind(snowflake(link.target_channel.get()))
            .bind(link.sync_edits)
            .bind(link.sync_deletes)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(link),
            Err(err) if is_unique_violation(&err) => Err(StateConflictError {
                resource: "mirror_link",
                key: format!("{}->{}", link.source_channel, link.target_channel),
                attempts: 1,
            }
            .into()),
            Err(err) => Err(StorageError::from(err).into()),
        }
    }

    async fn get_link(&self, id: LinkId) -> Result<Option<MirrorLink>, WardenError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM mirror_links WHERE id = ?")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn update_link(&self, link: MirrorLink) -> Result<MirrorLink, WardenError> {
        sqlx::query(UPDATE_LINK)
            .bind(link.sync_edits)
            .bind(link.sync_deletes)
            .bind(link.id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(link)
    }

    async fn delete_link(&self, id: LinkId) -> Result<bool, WardenError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        sqlx::query("DELETE FROM mirror_messages WHERE link_id = ?")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        let result = sqlx::query("DELETE FROM mirror_links WHERE id = ?")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn links_for_community(
        &self,
        community: CommunityId,
    ) -> Result<Vec<MirrorLink>, WardenError> {
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM mirror_links WHERE community = ? ORDER BY source_channel, target_channel",
        )
        .bind(snowflake(community.get()))
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn links_for_source(&self, channel: ChannelId) -> Result<Vec<MirrorLink>, WardenError> {
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM mirror_links WHERE source_channel = ? ORDER BY target_channel",
        )
        .bind(snowflake(channel.get()))
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn insert_mapping(
        &self,
        link: LinkId,
        source: MessageId,
        target: MessageId,
    ) -> Result<bool, WardenError> {
        let result = sqlx::query(INSERT_MAPPING)
            .bind(link.as_uuid())
            .bind(snowflake(source.get()))
            .bind(snowflake(target.get()))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn target_for(
        &self,
        link: LinkId,
        source: MessageId,
    ) -> Result<Option<MessageId>, WardenError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT target_id FROM mirror_messages WHERE link_id = ? AND source_id = ?",
        )
        .bind(link.as_uuid())
        .bind(snowflake(source.get()))
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(row.map(|(target,)| from_snowflake(target)))
    }

    async fn remove_mapping(
        &self,
        link: LinkId,
        source: MessageId,
    ) -> Result<Option<MessageId>, WardenError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "DELETE FROM mirror_messages WHERE link_id = ? AND source_id = ? RETURNING target_id",
        )
        .bind(link.as_uuid())
        .bind(snowflake(source.get()))
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(row.map(|(target,)| from_snowflake(target)))
    }
}
