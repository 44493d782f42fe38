// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message collections, their ordered items, and reaction satisfaction.
//!
//! Item sort indices stay dense and 1-based: inserting shifts the tail up,
//! removing shifts it down, both inside the same transaction.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use rolekeeper_core::RolekeeperError;
use rolekeeper_core::ids::{ChannelId, CollectionId, GuildId, ItemId, MessageId, RoleId, UserId};
use rolekeeper_core::types::{
    CollectionItem, CollectionReaction, MessageCollection, NewCollectionItem,
    NewMessageCollection,
};

use crate::database::{Database, format_ts, get_opt_ts, get_ts, map_tr_err};

const COLLECTION_COLUMNS: &str = "id, guild_id, channel_id, react_emoji, react_role_id, \
     multi_react, last_updated, last_published, requires_publish";

const ITEM_COLUMNS: &str = "id, collection_id, sort_index, content, allow_react, \
     maintain_last, pending_delete, published_message_id, last_updated";

fn collection_from_row(row: &Row<'_>) -> rusqlite::Result<MessageCollection> {
    let emoji: Option<String> = row.get(3)?;
    let role: Option<i64> = row.get(4)?;
    let reaction = match (emoji, role) {
        (Some(emoji), Some(role)) => Some(CollectionReaction {
            emoji,
            role_id: RoleId::from_db(role),
            multi_react: row.get(5)?,
        }),
        _ => None,
    };
    Ok(MessageCollection {
        id: row.get(0)?,
        guild_id: GuildId::from_db(row.get(1)?),
        channel_id: ChannelId::from_db(row.get(2)?),
        reaction,
        last_updated: get_ts(row, 6)?,
        last_published: get_opt_ts(row, 7)?,
        requires_publish: row.get(8)?,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<CollectionItem> {
    Ok(CollectionItem {
        id: row.get(0)?,
        collection_id: row.get(1)?,
        sort_index: row.get(2)?,
        content: row.get(3)?,
        allow_react: row.get(4)?,
        maintain_last: row.get(5)?,
        pending_delete: row.get(6)?,
        published_message_id: row.get::<_, Option<i64>>(7)?.map(MessageId::from_db),
        last_updated: get_ts(row, 8)?,
    })
}

fn select_collection(
    conn: &rusqlite::Connection,
    id: CollectionId,
) -> rusqlite::Result<Option<MessageCollection>> {
    conn.query_row(
        &format!("SELECT {COLLECTION_COLUMNS} FROM message_collections WHERE id = ?1"),
        params![id],
        collection_from_row,
    )
    .optional()
}

fn select_item(conn: &rusqlite::Connection, id: ItemId) -> rusqlite::Result<Option<CollectionItem>> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM collection_items WHERE id = ?1"),
        params![id],
        item_from_row,
    )
    .optional()
}

pub async fn insert_collection(
    db: &Database,
    collection: NewMessageCollection,
    now: DateTime<Utc>,
) -> Result<MessageCollection, RolekeeperError> {
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            let reaction = collection.reaction.as_ref();
            conn.execute(
                "INSERT INTO message_collections
                 (guild_id, channel_id, react_emoji, react_role_id, multi_react, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    collection.guild_id.to_db(),
                    collection.channel_id.to_db(),
                    reaction.map(|r| r.emoji.as_str()),
                    reaction.map(|r| r.role_id.to_db()),
                    reaction.is_some_and(|r| r.multi_react),
                    now,
                ],
            )?;
            let id = conn.last_insert_rowid();
            select_collection(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_collection(
    db: &Database,
    id: CollectionId,
) -> Result<Option<MessageCollection>, RolekeeperError> {
    db.connection()
        .call(move |conn| select_collection(conn, id))
        .await
        .map_err(map_tr_err)
}

pub async fn collections_in_channel(
    db: &Database,
    channel: ChannelId,
) -> Result<Vec<MessageCollection>, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLLECTION_COLUMNS} FROM message_collections
                 WHERE channel_id = ?1 ORDER BY id"
            ))?;
            let rows = stmt.query_map(params![channel.to_db()], collection_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_collection(db: &Database, id: CollectionId) -> Result<(), RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM message_collections WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_requires_publish(
    db: &Database,
    id: CollectionId,
    requires: bool,
    now: DateTime<Utc>,
) -> Result<(), RolekeeperError> {
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE message_collections SET requires_publish = ?1, last_updated = ?2
                 WHERE id = ?3",
                params![requires, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn mark_published(
    db: &Database,
    id: CollectionId,
    now: DateTime<Utc>,
) -> Result<(), RolekeeperError> {
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE message_collections SET requires_publish = 0, last_published = ?1
                 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_items(
    db: &Database,
    id: CollectionId,
) -> Result<Vec<CollectionItem>, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM collection_items
                 WHERE collection_id = ?1 ORDER BY sort_index ASC"
            ))?;
            let rows = stmt.query_map(params![id], item_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_item(db: &Database, id: ItemId) -> Result<Option<CollectionItem>, RolekeeperError> {
    db.connection()
        .call(move |conn| select_item(conn, id))
        .await
        .map_err(map_tr_err)
}

pub async fn find_item_by_message(
    db: &Database,
    message: MessageId,
) -> Result<Option<CollectionItem>, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM collection_items WHERE published_message_id = ?1"),
                params![message.to_db()],
                item_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Inserts at `sort_index` (clamped to `1..=len+1`), shifting the tail up.
pub async fn insert_item(
    db: &Database,
    collection: CollectionId,
    sort_index: u32,
    item: NewCollectionItem,
    now: DateTime<Utc>,
) -> Result<CollectionItem, RolekeeperError> {
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let count: u32 = tx.query_row(
                "SELECT COUNT(*) FROM collection_items WHERE collection_id = ?1",
                params![collection],
                |row| row.get(0),
            )?;
            let index = sort_index.clamp(1, count + 1);
            tx.execute(
                "UPDATE collection_items SET sort_index = sort_index + 1
                 WHERE collection_id = ?1 AND sort_index >= ?2",
                params![collection, index],
            )?;
            tx.execute(
                "INSERT INTO collection_items
                 (collection_id, sort_index, content, allow_react, maintain_last, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    collection,
                    index,
                    item.content,
                    item.allow_react,
                    item.maintain_last,
                    now
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "UPDATE message_collections SET requires_publish = 1, last_updated = ?1
                 WHERE id = ?2",
                params![now, collection],
            )?;
            let created = select_item(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(created)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_item_content(
    db: &Database,
    id: ItemId,
    content: &str,
    now: DateTime<Utc>,
) -> Result<(), RolekeeperError> {
    let content = content.to_string();
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE collection_items SET content = ?1, last_updated = ?2 WHERE id = ?3",
                params![content, now, id],
            )?;
            tx.execute(
                "UPDATE message_collections SET requires_publish = 1, last_updated = ?1
                 WHERE id = (SELECT collection_id FROM collection_items WHERE id = ?2)",
                params![now, id],
            )?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_published_id(
    db: &Database,
    id: ItemId,
    message: Option<MessageId>,
) -> Result<(), RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE collection_items SET published_message_id = ?1 WHERE id = ?2",
                params![message.map(MessageId::to_db), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn mark_pending_delete(
    db: &Database,
    id: ItemId,
    now: DateTime<Utc>,
) -> Result<(), RolekeeperError> {
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE collection_items SET pending_delete = 1, last_updated = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            tx.execute(
                "UPDATE message_collections SET requires_publish = 1, last_updated = ?1
                 WHERE id = (SELECT collection_id FROM collection_items WHERE id = ?2)",
                params![now, id],
            )?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes the item and closes the gap it leaves in the ordering.
pub async fn remove_item(db: &Database, id: ItemId) -> Result<(), RolekeeperError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed: Option<(CollectionId, u32)> = tx
                .query_row(
                    "DELETE FROM collection_items WHERE id = ?1
                     RETURNING collection_id, sort_index",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            if let Some((collection, index)) = removed {
                tx.execute(
                    "UPDATE collection_items SET sort_index = sort_index - 1
                     WHERE collection_id = ?1 AND sort_index > ?2",
                    params![collection, index],
                )?;
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn record_item_user(
    db: &Database,
    item: ItemId,
    user: UserId,
) -> Result<(), RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO collection_item_users (item_id, user_id) VALUES (?1, ?2)",
                params![item, user.to_db()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn item_users(
    db: &Database,
    collection: CollectionId,
    user: UserId,
) -> Result<Vec<ItemId>, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT u.item_id FROM collection_item_users u
                 JOIN collection_items i ON i.id = u.item_id
                 WHERE i.collection_id = ?1 AND u.user_id = ?2
                 ORDER BY i.sort_index",
            )?;
            let rows = stmt.query_map(params![collection, user.to_db()], |row| {
                row.get::<_, ItemId>(0)
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn clear_item_users(
    db: &Database,
    collection: CollectionId,
    user: UserId,
) -> Result<(), RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM collection_item_users
                 WHERE user_id = ?1
                   AND item_id IN (SELECT id FROM collection_items WHERE collection_id = ?2)",
                params![user.to_db(), collection],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    async fn collection(db: &Database) -> MessageCollection {
        insert_collection(
            db,
            NewMessageCollection {
                guild_id: GuildId(1),
                channel_id: ChannelId(2),
                reaction: Some(CollectionReaction {
                    emoji: "👍".to_string(),
                    role_id: RoleId(3),
                    multi_react: true,
                }),
            },
            Utc::now(),
        )
        .await
        .unwrap()
    }

    fn text(content: &str) -> NewCollectionItem {
        NewCollectionItem {
            content: content.to_string(),
            allow_react: true,
            maintain_last: false,
        }
    }

    async fn contents(db: &Database, id: CollectionId) -> Vec<(u32, String)> {
        list_items(db, id)
            .await
            .unwrap()
            .into_iter()
            .map(|i| (i.sort_index, i.content))
            .collect()
    }

    #[tokio::test]
    async fn insert_shifts_and_remove_closes_gap() {
        let (db, _dir) = setup_db().await;
        let c = collection(&db).await;
        assert!(c.requires_publish);
        assert_eq!(c.reaction.as_ref().map(|r| r.multi_react), Some(true));

        insert_item(&db, c.id, 1, text("a"), Utc::now()).await.unwrap();
        insert_item(&db, c.id, 2, text("c"), Utc::now()).await.unwrap();
        let b = insert_item(&db, c.id, 2, text("b"), Utc::now()).await.unwrap();
        insert_item(&db, c.id, 99, text("d"), Utc::now()).await.unwrap();

        assert_eq!(
            contents(&db, c.id).await,
            vec![
                (1, "a".to_string()),
                (2, "b".to_string()),
                (3, "c".to_string()),
                (4, "d".to_string())
            ]
        );

        remove_item(&db, b.id).await.unwrap();
        assert_eq!(
            contents(&db, c.id).await,
            vec![(1, "a".to_string()), (2, "c".to_string()), (3, "d".to_string())]
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn edits_flag_collection_for_publish() {
        let (db, _dir) = setup_db().await;
        let c = collection(&db).await;
        let item = insert_item(&db, c.id, 1, text("a"), Utc::now()).await.unwrap();
        mark_published(&db, c.id, Utc::now()).await.unwrap();

        let published = get_collection(&db, c.id).await.unwrap().unwrap();
        assert!(!published.requires_publish);
        assert!(published.last_published.is_some());

        update_item_content(&db, item.id, "a2", Utc::now()).await.unwrap();
        assert!(get_collection(&db, c.id).await.unwrap().unwrap().requires_publish);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn item_users_are_scoped_to_collection() {
        let (db, _dir) = setup_db().await;
        let c = collection(&db).await;
        let first = insert_item(&db, c.id, 1, text("a"), Utc::now()).await.unwrap();
        let second = insert_item(&db, c.id, 2, text("b"), Utc::now()).await.unwrap();

        record_item_user(&db, second.id, UserId(7)).await.unwrap();
        record_item_user(&db, first.id, UserId(7)).await.unwrap();
        record_item_user(&db, first.id, UserId(7)).await.unwrap();
        record_item_user(&db, first.id, UserId(8)).await.unwrap();

        assert_eq!(
            item_users(&db, c.id, UserId(7)).await.unwrap(),
            vec![first.id, second.id]
        );
        clear_item_users(&db, c.id, UserId(7)).await.unwrap();
        assert!(item_users(&db, c.id, UserId(7)).await.unwrap().is_empty());
        assert_eq!(item_users(&db, c.id, UserId(8)).await.unwrap(), vec![first.id]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn published_message_lookup() {
        let (db, _dir) = setup_db().await;
        let c = collection(&db).await;
        let item = insert_item(&db, c.id, 1, text("a"), Utc::now()).await.unwrap();
        set_published_id(&db, item.id, Some(MessageId(555))).await.unwrap();

        let found = find_item_by_message(&db, MessageId(555)).await.unwrap().unwrap();
        assert_eq!(found.id, item.id);
        assert_eq!(found.published_message_id, Some(MessageId(555)));
        assert_eq!(collections_in_channel(&db, ChannelId(2)).await.unwrap().len(), 1);

        db.close().await.unwrap();
    }
}
