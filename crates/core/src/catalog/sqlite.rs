//! SQLite-backed catalog item store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{CatalogError, CatalogItem, ItemStatus, ItemStore, MetadataPatch, NewItem};

/// SQLite-backed item store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and initialize the schema.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(|e| CatalogError::Database(e.to_string()))?;
        // WAL keeps readers unblocked while pipeline runs commit.
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL DEFAULT '',
                playback_url TEXT NOT NULL DEFAULT '',
                source_url TEXT,
                thumbnail_path TEXT,
                gif_preview_path TEXT,
                sprite_path TEXT,
                duration_seconds REAL NOT NULL DEFAULT 0,
                width INTEGER NOT NULL DEFAULT 0,
                height INTEGER NOT NULL DEFAULT 0,
                batch_label TEXT,
                tags TEXT NOT NULL DEFAULT '',
                ai_tags TEXT NOT NULL DEFAULT '',
                subtitle_text TEXT,
                is_favorite INTEGER NOT NULL DEFAULT 0,
                is_watched INTEGER NOT NULL DEFAULT 0,
                resume_position_seconds REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                error_message TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_status ON items(status);
            CREATE INDEX IF NOT EXISTS idx_items_batch ON items(batch_label);
            "#,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<CatalogItem> {
        let status_str: String = row.get(17)?;
        let created_at_str: String = row.get(19)?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(CatalogItem {
            id: row.get(0)?,
            title: row.get(1)?,
            playback_url: row.get(2)?,
            source_url: row.get(3)?,
            thumbnail_path: row.get(4)?,
            gif_preview_path: row.get(5)?,
            sprite_path: row.get(6)?,
            duration_seconds: row.get(7)?,
            width: row.get(8)?,
            height: row.get(9)?,
            batch_label: row.get(10)?,
            tags: row.get(11)?,
            ai_tags: row.get(12)?,
            subtitle_text: row.get(13)?,
            is_favorite: row.get::<_, i64>(14)? != 0,
            is_watched: row.get::<_, i64>(15)? != 0,
            resume_position_seconds: row.get(16)?,
            status: ItemStatus::parse(&status_str).unwrap_or(ItemStatus::Pending),
            error_message: row.get(18)?,
            created_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, title, playback_url, source_url, thumbnail_path, \
     gif_preview_path, sprite_path, duration_seconds, width, height, batch_label, \
     tags, ai_tags, subtitle_text, is_favorite, is_watched, resume_position_seconds, \
     status, error_message, created_at";

impl ItemStore for SqliteStore {
    fn insert(&self, item: NewItem) -> Result<i64, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let now_str = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO items (title, playback_url, source_url, batch_label, status, created_at)
             VALUES (?, ?, ?, ?, 'pending', ?)",
            params![
                item.title.unwrap_or_default(),
                &item.playback_url,
                &item.source_url,
                &item.batch_label,
                &now_str,
            ],
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<CatalogItem, CatalogError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM items WHERE id = ?"),
            params![id],
            Self::row_to_item,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound(id),
            _ => CatalogError::Database(e.to_string()),
        })
    }

    fn list(&self, limit: u32, offset: u32) -> Result<Vec<CatalogItem>, CatalogError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM items ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
            ))
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit, offset], Self::row_to_item)
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row.map_err(|e| CatalogError::Database(e.to_string()))?);
        }
        Ok(items)
    }

    fn set_status(
        &self,
        id: i64,
        status: ItemStatus,
        error_message: Option<&str>,
    ) -> Result<(), CatalogError> {
        let conn = self.conn.lock().unwrap();

        // An error row always carries a message; any other status clears it.
        let message: Option<String> = match status {
            ItemStatus::Error => {
                let msg = error_message.unwrap_or("").trim();
                Some(if msg.is_empty() {
                    "unknown error".to_string()
                } else {
                    msg.to_string()
                })
            }
            _ => None,
        };

        let rows = conn
            .execute(
                "UPDATE items SET status = ?, error_message = ? WHERE id = ?",
                params![status.as_str(), message, id],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if rows == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }

    fn apply_metadata(&self, id: i64, patch: &MetadataPatch) -> Result<(), CatalogError> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE items SET
                    title = COALESCE(?, title),
                    duration_seconds = COALESCE(?, duration_seconds),
                    width = COALESCE(?, width),
                    height = COALESCE(?, height),
                    tags = COALESCE(?, tags),
                    ai_tags = COALESCE(?, ai_tags)
                 WHERE id = ?",
                params![
                    &patch.title,
                    patch.duration_seconds,
                    patch.width,
                    patch.height,
                    &patch.tags,
                    &patch.ai_tags,
                    id
                ],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if rows == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }

    fn set_playback_url(&self, id: i64, url: &str) -> Result<(), CatalogError> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE items SET playback_url = ? WHERE id = ?",
                params![url, id],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if rows == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }

    fn set_visuals(
        &self,
        id: i64,
        thumbnail_path: Option<&str>,
        gif_preview_path: Option<&str>,
    ) -> Result<(), CatalogError> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE items SET
                    thumbnail_path = COALESCE(?, thumbnail_path),
                    gif_preview_path = COALESCE(?, gif_preview_path)
                 WHERE id = ?",
                params![thumbnail_path, gif_preview_path, id],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if rows == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }

    fn set_subtitle(&self, id: i64, text: &str) -> Result<(), CatalogError> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE items SET subtitle_text = ? WHERE id = ?",
                params![text, id],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if rows == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    fn insert_test_item(store: &SqliteStore, url: &str) -> i64 {
        store
            .insert(NewItem {
                playback_url: url.to_string(),
                source_url: Some(url.to_string()),
                title: None,
                batch_label: Some("batch-1".to_string()),
            })
            .unwrap()
    }

    #[test]
    fn test_insert_starts_pending() {
        let store = create_test_store();
        let id = insert_test_item(&store, "https://example.com/v/1");

        let item = store.get(id).unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.playback_url, "https://example.com/v/1");
        assert!(item.error_message.is_none());
        assert_eq!(item.batch_label.as_deref(), Some("batch-1"));
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();
        let result = store.get(9999);
        assert!(matches!(result, Err(CatalogError::NotFound(9999))));
    }

    #[test]
    fn test_set_status_error_requires_message() {
        let store = create_test_store();
        let id = insert_test_item(&store, "https://example.com/v/2");

        store
            .set_status(id, ItemStatus::Error, Some("extraction blew up"))
            .unwrap();
        let item = store.get(id).unwrap();
        assert_eq!(item.status, ItemStatus::Error);
        assert_eq!(item.error_message.as_deref(), Some("extraction blew up"));

        // Empty message gets a generic substitute
        store.set_status(id, ItemStatus::Error, Some("  ")).unwrap();
        let item = store.get(id).unwrap();
        assert_eq!(item.error_message.as_deref(), Some("unknown error"));
    }

    #[test]
    fn test_set_status_ready_clears_error() {
        let store = create_test_store();
        let id = insert_test_item(&store, "https://example.com/v/3");

        store
            .set_status(id, ItemStatus::Error, Some("boom"))
            .unwrap();
        store.set_status(id, ItemStatus::Ready, None).unwrap();

        let item = store.get(id).unwrap();
        assert_eq!(item.status, ItemStatus::Ready);
        assert!(item.error_message.is_none());
    }

    #[test]
    fn test_apply_metadata_partial() {
        let store = create_test_store();
        let id = insert_test_item(&store, "https://example.com/v/4");

        store
            .apply_metadata(
                id,
                &MetadataPatch {
                    title: Some("First Title".to_string()),
                    duration_seconds: Some(120.5),
                    ..Default::default()
                },
            )
            .unwrap();

        // Second patch only touches dimensions; title must survive.
        store
            .apply_metadata(
                id,
                &MetadataPatch {
                    width: Some(1920),
                    height: Some(1080),
                    ..Default::default()
                },
            )
            .unwrap();

        let item = store.get(id).unwrap();
        assert_eq!(item.title, "First Title");
        assert_eq!(item.duration_seconds, 120.5);
        assert_eq!(item.width, 1920);
        assert_eq!(item.height, 1080);
    }

    #[test]
    fn test_set_playback_url() {
        let store = create_test_store();
        let id = insert_test_item(&store, "https://cdn.example.com/old.mp4");

        store
            .set_playback_url(id, "https://cdn.example.com/fresh.mp4")
            .unwrap();

        let item = store.get(id).unwrap();
        assert_eq!(item.playback_url, "https://cdn.example.com/fresh.mp4");
        // Source URL is untouched by refreshes
        assert_eq!(
            item.source_url.as_deref(),
            Some("https://cdn.example.com/old.mp4")
        );
    }

    #[test]
    fn test_set_visuals_fills_gaps_only_when_given() {
        let store = create_test_store();
        let id = insert_test_item(&store, "https://example.com/v/5");

        store
            .set_visuals(id, Some("/previews/5.jpg"), None)
            .unwrap();
        store.set_visuals(id, None, Some("/previews/5.gif")).unwrap();

        let item = store.get(id).unwrap();
        assert_eq!(item.thumbnail_path.as_deref(), Some("/previews/5.jpg"));
        assert_eq!(item.gif_preview_path.as_deref(), Some("/previews/5.gif"));
    }

    #[test]
    fn test_set_subtitle() {
        let store = create_test_store();
        let id = insert_test_item(&store, "https://example.com/v/6");

        store.set_subtitle(id, "hello world flattened text").unwrap();

        let item = store.get(id).unwrap();
        assert_eq!(
            item.subtitle_text.as_deref(),
            Some("hello world flattened text")
        );
    }

    #[test]
    fn test_list_orders_newest_first_and_paginates() {
        let store = create_test_store();
        for i in 0..5 {
            insert_test_item(&store, &format!("https://example.com/v/{i}"));
        }

        let page = store.list(3, 0).unwrap();
        assert_eq!(page.len(), 3);
        // Same created_at second is possible; id ordering breaks the tie.
        assert!(page[0].id > page[1].id);

        let rest = store.list(3, 3).unwrap();
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn test_update_nonexistent_item() {
        let store = create_test_store();
        assert!(matches!(
            store.set_status(42, ItemStatus::Ready, None),
            Err(CatalogError::NotFound(42))
        ));
        assert!(matches!(
            store.set_playback_url(42, "x"),
            Err(CatalogError::NotFound(42))
        ));
    }
}
