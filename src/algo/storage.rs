//! SQLite store for memoised query results. Opt-in via the `cache` feature.
//!
//! One row per [`CacheKey`], holding the result as JSON text. Rows written
//! by another crate version are purged when the store is opened, so a read
//! never sees a result shaped by different code.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;

use super::cache::{ArtifactKind, CacheKey};
use crate::error::{Error, Result};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const SCHEMA: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    CREATE TABLE IF NOT EXISTS query_results (
        kind          TEXT    NOT NULL,
        dataset_hash  INTEGER NOT NULL,
        args_hash     INTEGER NOT NULL,
        version       TEXT    NOT NULL,
        stored_at     INTEGER NOT NULL,
        result        TEXT    NOT NULL,
        PRIMARY KEY (kind, dataset_hash, args_hash)
    ) WITHOUT ROWID;";

fn cache_err(context: &str) -> impl Fn(rusqlite::Error) -> Error + '_ {
    move |e| Error::Cache(format!("{context}: {e}"))
}

/// Hashes are stored bit-for-bit in SQLite's signed integers.
fn sql_hash(hash: u64) -> i64 {
    hash as i64
}

pub struct CacheDb {
    conn: Connection,
}

/// Entry counts and result sizes for one kind of query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindSummary {
    pub kind: String,
    pub entries: usize,
    pub result_bytes: u64,
    /// Unix time of the newest entry.
    pub last_stored_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSummary {
    pub entries: usize,
    pub file_bytes: u64,
    pub kinds: Vec<KindSummary>,
}

impl CacheDb {
    /// Open the store at `path`, creating it if needed. `:memory:` gives a
    /// throwaway in-process store.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Cache(format!("Failed to open cache DB at '{path}': {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(cache_err("Failed to create cache schema"))?;

        let purged = conn
            .execute("DELETE FROM query_results WHERE version <> ?1", params![VERSION])
            .map_err(cache_err("Failed to purge stale results"))?;
        if purged > 0 {
            tracing::debug!(purged, "dropped results from another version");
        }
        Ok(Self { conn })
    }

    /// The stored result for `key`, if any.
    pub fn fetch(&self, key: &CacheKey) -> Result<Option<Value>> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT result FROM query_results
                 WHERE kind = ?1 AND dataset_hash = ?2 AND args_hash = ?3",
                params![key.kind.as_str(), sql_hash(key.dataset), sql_hash(key.args)],
                |row| row.get(0),
            )
            .optional()
            .map_err(cache_err("Failed to read result"))?;
        text.map(|t| serde_json::from_str(&t).map_err(Error::from))
            .transpose()
    }

    /// Store `result` under `key`, replacing any earlier result.
    pub fn store(&self, key: &CacheKey, result: &Value) -> Result<()> {
        let text = serde_json::to_string(result)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO query_results
                     (kind, dataset_hash, args_hash, version, stored_at, result)
                 VALUES (?1, ?2, ?3, ?4, CAST(strftime('%s', 'now') AS INTEGER), ?5)",
                params![
                    key.kind.as_str(),
                    sql_hash(key.dataset),
                    sql_hash(key.args),
                    VERSION,
                    text,
                ],
            )
            .map_err(cache_err("Failed to store result"))?;
        Ok(())
    }

    /// Delete results of one kind, or all of them. Returns the number removed.
    pub fn clear(&self, kind: Option<ArtifactKind>) -> Result<usize> {
        let removed = match kind {
            Some(k) => self
                .conn
                .execute("DELETE FROM query_results WHERE kind = ?1", params![k.as_str()]),
            None => self.conn.execute("DELETE FROM query_results", []),
        };
        removed.map_err(cache_err("Failed to clear results"))
    }

    /// Per-kind totals plus the size of the database file.
    pub fn summary(&self) -> Result<CacheSummary> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT kind, COUNT(*), SUM(LENGTH(CAST(result AS BLOB))), MAX(stored_at)
                 FROM query_results
                 GROUP BY kind
                 ORDER BY kind",
            )
            .map_err(cache_err("Failed to prepare summary"))?;
        let kinds = stmt
            .query_map([], |row| {
                Ok(KindSummary {
                    kind: row.get(0)?,
                    entries: row.get::<_, i64>(1)? as usize,
                    result_bytes: row.get::<_, i64>(2)? as u64,
                    last_stored_at: row.get(3)?,
                })
            })
            .map_err(cache_err("Failed to summarise results"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(cache_err("Failed to read summary row"))?;

        let file_bytes: i64 = self
            .conn
            .query_row(
                "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                [],
                |row| row.get(0),
            )
            .map_err(cache_err("Failed to measure cache file"))?;

        Ok(CacheSummary {
            entries: kinds.iter().map(|k| k.entries).sum(),
            file_bytes: file_bytes as u64,
            kinds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(kind: ArtifactKind, dataset: u64, args: u64) -> CacheKey {
        CacheKey { kind, dataset, args }
    }

    fn memory_db() -> CacheDb {
        CacheDb::open(":memory:").unwrap()
    }

    #[test]
    fn empty_store() {
        let summary = memory_db().summary().unwrap();
        assert_eq!(summary.entries, 0);
        assert!(summary.kinds.is_empty());
    }

    #[test]
    fn store_then_fetch() {
        let db = memory_db();
        let result = json!({"subQuestions": {"_direct": {"type": "answers", "values": {}}}});
        db.store(&key(ArtifactKind::Aggregation, 111, 222), &result).unwrap();

        assert_eq!(db.fetch(&key(ArtifactKind::Aggregation, 111, 222)).unwrap(), Some(result));
        assert_eq!(db.fetch(&key(ArtifactKind::Aggregation, 111, 333)).unwrap(), None);
        assert_eq!(db.fetch(&key(ArtifactKind::Table, 111, 222)).unwrap(), None);
    }

    #[test]
    fn high_bit_hashes_round_trip() {
        let db = memory_db();
        let k = key(ArtifactKind::Categories, u64::MAX, 1 << 63);
        db.store(&k, &json!(["Kön"])).unwrap();
        assert_eq!(db.fetch(&k).unwrap(), Some(json!(["Kön"])));
    }

    #[test]
    fn store_replaces_earlier_result() {
        let db = memory_db();
        let k = key(ArtifactKind::Categories, 1, 3);
        db.store(&k, &json!(["Kön"])).unwrap();
        db.store(&k, &json!(["Kön", "Mat"])).unwrap();
        assert_eq!(db.fetch(&k).unwrap(), Some(json!(["Kön", "Mat"])));
        assert_eq!(db.summary().unwrap().entries, 1);
    }

    #[test]
    fn clear_by_kind_and_all() {
        let db = memory_db();
        db.store(&key(ArtifactKind::Aggregation, 1, 3), &json!({})).unwrap();
        db.store(&key(ArtifactKind::Table, 1, 3), &json!({})).unwrap();

        assert_eq!(db.clear(Some(ArtifactKind::Aggregation)).unwrap(), 1);
        assert!(db.fetch(&key(ArtifactKind::Table, 1, 3)).unwrap().is_some());
        assert_eq!(db.clear(None).unwrap(), 1);
        assert_eq!(db.summary().unwrap().entries, 0);
    }

    #[test]
    fn summary_groups_by_kind() {
        let db = memory_db();
        db.store(&key(ArtifactKind::Table, 1, 1), &json!("abcd")).unwrap();
        db.store(&key(ArtifactKind::Table, 1, 2), &json!("ab")).unwrap();
        db.store(&key(ArtifactKind::Categories, 1, 1), &json!([])).unwrap();

        let summary = db.summary().unwrap();
        assert_eq!(summary.entries, 3);
        assert!(summary.file_bytes > 0);
        let kinds: Vec<(&str, usize, u64)> = summary
            .kinds
            .iter()
            .map(|k| (k.kind.as_str(), k.entries, k.result_bytes))
            .collect();
        // JSON text: `"abcd"` is 6 bytes, `"ab"` 4, `[]` 2.
        assert_eq!(kinds, vec![("categories", 1, 2), ("table", 2, 10)]);
        assert!(summary.kinds[0].last_stored_at > 0);
    }

    #[test]
    fn results_from_other_versions_are_purged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.db");
        let path = path.to_str().unwrap();
        let k = key(ArtifactKind::Categories, 7, 8);

        let db = CacheDb::open(path).unwrap();
        db.store(&k, &json!([])).unwrap();
        db.conn
            .execute("UPDATE query_results SET version = '0.0.0'", [])
            .unwrap();
        drop(db);

        let reopened = CacheDb::open(path).unwrap();
        assert_eq!(reopened.fetch(&k).unwrap(), None);
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.db");
        let path = path.to_str().unwrap();
        let k = key(ArtifactKind::Categories, 7, 8);
        CacheDb::open(path).unwrap().store(&k, &json!(["Mat"])).unwrap();
        let reopened = CacheDb::open(path).unwrap();
        assert_eq!(reopened.fetch(&k).unwrap(), Some(json!(["Mat"])));
    }
}
