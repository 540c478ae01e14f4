use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::debug;

use crate::error::StorageError;
use crate::traits::{KvBackend, KvOp, KvResult, Versioned};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// `KvBackend` over a single SQLite connection.
///
/// Several `SqliteBackend`s (in one process or many) may open the same file;
/// write transactions take SQLite's write lock up front (`BEGIN IMMEDIATE`)
/// and wait at most the busy timeout before reporting `Unavailable`.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(
        path: impl AsRef<Path>,
        busy_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn, busy_timeout)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn, DEFAULT_BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }
}

fn to_version(raw: i64) -> u64 {
    raw.max(0) as u64
}

fn read_versioned(conn: &Connection, key: &str) -> Result<Option<Versioned>, StorageError> {
    let row = conn
        .query_row(
            "SELECT value, version FROM kv WHERE key = ?1",
            rusqlite::params![key],
            |row| {
                let value: Vec<u8> = row.get(0)?;
                let version: i64 = row.get(1)?;
                Ok(Versioned {
                    value,
                    version: to_version(version),
                })
            },
        )
        .optional()?;
    Ok(row)
}

const SCAN_RANGE_SQL: &str =
    "SELECT key, value, version FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key";
const SCAN_OPEN_SQL: &str = "SELECT key, value, version FROM kv WHERE key >= ?1 ORDER BY key";
const FLOOR_SQL: &str = "SELECT key, value, version FROM kv WHERE key >= ?1 AND key <= ?2
     ORDER BY key DESC LIMIT 1";

/// Smallest string greater than every string starting with `prefix`, or
/// `None` when no such bound exists. Text keys compare as UTF-8 bytes, which
/// orders them by code point.
fn prefix_end(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let mut next = last as u32 + 1;
        if (0xD800..=0xDFFF).contains(&next) {
            next = 0xE000;
        }
        if let Some(c) = char::from_u32(next) {
            chars.push(c);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

fn row_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, Versioned)> {
    let key: String = row.get(0)?;
    let value: Vec<u8> = row.get(1)?;
    let version: i64 = row.get(2)?;
    Ok((
        key,
        Versioned {
            value,
            version: to_version(version),
        },
    ))
}

fn scan(conn: &Connection, prefix: &str) -> Result<Vec<(String, Versioned)>, StorageError> {
    match prefix_end(prefix) {
        Some(end) => {
            let mut stmt = conn.prepare(SCAN_RANGE_SQL)?;
            let rows = stmt
                .query_map(rusqlite::params![prefix, end], row_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        }
        None => {
            let mut stmt = conn.prepare(SCAN_OPEN_SQL)?;
            let rows = stmt
                .query_map(rusqlite::params![prefix], row_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        }
    }
}

fn floor(
    conn: &Connection,
    prefix: &str,
    key: &str,
) -> Result<Option<(String, Versioned)>, StorageError> {
    if !key.starts_with(prefix) {
        return Ok(None);
    }
    let mut stmt = conn.prepare(FLOOR_SQL)?;
    let entry = stmt
        .query_row(rusqlite::params![prefix, key], row_entry)
        .optional()?;
    Ok(entry)
}

fn apply_op(tx: &Transaction, op: &KvOp) -> Result<KvResult, StorageError> {
    match op {
        KvOp::Get { key } => Ok(KvResult::Value(read_versioned(tx, key)?)),

        KvOp::Put { key, value } => {
            let version: i64 = tx.query_row(
                "INSERT INTO kv (key, value, version) VALUES (?1, ?2, 1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, version = kv.version + 1,
                     updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)
                 RETURNING version",
                rusqlite::params![key, value],
                |row| row.get(0),
            )?;
            Ok(KvResult::Written {
                version: to_version(version),
            })
        }

        KvOp::Expect { key, version } => {
            let actual = read_versioned(tx, key)?.map(|v| v.version);
            if actual != *version {
                return Err(StorageError::ConditionFailed {
                    key: key.clone(),
                    expected: *version,
                    actual,
                });
            }
            Ok(KvResult::Matched)
        }

        KvOp::ScanPrefix { prefix } => Ok(KvResult::Entries(scan(tx, prefix)?)),
    }
}

impl KvBackend for SqliteBackend {
    fn execute_transaction(&self, ops: &[KvOp]) -> Result<Vec<KvResult>, StorageError> {
        let behavior = if ops.iter().any(KvOp::is_write) {
            TransactionBehavior::Immediate
        } else {
            TransactionBehavior::Deferred
        };
        let tx = Transaction::new_unchecked(&self.conn, behavior)?;

        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            match apply_op(&tx, op) {
                Ok(result) => results.push(result),
                Err(e) => {
                    // Dropping `tx` rolls back every write applied so far.
                    debug!(error = %e, "kv transaction aborted");
                    return Err(e);
                }
            }
        }

        tx.commit()?;
        debug!(ops = ops.len(), "kv transaction committed");
        Ok(results)
    }

    fn get(&self, key: &str) -> Result<Option<Versioned>, StorageError> {
        read_versioned(&self.conn, key)
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Versioned)>, StorageError> {
        scan(&self.conn, prefix)
    }

    fn floor(
        &self,
        prefix: &str,
        key: &str,
    ) -> Result<Option<(String, Versioned)>, StorageError> {
        floor(&self.conn, prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_bumps_version() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let results = backend
            .execute_transaction(&[KvOp::put("a", b"1".to_vec()), KvOp::put("a", b"2".to_vec())])
            .unwrap();
        assert_eq!(
            results,
            vec![KvResult::Written { version: 1 }, KvResult::Written { version: 2 }]
        );
        let stored = backend.get("a").unwrap().unwrap();
        assert_eq!(stored.value, b"2".to_vec());
        assert_eq!(stored.version, 2);
        assert_eq!(backend.get("missing").unwrap(), None);
    }

    #[test]
    fn failed_expect_rolls_back_whole_batch() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .execute_transaction(&[KvOp::put("guard", b"x".to_vec())])
            .unwrap();

        let err = backend
            .execute_transaction(&[
                KvOp::put("written-before-check", b"y".to_vec()),
                KvOp::expect("guard", None),
                KvOp::put("written-after-check", b"z".to_vec()),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::ConditionFailed { ref key, expected: None, actual: Some(1) } if key == "guard"
        ));
        assert_eq!(backend.get("written-before-check").unwrap(), None);
        assert_eq!(backend.get("written-after-check").unwrap(), None);
    }

    #[test]
    fn expect_matches_current_version() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let results = backend
            .execute_transaction(&[
                KvOp::expect("k", None),
                KvOp::put("k", b"v".to_vec()),
                KvOp::expect("k", Some(1)),
                KvOp::get("k"),
            ])
            .unwrap();
        assert_eq!(results[0], KvResult::Matched);
        assert_eq!(results[2], KvResult::Matched);
        assert_eq!(
            results[3],
            KvResult::Value(Some(Versioned {
                value: b"v".to_vec(),
                version: 1
            }))
        );
    }

    #[test]
    fn scan_prefix_is_ordered_and_bounded() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .execute_transaction(&[
                KvOp::put("rev/b", vec![2]),
                KvOp::put("rev/a", vec![1]),
                KvOp::put("meta/a", vec![0]),
                KvOp::put("rev", vec![9]),
                KvOp::put("rev0", vec![8]),
            ])
            .unwrap();
        let keys: Vec<String> = backend
            .scan_prefix("rev/")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["rev/a".to_string(), "rev/b".to_string()]);

        let results = backend
            .execute_transaction(&[KvOp::scan_prefix("meta/")])
            .unwrap();
        assert!(matches!(&results[0], KvResult::Entries(e) if e.len() == 1));
    }

    #[test]
    fn floor_finds_greatest_key_at_or_below() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .execute_transaction(&[
                KvOp::put("log/a/01", vec![1]),
                KvOp::put("log/a/03", vec![3]),
                KvOp::put("log/a/07", vec![7]),
                KvOp::put("log/b/02", vec![2]),
            ])
            .unwrap();

        let key_of = |target: &str| {
            backend
                .floor("log/a/", target)
                .unwrap()
                .map(|(key, _)| key)
        };
        assert_eq!(key_of("log/a/03").as_deref(), Some("log/a/03"));
        assert_eq!(key_of("log/a/05").as_deref(), Some("log/a/03"));
        assert_eq!(key_of("log/a/99").as_deref(), Some("log/a/07"));
        assert_eq!(key_of("log/a/00"), None);
        // Never crosses into a neighbouring prefix.
        assert_eq!(backend.floor("log/b/", "log/b/01").unwrap(), None);
        assert_eq!(backend.floor("log/a/", "log/b/02").unwrap(), None);
    }

    #[test]
    fn prefix_reads_use_the_primary_key() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        for (sql, arity) in [(SCAN_RANGE_SQL, 2), (SCAN_OPEN_SQL, 1), (FLOOR_SQL, 2)] {
            let mut stmt = backend
                .conn
                .prepare(&format!("EXPLAIN QUERY PLAN {sql}"))
                .unwrap();
            let details: Vec<String> = stmt
                .query_map(
                    rusqlite::params_from_iter(["rev/", "rev0"].into_iter().take(arity)),
                    |row| row.get::<_, String>(3),
                )
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap();
            assert!(
                details.iter().all(|d| !d.starts_with("SCAN kv")),
                "{sql} plans a full scan: {details:?}"
            );
        }
    }

    #[test]
    fn prefix_end_bounds() {
        assert_eq!(prefix_end("rev/").as_deref(), Some("rev0"));
        assert_eq!(prefix_end("a\u{10FFFF}").as_deref(), Some("b"));
        assert_eq!(prefix_end(""), None);
    }

    #[test]
    fn two_handles_share_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");
        let a = SqliteBackend::open(&path).unwrap();
        let b = SqliteBackend::open(&path).unwrap();

        a.execute_transaction(&[KvOp::put("shared", b"from-a".to_vec())])
            .unwrap();
        let seen = b.get("shared").unwrap().unwrap();
        assert_eq!(seen.value, b"from-a".to_vec());

        let err = b
            .execute_transaction(&[KvOp::expect("shared", Some(7)), KvOp::put("shared", vec![])])
            .unwrap_err();
        assert!(matches!(err, StorageError::ConditionFailed { .. }));
        assert_eq!(a.get("shared").unwrap().unwrap().version, 1);
    }
}
