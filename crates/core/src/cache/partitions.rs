//! SQLite implementation of [`PartitionStore`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::store::{PartitionStore, ResponseEntry};
use super::CacheEntry;
use crate::{Error, Response};

/// Row shape before header JSON is decoded.
type EntryRow = (String, i64, String, Vec<u8>, Option<i64>, i64, Option<String>);

fn decode_row(row: EntryRow) -> Result<ResponseEntry, Error> {
    let (key, status, headers_json, body, stored_at, ttl_ms, etag) = row;
    let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)?;
    let status = u16::try_from(status).map_err(|_| Error::Storage(format!("invalid stored status {status}")))?;
    Ok(CacheEntry {
        key,
        value: Response { status, headers, body: Bytes::from(body) },
        stored_at: stored_at.map(|t| t.max(0) as u64),
        ttl_ms: ttl_ms.max(0) as u64,
        etag,
    })
}

#[async_trait]
impl PartitionStore for CacheDb {
    async fn create(&self, partition: &str) -> Result<(), Error> {
        let partition = partition.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![partition, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, partition: &str, key: &str) -> Result<Option<ResponseEntry>, Error> {
        let partition = partition.to_string();
        let key = key.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, status, headers_json, body, stored_at, ttl_ms, etag
                     FROM entries WHERE partition = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![partition, key], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?))
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(decode_row).transpose()
    }

    async fn put(&self, partition: &str, entry: ResponseEntry) -> Result<(), Error> {
        let partition = partition.to_string();
        let headers_json = serde_json::to_string(&entry.value.headers)?;
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![partition, created_at],
                )?;
                conn.execute(
                    "INSERT INTO entries (partition, key, status, headers_json, body, stored_at, ttl_ms, etag)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(partition, key) DO UPDATE SET
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at,
                        ttl_ms = excluded.ttl_ms,
                        etag = excluded.etag",
                    params![
                        partition,
                        entry.key,
                        entry.value.status as i64,
                        headers_json,
                        entry.value.body.to_vec(),
                        entry.stored_at.map(|t| t as i64),
                        entry.ttl_ms.min(i64::MAX as u64) as i64,
                        entry.etag,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_entry(&self, partition: &str, key: &str) -> Result<bool, Error> {
        let partition = partition.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count =
                    conn.execute("DELETE FROM entries WHERE partition = ?1 AND key = ?2", params![partition, key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, partition: &str) -> Result<Vec<String>, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM entries WHERE partition = ?1 ORDER BY key")?;
                let keys = stmt
                    .query_map(params![partition], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn partition_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM partitions WHERE name = ?1", params![partition])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
