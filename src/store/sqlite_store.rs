//! Embedded SQLite store implementation for engine progress and farmer counters.
use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::{
    path::Path,
    sync::{Arc, Mutex},
};
use tokio::task;

use crate::{
    aggregate::BatchWrites,
    error::{Error, Result},
    record::{BlockRecord, StoredBlock},
    store::Store,
};

/// Tables:
///   sync_height(id = 1, height)                                  -- the watermark
///   farmer_total_blocks(farmer_address PRIMARY KEY, block_count)
///   farmer_daily_blocks(farmer_address, day, block_count)        -- day is a UTC `YYYY-MM-DD`
///   block_records(height PRIMARY KEY, ...)                       -- only with block syncing on
const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sync_height (
        id     INTEGER PRIMARY KEY CHECK (id = 1),
        height INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS farmer_total_blocks (
        farmer_address TEXT PRIMARY KEY,
        block_count    INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS farmer_daily_blocks (
        farmer_address TEXT NOT NULL,
        day            TEXT NOT NULL,
        block_count    INTEGER NOT NULL,
        PRIMARY KEY (farmer_address, day)
    );
    CREATE INDEX IF NOT EXISTS idx_dfb_day ON farmer_daily_blocks(day);

    CREATE TABLE IF NOT EXISTS block_records (
        height                        INTEGER PRIMARY KEY,
        header_hash                   TEXT NOT NULL,
        prev_hash                     TEXT NOT NULL,
        farmer_puzzle_hash            TEXT NOT NULL,
        pool_puzzle_hash              TEXT NOT NULL,
        timestamp                     INTEGER,
        fees                          INTEGER,
        deficit                       INTEGER NOT NULL,
        overflow                      INTEGER NOT NULL,
        challenge_block_info_hash     TEXT NOT NULL,
        prev_transaction_block_hash   TEXT,
        prev_transaction_block_height INTEGER NOT NULL,
        required_iters                INTEGER NOT NULL,
        reward_infusion_new_challenge TEXT NOT NULL,
        signage_point_index           INTEGER NOT NULL,
        sub_slot_iters                INTEGER NOT NULL,
        total_iters                   TEXT NOT NULL,
        weight                        TEXT NOT NULL,
        farmer_address                TEXT NOT NULL,
        pool_address                  TEXT,
        is_transaction_block          INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_bc_header_hash ON block_records(header_hash);
    CREATE INDEX IF NOT EXISTS idx_bc_timestamp ON block_records(timestamp);
    CREATE INDEX IF NOT EXISTS idx_bc_pool_address ON block_records(pool_address);
    CREATE INDEX IF NOT EXISTS idx_bc_farmer_address_itb
        ON block_records(farmer_address, is_transaction_block);
"#;

const BLOCK_COLUMNS: &str = "height, header_hash, prev_hash, farmer_puzzle_hash, \
     pool_puzzle_hash, timestamp, fees, deficit, overflow, challenge_block_info_hash, \
     prev_transaction_block_hash, prev_transaction_block_height, required_iters, \
     reward_infusion_new_challenge, signage_point_index, sub_slot_iters, total_iters, \
     weight, farmer_address, pool_address, is_transaction_block";

/// SQLite-backed [`Store`]. One connection, used from blocking tasks.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Creates/initializes the SQLite file at `path`.
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite at {}", path.display()))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            "#,
        )?;
        conn.execute_batch(SCHEMA)
            .with_context(|| format!("create schema in {}", path.display()))?;
        Ok(Self::from_conn(conn))
    }

    /// Private in-memory database (useful for tests).
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA).context("create schema in memory")?;
        Ok(Self::from_conn(conn))
    }

    fn from_conn(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| Error::Persistence("sqlite connection lock poisoned".into()))?;
            f(&mut *guard)
        })
        .await?
    }

    /// Total blocks attributed to `farmer_address`.
    pub async fn farmer_total(&self, farmer_address: &str) -> Result<Option<u64>> {
        let address = farmer_address.to_owned();
        self.with_conn(move |conn| {
            let count: Option<i64> = conn
                .query_row(
                    "SELECT block_count FROM farmer_total_blocks WHERE farmer_address = ?1",
                    params![address],
                    |row| row.get(0),
                )
                .optional()?;
            count.map(from_sql_int).transpose()
        })
        .await
    }

    /// Blocks attributed to `farmer_address` on UTC `day`.
    pub async fn farmer_daily(&self, farmer_address: &str, day: NaiveDate) -> Result<Option<u64>> {
        let address = farmer_address.to_owned();
        self.with_conn(move |conn| {
            let count: Option<i64> = conn
                .query_row(
                    "SELECT block_count FROM farmer_daily_blocks
                     WHERE farmer_address = ?1 AND day = ?2",
                    params![address, day.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            count.map(from_sql_int).transpose()
        })
        .await
    }

    /// Farmers with the most blocks overall, ties broken by address.
    pub async fn top_farmers(&self, limit: usize) -> Result<Vec<(String, u64)>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT farmer_address, block_count FROM farmer_total_blocks
                 ORDER BY block_count DESC, farmer_address ASC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(|(address, count)| Ok((address, from_sql_int(count)?)))
                .collect()
        })
        .await
    }

    /// Farmers with the most blocks on UTC `day`, ties broken by address.
    pub async fn daily_top_farmers(
        &self,
        day: NaiveDate,
        limit: usize,
    ) -> Result<Vec<(String, u64)>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT farmer_address, block_count FROM farmer_daily_blocks WHERE day = ?1
                 ORDER BY block_count DESC, farmer_address ASC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![day.to_string(), limit], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(|(address, count)| Ok((address, from_sql_int(count)?)))
                .collect()
        })
        .await
    }

    /// Stored record at `height`, if block syncing persisted one.
    pub async fn load_block(&self, height: u64) -> Result<Option<StoredBlock>> {
        let height = sql_int(height)?;
        self.with_conn(move |conn| {
            let sql = format!("SELECT {BLOCK_COLUMNS} FROM block_records WHERE height = ?1");
            Ok(conn
                .query_row(&sql, params![height], block_from_row)
                .optional()?)
        })
        .await
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn load_watermark(&self) -> Result<Option<u64>> {
        self.with_conn(|conn| {
            let height: Option<i64> = conn
                .query_row("SELECT height FROM sync_height WHERE id = 1", [], |row| {
                    row.get(0)
                })
                .optional()?;
            height.map(from_sql_int).transpose()
        })
        .await
    }

    async fn commit_batch(&self, writes: BatchWrites) -> Result<()> {
        self.with_conn(move |conn| {
            // Dropping `tx` without commit rolls everything back.
            let tx = conn.transaction()?;

            let current: Option<i64> = tx
                .query_row("SELECT height FROM sync_height WHERE id = 1", [], |row| {
                    row.get(0)
                })
                .optional()?;
            let expected = match current {
                Some(h) => from_sql_int(h)? + 1,
                None => 0,
            };
            if writes.start != expected {
                return Err(Error::OutOfOrder {
                    expected,
                    got: writes.start,
                });
            }

            {
                let mut totals = tx.prepare_cached(
                    "INSERT INTO farmer_total_blocks(farmer_address, block_count) VALUES(?1, ?2)
                     ON CONFLICT(farmer_address)
                     DO UPDATE SET block_count = block_count + excluded.block_count",
                )?;
                for (address, n) in &writes.totals {
                    totals.execute(params![address, sql_int(*n)?])?;
                }

                let mut daily = tx.prepare_cached(
                    "INSERT INTO farmer_daily_blocks(farmer_address, day, block_count)
                     VALUES(?1, ?2, ?3)
                     ON CONFLICT(farmer_address, day)
                     DO UPDATE SET block_count = block_count + excluded.block_count",
                )?;
                for ((address, day), n) in &writes.daily {
                    daily.execute(params![address, day.to_string(), sql_int(*n)?])?;
                }

                if !writes.blocks.is_empty() {
                    let mut insert = tx.prepare_cached(&format!(
                        "INSERT INTO block_records({BLOCK_COLUMNS}) VALUES
                         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                          ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
                    ))?;
                    for block in &writes.blocks {
                        let r = &block.record;
                        insert.execute(params![
                            sql_int(r.height)?,
                            r.header_hash,
                            r.prev_hash,
                            r.farmer_puzzle_hash,
                            r.pool_puzzle_hash,
                            r.timestamp.map(sql_int).transpose()?,
                            r.fees.map(sql_int).transpose()?,
                            sql_int(r.deficit)?,
                            r.overflow,
                            r.challenge_block_info_hash,
                            r.prev_transaction_block_hash,
                            sql_int(r.prev_transaction_block_height)?,
                            sql_int(r.required_iters)?,
                            r.reward_infusion_new_challenge,
                            sql_int(r.signage_point_index)?,
                            sql_int(r.sub_slot_iters)?,
                            r.total_iters.to_string(),
                            r.weight.to_string(),
                            block.farmer_address,
                            block.pool_address,
                            block.is_transaction_block,
                        ])?;
                    }
                }
            }

            tx.execute(
                "INSERT INTO sync_height(id, height) VALUES(1, ?1)
                 ON CONFLICT(id) DO UPDATE SET height = excluded.height",
                params![sql_int(writes.watermark)?],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

fn sql_int(v: u64) -> Result<i64> {
    i64::try_from(v).map_err(|_| Error::Persistence(format!("{v} does not fit an sqlite integer")))
}

fn from_sql_int(v: i64) -> Result<u64> {
    u64::try_from(v).map_err(|_| Error::Persistence(format!("negative count or height {v}")))
}

fn u64_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let v: i64 = row.get(idx)?;
    u64::try_from(v)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn opt_u64_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    let v: Option<i64> = row.get(idx)?;
    v.map(|v| {
        u64::try_from(v)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
    })
    .transpose()
}

fn u128_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<u128> {
    let v: String = row.get(idx)?;
    v.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<StoredBlock> {
    let record = BlockRecord {
        height: u64_col(row, 0)?,
        header_hash: row.get(1)?,
        prev_hash: row.get(2)?,
        farmer_puzzle_hash: row.get(3)?,
        pool_puzzle_hash: row.get(4)?,
        timestamp: opt_u64_col(row, 5)?,
        fees: opt_u64_col(row, 6)?,
        deficit: u64_col(row, 7)?,
        overflow: row.get(8)?,
        challenge_block_info_hash: row.get(9)?,
        prev_transaction_block_hash: row.get(10)?,
        prev_transaction_block_height: u64_col(row, 11)?,
        required_iters: u64_col(row, 12)?,
        reward_infusion_new_challenge: row.get(13)?,
        signage_point_index: u64_col(row, 14)?,
        sub_slot_iters: u64_col(row, 15)?,
        total_iters: u128_col(row, 16)?,
        weight: u128_col(row, 17)?,
    };
    Ok(StoredBlock {
        record,
        farmer_address: row.get(18)?,
        pool_address: row.get(19)?,
        is_transaction_block: row.get(20)?,
    })
}
