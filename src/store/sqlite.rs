/**
 * BACKEND SQLITE - Variante persistée du store de samples
 *
 * RÔLE : même contrat que le backend mémoire, avec survie au redémarrage.
 * Colonnes miroir des champs connus (tri, inspection SQL) + colonne payload
 * sérialisée pour un round-trip exact du sample.
 *
 * FONCTIONNEMENT : insert puis trim-aux-N-plus-récents par ordre de timestamp,
 * dans une même transaction. Connexion unique derrière un mutex : la section
 * critique insert+trim n'est jamais entrelacée avec une lecture.
 */
use super::{ClientSummary, MetricsStore, SampleOrder, StoreError, TaggedSample};
use crate::models::Sample;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS samples (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id   TEXT NOT NULL,
    ts          TEXT NOT NULL DEFAULT '',
    received_at TEXT,
    client_name TEXT,
    cpu_percent REAL,
    gpu_percent REAL,
    ram_percent REAL,
    ping_ms     REAL,
    payload     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_samples_client_ts ON samples (client_id, ts);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    cap: usize,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P, cap: usize) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            cap,
        })
    }

    /// Variante en mémoire pour les tests.
    pub fn open_in_memory(cap: usize) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            cap,
        })
    }

    fn window_query(
        conn: &Connection,
        client_id: Option<&str>,
        limit: usize,
        order: SampleOrder,
    ) -> Result<Vec<TaggedSample>, StoreError> {
        let sql = match client_id {
            Some(_) => {
                "SELECT client_id, payload FROM samples WHERE client_id = ?1 \
                 ORDER BY ts DESC, id DESC LIMIT ?2"
            }
            None => "SELECT client_id, payload FROM samples ORDER BY ts DESC, id DESC LIMIT ?1",
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String)> {
            Ok((row.get(0)?, row.get(1)?))
        };
        let rows: Vec<(String, String)> = match client_id {
            Some(id) => stmt
                .query_map(rusqlite::params![id, limit], map_row)?
                .collect::<rusqlite::Result<_>>()?,
            None => stmt
                .query_map(rusqlite::params![limit], map_row)?
                .collect::<rusqlite::Result<_>>()?,
        };

        let mut samples = Vec::with_capacity(rows.len());
        for (client_id, payload) in rows {
            let sample: Sample = serde_json::from_str(&payload)?;
            samples.push(TaggedSample { client_id, sample });
        }
        if order == SampleOrder::OldestFirst {
            samples.reverse();
        }
        Ok(samples)
    }
}

impl MetricsStore for SqliteStore {
    fn append(&self, client_id: &str, sample: Sample) -> Result<usize, StoreError> {
        let payload = serde_json::to_string(&sample)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO samples \
             (client_id, ts, received_at, client_name, cpu_percent, gpu_percent, ram_percent, ping_ms, payload) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                client_id,
                sample.timestamp.as_deref().unwrap_or(""),
                sample.received_at,
                sample.client_name,
                sample.cpu_percent,
                sample.gpu_percent,
                sample.ram_percent(),
                sample.ping_ms,
                payload,
            ],
        )?;

        // Trim : ne garder que les N plus récents par timestamp
        tx.execute(
            "DELETE FROM samples WHERE client_id = ?1 AND id NOT IN (\
                SELECT id FROM samples WHERE client_id = ?1 \
                ORDER BY ts DESC, id DESC LIMIT ?2)",
            rusqlite::params![client_id, self.cap as i64],
        )?;

        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM samples WHERE client_id = ?1",
            rusqlite::params![client_id],
            |row| row.get(0),
        )?;
        tx.commit()?;
        Ok(count as usize)
    }

    fn all_samples(
        &self,
        limit: usize,
        order: SampleOrder,
    ) -> Result<Vec<TaggedSample>, StoreError> {
        let conn = self.conn.lock();
        Self::window_query(&conn, None, limit, order)
    }

    fn client_samples(
        &self,
        client_id: &str,
        limit: usize,
        order: SampleOrder,
    ) -> Result<Vec<TaggedSample>, StoreError> {
        let conn = self.conn.lock();
        Self::window_query(&conn, Some(client_id), limit, order)
    }

    fn roster(&self) -> Result<Vec<ClientSummary>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT s.client_id, COUNT(*), MAX(s.ts), \
                    (SELECT n.client_name FROM samples n WHERE n.client_id = s.client_id \
                     ORDER BY n.ts DESC, n.id DESC LIMIT 1) \
             FROM samples s GROUP BY s.client_id ORDER BY s.client_id",
        )?;
        let rows = stmt.query_map([], |row| {
            let client_id: String = row.get(0)?;
            let metric_count: i64 = row.get(1)?;
            let last_seen: Option<String> = row.get(2)?;
            let client_name: Option<String> = row.get(3)?;
            Ok(ClientSummary {
                client_name: client_name.unwrap_or_else(|| client_id.clone()),
                client_id,
                last_seen: last_seen.filter(|s| !s.is_empty()),
                metric_count: metric_count as usize,
            })
        })?;
        let mut roster = Vec::new();
        for row in rows {
            roster.push(row?);
        }
        Ok(roster)
    }

    fn total_clients(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(DISTINCT client_id) FROM samples", [], |row| {
                row.get(0)
            })?;
        Ok(count as usize)
    }

    fn total_samples(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
