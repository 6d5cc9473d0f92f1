use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};

use crate::error::StoreError;
use crate::models::{ClientMatch, LedgerEntry, PaymentStatus};
use crate::normalize;
use crate::reconcile::{ClientDirectory, PaymentLedger};
use crate::types::{ImportPayload, ScanHistoryRecord, ScanStats};

pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn new(db_path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&db_path)?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO schema_version (version) SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM schema_version LIMIT 1);
            CREATE TABLE IF NOT EXISTS clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                identifier TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS ledger (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id INTEGER NOT NULL,
                period TEXT NOT NULL,
                period_key TEXT NOT NULL,
                amount REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                paid_at TEXT,
                paid_amount REAL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (client_id) REFERENCES clients(id)
            );
            CREATE INDEX IF NOT EXISTS idx_ledger_client ON ledger(client_id);
            CREATE INDEX IF NOT EXISTS idx_ledger_period ON ledger(client_id, period_key);
            CREATE TABLE IF NOT EXISTS scan_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                file_name TEXT NOT NULL,
                target_period TEXT,
                guide_count INTEGER NOT NULL,
                total_value REAL NOT NULL,
                error_count INTEGER NOT NULL,
                warning_count INTEGER NOT NULL
            );
            ",
        )?;

        Ok(Db {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Insert or update a client keyed by its normalized identifier; returns the id.
    pub fn upsert_client(&self, name: &str, identifier: &str) -> Result<i64, StoreError> {
        let normalized = normalize::normalize_identifier(identifier);
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO clients (name, identifier) VALUES (?1, ?2)
             ON CONFLICT(identifier) DO UPDATE SET name = excluded.name",
            params![name.trim(), normalized],
        )?;
        let id = conn.query_row(
            "SELECT id FROM clients WHERE identifier = ?1",
            params![normalized],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn add_ledger_entry(
        &self,
        client_id: i64,
        period: &str,
        amount: f64,
        status: PaymentStatus,
    ) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO ledger (client_id, period, period_key, amount, status) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                client_id,
                period.trim(),
                normalize::period_key(period),
                amount,
                status.as_str()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Seed clients and ledger entries from an import payload.
    /// Returns (clients upserted, entries added).
    pub fn import(&self, payload: &ImportPayload) -> Result<(usize, usize), StoreError> {
        let mut clients = 0usize;
        let mut entries = 0usize;
        for client in &payload.clients {
            let client_id = self.upsert_client(&client.name, &client.identifier)?;
            clients += 1;
            for entry in &client.ledger {
                self.add_ledger_entry(client_id, &entry.period, entry.amount, entry.status)?;
                entries += 1;
            }
        }
        Ok((clients, entries))
    }

    pub fn add_scan_record(
        &self,
        file_name: &str,
        target_period: Option<&str>,
        stats: &ScanStats,
    ) -> Result<i64, StoreError> {
        let created_at = chrono::Utc::now().to_rfc3339();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO scan_history (created_at, file_name, target_period, guide_count, total_value, error_count, warning_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                created_at,
                file_name,
                target_period,
                stats.count as i64,
                stats.total_value,
                stats.error_count as i64,
                stats.warning_count as i64
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_scan_history(&self) -> Result<Vec<ScanHistoryRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, created_at, file_name, target_period, guide_count, total_value, error_count, warning_count
             FROM scan_history ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ScanHistoryRecord {
                id: row.get(0)?,
                created_at: row.get(1)?,
                file_name: row.get(2)?,
                target_period: row.get(3)?,
                guide_count: row.get(4)?,
                total_value: row.get(5)?,
                error_count: row.get(6)?,
                warning_count: row.get(7)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl ClientDirectory for Db {
    fn lookup_identifiers(&self, identifiers: &[String]) -> Result<Vec<ClientMatch>, StoreError> {
        // Raw and normalized forms both arrive here; the table stores the
        // normalized key, so fold everything down before querying.
        let mut keys: Vec<String> = identifiers
            .iter()
            .map(|raw| normalize::normalize_identifier(raw))
            .collect();
        keys.sort();
        keys.dedup();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql = format!(
            "SELECT id, name, identifier FROM clients WHERE identifier IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(keys.iter()), |row| {
            Ok(ClientMatch {
                client_id: row.get(0)?,
                display_name: row.get(1)?,
                normalized_identifier: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl PaymentLedger for Db {
    fn entries_for_clients(
        &self,
        client_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<LedgerEntry>>, StoreError> {
        if client_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.lock()?;
        let placeholders = vec!["?"; client_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, client_id, period, amount, status, paid_at FROM ledger
             WHERE client_id IN ({placeholders}) ORDER BY client_id, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(client_ids.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut grouped: HashMap<i64, Vec<LedgerEntry>> = HashMap::new();
        for row in rows {
            let (id, client_id, period, amount, status, paid_at) = row?;
            let status =
                PaymentStatus::parse(&status).ok_or_else(|| StoreError::InvalidStatus(status.clone()))?;
            grouped.entry(client_id).or_default().push(LedgerEntry {
                id,
                client_id,
                period,
                amount,
                status,
                paid_at,
            });
        }
        Ok(grouped)
    }

    fn mark_paid(&self, client_id: i64, raw_period: &str, amount: f64) -> Result<(), StoreError> {
        let period_key = normalize::period_key(raw_period);
        let paid_at = chrono::Utc::now().to_rfc3339();
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE ledger SET status = 'paid', paid_at = ?1, paid_amount = ?2
             WHERE client_id = ?3 AND period_key = ?4 AND status != 'paid'",
            params![paid_at, amount, client_id, period_key],
        )?;
        if updated == 0 {
            return Err(StoreError::NoMatchingEntry {
                client_id,
                period: raw_period.to_string(),
            });
        }
        Ok(())
    }
}
