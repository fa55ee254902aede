//! TaskStore implementation with JSONL append log and SQLite index.
//!
//! - **JSONL file**: append-only log; every create and every terminal
//!   transition appends the full record (source of truth)
//! - **SQLite database**: query index, rebuilt from the log on open when the
//!   number of applied lines doesn't match the log
//!
//! Terminal transitions are compare-and-set on `pending`, so a record changes
//! status exactly once no matter how many writers race on it.
//!
//! Status consumers use [`TaskStore::open_read_only`], which never creates,
//! migrates or rebuilds anything on disk.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use super::progress::{Progress, ProgressReader, TaskStats};
use crate::domain::{TaskRecord, TaskStatus};
use crate::error::{AgentError, Result};

const JSONL_FILE: &str = "tasks.jsonl";
const DB_FILE: &str = "tasks.db";
const META_APPLIED_LINES: &str = "applied_lines";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable store of task records
pub struct TaskStore {
    dir: PathBuf,
    jsonl_path: PathBuf,
    db: Mutex<Connection>,
    read_only: bool,
}

impl TaskStore {
    /// Open or create a store in `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let jsonl_path = dir.join(JSONL_FILE);
        let db = Connection::open(dir.join(DB_FILE))?;
        db.busy_timeout(BUSY_TIMEOUT)?;
        Self::init_schema(&db)?;

        let store = Self {
            dir: dir.to_path_buf(),
            jsonl_path,
            db: Mutex::new(db),
            read_only: false,
        };
        store.rebuild_index_if_needed()?;

        Ok(store)
    }

    /// Open an existing store for reading only.
    ///
    /// The index is used as found, even when it lags the log.
    pub fn open_read_only(dir: &Path) -> Result<Self> {
        let db_path = dir.join(DB_FILE);
        if !db_path.exists() {
            return Err(AgentError::Storage(format!("no task store at {}", dir.display())));
        }
        let db = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        db.busy_timeout(BUSY_TIMEOUT)?;

        let store = Self {
            dir: dir.to_path_buf(),
            jsonl_path: dir.join(JSONL_FILE),
            db: Mutex::new(db),
            read_only: true,
        };
        let lines = store.count_jsonl_lines()?;
        let applied = Self::applied_lines(&*store.lock()?)?;
        if applied != lines {
            warn!("Task index covers {} of {} log lines", applied, lines);
        }
        Ok(store)
    }

    /// Whether a store has been created in `dir`
    pub fn exists(dir: &Path) -> bool {
        dir.join(DB_FILE).exists()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(AgentError::Storage("task store is open read-only".to_string()));
        }
        Ok(())
    }

    fn init_schema(db: &Connection) -> Result<()> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                seq INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                json_data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_seq ON tasks(seq);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| AgentError::Storage("task store lock poisoned".to_string()))
    }

    fn count_jsonl_lines(&self) -> Result<u64> {
        if !self.jsonl_path.exists() {
            return Ok(0);
        }
        let reader = BufReader::new(File::open(&self.jsonl_path)?);
        let mut count = 0;
        for line in reader.lines() {
            if !line?.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn applied_lines(db: &Connection) -> Result<u64> {
        let value: Option<i64> = db
            .query_row("SELECT value FROM meta WHERE key = ?1", [META_APPLIED_LINES], |row| row.get(0))
            .optional()?;
        Ok(value.unwrap_or(0) as u64)
    }

    fn set_applied_lines(db: &Connection, lines: u64) -> Result<()> {
        db.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![META_APPLIED_LINES, lines as i64],
        )?;
        Ok(())
    }

    fn rebuild_index_if_needed(&self) -> Result<()> {
        let lines = self.count_jsonl_lines()?;
        let mut db = self.lock()?;
        if Self::applied_lines(&db)? != lines {
            self.rebuild_index(&mut db)?;
        }
        Ok(())
    }

    /// Replay the JSONL log into a fresh index
    fn rebuild_index(&self, db: &mut Connection) -> Result<()> {
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, TaskRecord> = HashMap::new();
        let mut lines = 0u64;

        if self.jsonl_path.exists() {
            let reader = BufReader::new(File::open(&self.jsonl_path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                lines += 1;
                let record: TaskRecord = serde_json::from_str(&line)?;
                if !latest.contains_key(&record.id) {
                    order.push(record.id.clone());
                }
                latest.insert(record.id.clone(), record);
            }
        }

        let tx = db.transaction()?;
        tx.execute("DELETE FROM tasks", [])?;
        for (seq, id) in order.iter().enumerate() {
            if let Some(record) = latest.get(id) {
                Self::insert_record(&tx, record, seq as i64 + 1)?;
            }
        }
        Self::set_applied_lines(&tx, lines)?;
        tx.commit()?;

        info!("Rebuilt task index: {} records from {} log lines", order.len(), lines);
        Ok(())
    }

    fn insert_record(db: &Connection, record: &TaskRecord, seq: i64) -> Result<()> {
        db.execute(
            "INSERT OR REPLACE INTO tasks (id, seq, status, created_at, json_data) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                seq,
                record.status.as_str(),
                record.timestamp.timestamp_millis(),
                serde_json::to_string(record)?,
            ],
        )?;
        Ok(())
    }

    fn append_jsonl(&self, record: &TaskRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.jsonl_path)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    /// Create a pending record for `description` under `goal`
    pub fn create(&self, goal: &str, description: &str) -> Result<TaskRecord> {
        self.ensure_writable()?;
        let record = TaskRecord::new(goal, description);

        let mut db = self.lock()?;
        let tx = db.transaction()?;
        let seq: i64 = tx.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM tasks", [], |row| row.get(0))?;
        Self::insert_record(&tx, &record, seq)?;
        let applied = Self::applied_lines(&tx)?;
        self.append_jsonl(&record)?;
        Self::set_applied_lines(&tx, applied + 1)?;
        tx.commit()?;

        debug!("Created task {}: {}", record.id, record.description);
        Ok(record)
    }

    /// Mark a pending record completed
    pub fn complete(&self, id: &str, result: &str) -> Result<TaskRecord> {
        self.finish(id, TaskStatus::Completed, result)
    }

    /// Mark a pending record failed
    pub fn fail(&self, id: &str, error: &str) -> Result<TaskRecord> {
        self.finish(id, TaskStatus::Failed, error)
    }

    fn finish(&self, id: &str, status: TaskStatus, text: &str) -> Result<TaskRecord> {
        self.ensure_writable()?;
        let mut db = self.lock()?;
        let current = Self::get_in(&db, id)?.ok_or_else(|| AgentError::TaskNotFound(id.to_string()))?;
        let next = current
            .finished(status, text)
            .ok_or_else(|| AgentError::InvalidTransition {
                id: id.to_string(),
                from: current.status,
            })?;

        let tx = db.transaction()?;
        let changed = tx.execute(
            "UPDATE tasks SET status = ?1, json_data = ?2 WHERE id = ?3 AND status = ?4",
            params![
                next.status.as_str(),
                serde_json::to_string(&next)?,
                id,
                TaskStatus::Pending.as_str()
            ],
        )?;
        if changed == 0 {
            return Err(AgentError::InvalidTransition {
                id: id.to_string(),
                from: current.status,
            });
        }
        let applied = Self::applied_lines(&tx)?;
        self.append_jsonl(&next)?;
        Self::set_applied_lines(&tx, applied + 1)?;
        tx.commit()?;

        debug!("Task {} -> {}", id, status);
        Ok(next)
    }

    fn get_in(db: &Connection, id: &str) -> Result<Option<TaskRecord>> {
        let json: Option<String> = db
            .query_row("SELECT json_data FROM tasks WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Get a record by id
    pub fn get(&self, id: &str) -> Result<Option<TaskRecord>> {
        let db = self.lock()?;
        Self::get_in(&db, id)
    }

    /// Most recent `limit` records, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<TaskRecord>> {
        let db = self.lock()?;
        let mut stmt = db.prepare("SELECT json_data FROM tasks ORDER BY seq DESC LIMIT ?1")?;
        let rows = stmt.query_map([limit as i64], |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(serde_json::from_str(&row?)?);
        }
        Ok(records)
    }

    /// Records with the given status, oldest first
    pub fn list_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>> {
        let db = self.lock()?;
        let mut stmt = db.prepare("SELECT json_data FROM tasks WHERE status = ?1 ORDER BY seq")?;
        let rows = stmt.query_map([status.as_str()], |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(serde_json::from_str(&row?)?);
        }
        Ok(records)
    }

    /// Counts by status
    pub fn stats(&self) -> Result<TaskStats> {
        let db = self.lock()?;
        let mut stmt = db.prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

        let mut stats = TaskStats::default();
        for row in rows {
            let (status, count) = row?;
            let status = TaskStatus::parse(&status)
                .ok_or_else(|| AgentError::Storage(format!("unknown status in index: {}", status)))?;
            stats.add(status, count as u64);
        }
        Ok(stats)
    }

    pub fn progress(&self, limit: usize) -> Result<Progress> {
        Ok(Progress {
            recent: self.recent(limit)?,
            stats: self.stats()?,
        })
    }
}

impl ProgressReader for TaskStore {
    fn progress(&self, limit: usize) -> Result<Progress> {
        TaskStore::progress(self, limit)
    }

    fn task(&self, id: &str) -> Result<Option<TaskRecord>> {
        self.get(id)
    }

    fn task_stats(&self) -> Result<TaskStats> {
        self.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_temp_store() -> (TaskStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = TaskStore::open(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_open_creates_files() {
        let temp_dir = TempDir::new().unwrap();
        let _store = TaskStore::open(&temp_dir.path().join("nested")).unwrap();
        assert!(temp_dir.path().join("nested").join(DB_FILE).exists());
    }

    #[test]
    fn test_create_and_get() {
        let (store, _temp) = create_temp_store();
        let record = store.create("acquire funds", "request faucet funds").unwrap();

        let fetched = store.get(&record.id).unwrap().unwrap();
        assert_eq!(fetched, record);
        assert_eq!(fetched.status, TaskStatus::Pending);
    }

    #[test]
    fn test_get_nonexistent() {
        let (store, _temp) = create_temp_store();
        assert!(store.get("task-missing").unwrap().is_none());
    }

    #[test]
    fn test_complete_sets_result() {
        let (store, _temp) = create_temp_store();
        let record = store.create("g", "t").unwrap();
        let done = store.complete(&record.id, "0xabc").unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.result.as_deref(), Some("0xabc"));
        assert_eq!(store.get(&record.id).unwrap().unwrap(), done);
    }

    #[test]
    fn test_terminal_status_is_final() {
        let (store, _temp) = create_temp_store();
        let record = store.create("g", "t").unwrap();
        store.fail(&record.id, "insufficient balance").unwrap();

        let err = store.complete(&record.id, "late").unwrap_err();
        assert!(matches!(
            err,
            AgentError::InvalidTransition {
                from: TaskStatus::Failed,
                ..
            }
        ));
        let err = store.fail(&record.id, "again").unwrap_err();
        assert!(matches!(err, AgentError::InvalidTransition { .. }));

        let stored = store.get(&record.id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(stored.result.as_deref(), Some("insufficient balance"));
    }

    #[test]
    fn test_finish_unknown_task() {
        let (store, _temp) = create_temp_store();
        let err = store.complete("task-nope", "x").unwrap_err();
        assert!(matches!(err, AgentError::TaskNotFound(_)));
    }

    #[test]
    fn test_recent_is_newest_first() {
        let (store, _temp) = create_temp_store();
        let a = store.create("g", "first").unwrap();
        let b = store.create("g", "second").unwrap();
        let c = store.create("g", "third").unwrap();
        store.complete(&a.id, "done").unwrap();

        let recent = store.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, c.id);
        assert_eq!(recent[1].id, b.id);
    }

    #[test]
    fn test_stats_sum_to_total() {
        let (store, _temp) = create_temp_store();
        let a = store.create("g", "a").unwrap();
        let b = store.create("g", "b").unwrap();
        store.create("g", "c").unwrap();
        store.complete(&a.id, "ok").unwrap();
        store.fail(&b.id, "err").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending + stats.completed + stats.failed, stats.total);
    }

    #[test]
    fn test_list_by_status() {
        let (store, _temp) = create_temp_store();
        let a = store.create("g", "a").unwrap();
        store.create("g", "b").unwrap();
        store.complete(&a.id, "ok").unwrap();

        assert_eq!(store.list_by_status(TaskStatus::Completed).unwrap().len(), 1);
        assert_eq!(store.list_by_status(TaskStatus::Pending).unwrap().len(), 1);
        assert!(store.list_by_status(TaskStatus::Failed).unwrap().is_empty());
    }

    #[test]
    fn test_log_is_source_of_truth() {
        let temp_dir = TempDir::new().unwrap();
        let (id, pending_id) = {
            let store = TaskStore::open(temp_dir.path()).unwrap();
            let a = store.create("g", "a").unwrap();
            let b = store.create("g", "b").unwrap();
            store.complete(&a.id, "ok").unwrap();
            (a.id, b.id)
        };

        // Drop the index; reopening replays the log
        fs::remove_file(temp_dir.path().join(DB_FILE)).unwrap();
        let store = TaskStore::open(temp_dir.path()).unwrap();

        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(store.recent(1).unwrap()[0].id, pending_id);
        assert_eq!(store.stats().unwrap().total, 2);
    }

    #[test]
    fn test_index_behind_log_is_rebuilt() {
        let temp_dir = TempDir::new().unwrap();
        let store = TaskStore::open(temp_dir.path()).unwrap();
        let record = store.create("g", "a").unwrap();
        drop(store);

        // Another writer appended a terminal line the index never saw
        let done = record.finished(TaskStatus::Failed, "crash").unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(temp_dir.path().join(JSONL_FILE))
            .unwrap();
        writeln!(file, "{}", serde_json::to_string(&done).unwrap()).unwrap();
        drop(file);

        let store = TaskStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.get(&record.id).unwrap().unwrap().status, TaskStatus::Failed);
    }

    #[test]
    fn test_concurrent_finish_transitions_once() {
        let (store, _temp) = create_temp_store();
        let store = Arc::new(store);
        let record = store.create("g", "race").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let id = record.id.clone();
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        store.complete(&id, "ok").is_ok()
                    } else {
                        store.fail(&id, "err").is_ok()
                    }
                })
            })
            .collect();

        let winners = handles.into_iter().filter_map(|h| h.join().ok()).filter(|ok| *ok).count();
        assert_eq!(winners, 1);
        assert!(store.get(&record.id).unwrap().unwrap().status.is_terminal());
        assert_eq!(store.stats().unwrap().pending, 0);
    }

    #[test]
    fn test_progress_reader_view() {
        let (store, _temp) = create_temp_store();
        let a = store.create("g", "a").unwrap();
        store.complete(&a.id, "ok").unwrap();

        let reader: &dyn ProgressReader = &store;
        let progress = reader.progress(10).unwrap();
        assert_eq!(progress.recent.len(), 1);
        assert_eq!(progress.stats.completed, 1);
        assert!(reader.task(&a.id).unwrap().is_some());
        assert_eq!(reader.task_stats().unwrap().total, 1);
    }

    #[test]
    fn test_read_only_sees_live_writes() {
        let (store, temp) = create_temp_store();
        let a = store.create("g", "a").unwrap();

        let reader = TaskStore::open_read_only(temp.path()).unwrap();
        assert_eq!(reader.stats().unwrap().total, 1);

        store.complete(&a.id, "ok").unwrap();
        store.create("g", "b").unwrap();
        let progress = reader.progress(10).unwrap();
        assert_eq!(progress.stats.total, 2);
        assert_eq!(progress.stats.completed, 1);
    }

    #[test]
    fn test_read_only_refuses_writes() {
        let (store, temp) = create_temp_store();
        let a = store.create("g", "a").unwrap();
        let log_before = fs::read_to_string(temp.path().join(JSONL_FILE)).unwrap();

        let reader = TaskStore::open_read_only(temp.path()).unwrap();
        assert!(matches!(reader.create("g", "b").unwrap_err(), AgentError::Storage(_)));
        assert!(matches!(reader.complete(&a.id, "ok").unwrap_err(), AgentError::Storage(_)));

        assert_eq!(fs::read_to_string(temp.path().join(JSONL_FILE)).unwrap(), log_before);
        assert_eq!(store.get(&a.id).unwrap().unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_read_only_does_not_rebuild_stale_index() {
        let temp_dir = TempDir::new().unwrap();
        let store = TaskStore::open(temp_dir.path()).unwrap();
        let record = store.create("g", "a").unwrap();
        drop(store);

        let done = record.finished(TaskStatus::Failed, "crash").unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(temp_dir.path().join(JSONL_FILE))
            .unwrap();
        writeln!(file, "{}", serde_json::to_string(&done).unwrap()).unwrap();
        drop(file);

        // Index is read as found
        let reader = TaskStore::open_read_only(temp_dir.path()).unwrap();
        assert_eq!(reader.get(&record.id).unwrap().unwrap().status, TaskStatus::Pending);
        drop(reader);

        let store = TaskStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.get(&record.id).unwrap().unwrap().status, TaskStatus::Failed);
    }

    #[test]
    fn test_read_only_missing_store_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("absent");
        assert!(!TaskStore::exists(&dir));
        assert!(TaskStore::open_read_only(&dir).is_err());
        assert!(!dir.exists());
    }
}
