//! The per-build-root file-deps database.
//!
//! For every output file the database stores the command that last
//! produced it, the compiler output of that command, and the input files
//! the compiler reported. The executor reads this to decide what to skip
//! and writes back every record from a build in one transaction.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::build::deps::FileDepsInfo;

/// An open file-deps database.
pub struct FileDepsDb {
    conn: Connection,
}

impl FileDepsDb {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open build database {}", path.display()))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = 1;

            CREATE TABLE IF NOT EXISTS drydock_files (
                file_id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS drydock_file_commands (
                command_id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL UNIQUE
                    REFERENCES drydock_files(file_id) ON DELETE CASCADE,
                command TEXT NOT NULL,
                output TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS drydock_deps (
                input_file_id INTEGER NOT NULL
                    REFERENCES drydock_files(file_id) ON DELETE CASCADE,
                output_file_id INTEGER NOT NULL
                    REFERENCES drydock_files(file_id) ON DELETE CASCADE,
                UNIQUE(input_file_id, output_file_id)
            );
            "#,
        )
        .context("failed to initialize build database schema")?;
        Ok(FileDepsDb { conn })
    }

    fn file_id(&self, path: &Path) -> Result<i64> {
        let text = path.display().to_string();
        self.conn.execute(
            "INSERT OR IGNORE INTO drydock_files (path) VALUES (?1)",
            params![text],
        )?;
        let id = self.conn.query_row(
            "SELECT file_id FROM drydock_files WHERE path = ?1",
            params![text],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    /// Store every record from a finished build in a single transaction.
    pub fn update_deps_info(&self, records: &[FileDepsInfo]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for info in records {
            self.store_one(info)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn store_one(&self, info: &FileDepsInfo) -> Result<()> {
        let output_id = self.file_id(&info.output)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO drydock_file_commands (file_id, command, output)
             VALUES (?1, ?2, ?3)",
            params![output_id, info.command, info.command_output],
        )?;
        self.conn.execute(
            "DELETE FROM drydock_deps WHERE output_file_id = ?1",
            params![output_id],
        )?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO drydock_deps (input_file_id, output_file_id)
             VALUES (?1, ?2)",
        )?;
        for input in &info.inputs {
            let input_id = self.file_id(input)?;
            stmt.execute(params![input_id, output_id])?;
        }
        Ok(())
    }

    /// The command and compiler output last recorded for `output`.
    pub fn command_of(&self, output: &Path) -> Result<Option<(String, String)>> {
        let row = self
            .conn
            .query_row(
                "SELECT c.command, c.output
                   FROM drydock_file_commands c
                   JOIN drydock_files f ON f.file_id = c.file_id
                  WHERE f.path = ?1",
                params![output.display().to_string()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    /// The inputs last recorded for `output`.
    pub fn inputs_of(&self, output: &Path) -> Result<Vec<PathBuf>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT fi.path
               FROM drydock_deps d
               JOIN drydock_files fo ON fo.file_id = d.output_file_id
               JOIN drydock_files fi ON fi.file_id = d.input_file_id
              WHERE fo.path = ?1
           ORDER BY fi.path",
        )?;
        let rows = stmt.query_map(params![output.display().to_string()], |r| {
            r.get::<_, String>(0)
        })?;
        let mut inputs = Vec::new();
        for row in rows {
            inputs.push(PathBuf::from(row?));
        }
        Ok(inputs)
    }
}

/// What the database knows about whether `output` is stale.
#[derive(Debug, Clone, Default)]
pub struct RebuildInfo {
    /// The command that last produced the output, if any was recorded.
    pub previous_command: Option<String>,
    /// The compiler output of that command.
    pub previous_command_output: Option<String>,
    /// Recorded inputs that are missing or newer than the output file.
    pub newer_inputs: Vec<PathBuf>,
}

/// Compare the recorded inputs of `output` against the filesystem.
pub fn get_rebuild_info(db: &FileDepsDb, output: &Path) -> Result<RebuildInfo> {
    let Some((command, command_output)) = db.command_of(output)? else {
        return Ok(RebuildInfo::default());
    };

    let output_mtime = mtime_of(output);
    let newer_inputs = db
        .inputs_of(output)?
        .into_iter()
        .filter(|input| match (mtime_of(input), output_mtime) {
            (Some(input_mtime), Some(output_mtime)) => input_mtime > output_mtime,
            // A missing input or output always counts as out-of-date.
            _ => true,
        })
        .collect();

    Ok(RebuildInfo {
        previous_command: Some(command),
        previous_command_output: Some(command_output),
        newer_inputs,
    })
}

fn mtime_of(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
