//! SQLite-backed [`JobStore`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{ArchiveJob, FileEntry, Job};
use crate::repo::{JobStore, RepoResult, RepositoryError};
use crate::types::{ArchiveType, JobState};

const DDL: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    job_id                TEXT PRIMARY KEY,
    user_name             TEXT NOT NULL,
    archive_type          TEXT NOT NULL,
    archive_size          INTEGER NOT NULL,
    total_size            INTEGER NOT NULL,
    total_size_complete   INTEGER NOT NULL,
    num_files             INTEGER NOT NULL,
    num_files_complete    INTEGER NOT NULL,
    num_archives          INTEGER NOT NULL,
    num_archives_complete INTEGER NOT NULL,
    state                 TEXT NOT NULL,
    start_time            INTEGER NOT NULL,
    end_time              INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS archive_jobs (
    job_id       TEXT NOT NULL,
    archive_id   INTEGER NOT NULL,
    archive_type TEXT NOT NULL,
    archive_file TEXT NOT NULL,
    hash_file    TEXT NOT NULL,
    archive_url  TEXT NOT NULL,
    hash_url     TEXT NOT NULL,
    host_name    TEXT NOT NULL,
    server_name  TEXT NOT NULL,
    num_files    INTEGER NOT NULL,
    size         INTEGER NOT NULL,
    state        TEXT NOT NULL,
    start_time   INTEGER NOT NULL,
    end_time     INTEGER NOT NULL,
    PRIMARY KEY (job_id, archive_id)
);
CREATE TABLE IF NOT EXISTS file_entries (
    job_id     TEXT NOT NULL,
    archive_id INTEGER NOT NULL,
    file_path  TEXT NOT NULL,
    entry_path TEXT NOT NULL,
    size       INTEGER NOT NULL,
    state      TEXT NOT NULL,
    PRIMARY KEY (job_id, archive_id, file_path)
);
";

/// Job store over a single SQLite connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> RepoResult<Self> {
        let conn = Connection::open(path).map_err(RepositoryError::unavailable)?;
        Self::from_connection(conn)
    }

    /// In-memory store for tests.
    pub fn memory() -> RepoResult<Self> {
        let conn = Connection::open_in_memory().map_err(RepositoryError::unavailable)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> RepoResult<Self> {
        conn.execute_batch(DDL)
            .map_err(RepositoryError::unavailable)?;
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A poisoned mutex means a writer panicked mid-statement; the
        // connection itself is still usable for independent statements.
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn parse_state(job_id: &str, text: &str) -> RepoResult<JobState> {
        JobState::parse(text).ok_or_else(|| RepositoryError::Corrupt {
            job_id: job_id.to_string(),
            message: format!("unknown state [ {text} ]"),
        })
    }

    fn parse_type(job_id: &str, text: &str) -> RepoResult<ArchiveType> {
        ArchiveType::parse(text).ok_or_else(|| RepositoryError::Corrupt {
            job_id: job_id.to_string(),
            message: format!("unknown archive type [ {text} ]"),
        })
    }

    fn load_entries(
        conn: &Connection,
        job_id: &str,
        archive_id: u32,
    ) -> RepoResult<Vec<FileEntry>> {
        let mut stmt = conn
            .prepare(
                "SELECT file_path, entry_path, size, state
                 FROM file_entries
                 WHERE job_id = ?1 AND archive_id = ?2
                 ORDER BY rowid",
            )
            .map_err(RepositoryError::unavailable)?;
        let rows = stmt
            .query_map(params![job_id, archive_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(RepositoryError::unavailable)?;

        let mut entries = Vec::new();
        for row in rows {
            let (file_path, entry_path, size, state) =
                row.map_err(RepositoryError::unavailable)?;
            entries.push(FileEntry {
                job_id: job_id.to_string(),
                archive_id,
                file_path,
                entry_path,
                size,
                state: Self::parse_state(job_id, &state)?,
            });
        }
        Ok(entries)
    }

    fn load_archive_row(
        conn: &Connection,
        job_id: &str,
        archive_id: u32,
    ) -> RepoResult<Option<ArchiveJob>> {
        let row = conn
            .query_row(
                "SELECT archive_type, archive_file, hash_file, archive_url, hash_url,
                        host_name, server_name, num_files, size, state, start_time, end_time
                 FROM archive_jobs
                 WHERE job_id = ?1 AND archive_id = ?2",
                params![job_id, archive_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, u64>(7)?,
                        row.get::<_, u64>(8)?,
                        row.get::<_, String>(9)?,
                        row.get::<_, i64>(10)?,
                        row.get::<_, i64>(11)?,
                    ))
                },
            )
            .optional()
            .map_err(RepositoryError::unavailable)?;

        let Some((
            archive_type,
            archive_file,
            hash_file,
            archive_url,
            hash_url,
            host_name,
            server_name,
            num_files,
            size,
            state,
            start_time,
            end_time,
        )) = row
        else {
            return Ok(None);
        };

        Ok(Some(ArchiveJob {
            job_id: job_id.to_string(),
            archive_id,
            archive_type: Self::parse_type(job_id, &archive_type)?,
            archive_file,
            hash_file,
            archive_url,
            hash_url,
            host_name,
            server_name,
            num_files,
            size,
            state: Self::parse_state(job_id, &state)?,
            start_time,
            end_time,
            files: Self::load_entries(conn, job_id, archive_id)?,
        }))
    }
}

impl JobStore for SqliteStore {
    fn persist_job(&self, job: &Job) -> RepoResult<()> {
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(RepositoryError::unavailable)?;
        tx.execute(
            "INSERT INTO jobs (job_id, user_name, archive_type, archive_size, total_size,
                               total_size_complete, num_files, num_files_complete,
                               num_archives, num_archives_complete, state, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                job.job_id,
                job.user_name,
                job.archive_type.as_str(),
                job.archive_size,
                job.total_size,
                job.total_size_complete,
                job.num_files,
                job.num_files_complete,
                job.num_archives,
                job.num_archives_complete,
                job.state.as_str(),
                job.start_time,
                job.end_time,
            ],
        )
        .map_err(RepositoryError::unavailable)?;

        for archive in &job.archives {
            tx.execute(
                "INSERT INTO archive_jobs (job_id, archive_id, archive_type, archive_file,
                                           hash_file, archive_url, hash_url, host_name,
                                           server_name, num_files, size, state,
                                           start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    archive.job_id,
                    archive.archive_id,
                    archive.archive_type.as_str(),
                    archive.archive_file,
                    archive.hash_file,
                    archive.archive_url,
                    archive.hash_url,
                    archive.host_name,
                    archive.server_name,
                    archive.num_files,
                    archive.size,
                    archive.state.as_str(),
                    archive.start_time,
                    archive.end_time,
                ],
            )
            .map_err(RepositoryError::unavailable)?;

            for entry in &archive.files {
                tx.execute(
                    "INSERT INTO file_entries (job_id, archive_id, file_path, entry_path,
                                               size, state)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        entry.job_id,
                        entry.archive_id,
                        entry.file_path,
                        entry.entry_path,
                        entry.size,
                        entry.state.as_str(),
                    ],
                )
                .map_err(RepositoryError::unavailable)?;
            }
        }
        tx.commit().map_err(RepositoryError::unavailable)
    }

    fn update_job(&self, job: &Job) -> RepoResult<()> {
        self.lock()
            .execute(
                "UPDATE jobs SET user_name = ?2, state = ?3, total_size_complete = ?4,
                                 num_files_complete = ?5, num_archives_complete = ?6,
                                 start_time = ?7, end_time = ?8
                 WHERE job_id = ?1",
                params![
                    job.job_id,
                    job.user_name,
                    job.state.as_str(),
                    job.total_size_complete,
                    job.num_files_complete,
                    job.num_archives_complete,
                    job.start_time,
                    job.end_time,
                ],
            )
            .map_err(RepositoryError::unavailable)?;
        Ok(())
    }

    fn update_archive(&self, archive: &ArchiveJob) -> RepoResult<()> {
        self.lock()
            .execute(
                "UPDATE archive_jobs SET host_name = ?3, server_name = ?4, state = ?5,
                                         start_time = ?6, end_time = ?7
                 WHERE job_id = ?1 AND archive_id = ?2",
                params![
                    archive.job_id,
                    archive.archive_id,
                    archive.host_name,
                    archive.server_name,
                    archive.state.as_str(),
                    archive.start_time,
                    archive.end_time,
                ],
            )
            .map_err(RepositoryError::unavailable)?;
        Ok(())
    }

    fn update_file_entry_state(
        &self,
        job_id: &str,
        archive_id: u32,
        file_path: &str,
        state: JobState,
    ) -> RepoResult<()> {
        self.lock()
            .execute(
                "UPDATE file_entries SET state = ?4
                 WHERE job_id = ?1 AND archive_id = ?2 AND file_path = ?3",
                params![job_id, archive_id, file_path, state.as_str()],
            )
            .map_err(RepositoryError::unavailable)?;
        Ok(())
    }

    fn get_job(&self, job_id: &str) -> RepoResult<Option<Job>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT user_name, archive_type, archive_size, total_size,
                        total_size_complete, num_files, num_files_complete,
                        num_archives, num_archives_complete, state, start_time, end_time
                 FROM jobs WHERE job_id = ?1",
                params![job_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u64>(2)?,
                        row.get::<_, u64>(3)?,
                        row.get::<_, u64>(4)?,
                        row.get::<_, u64>(5)?,
                        row.get::<_, u64>(6)?,
                        row.get::<_, u32>(7)?,
                        row.get::<_, u32>(8)?,
                        row.get::<_, String>(9)?,
                        row.get::<_, i64>(10)?,
                        row.get::<_, i64>(11)?,
                    ))
                },
            )
            .optional()
            .map_err(RepositoryError::unavailable)?;

        let Some((
            user_name,
            archive_type,
            archive_size,
            total_size,
            total_size_complete,
            num_files,
            num_files_complete,
            num_archives,
            num_archives_complete,
            state,
            start_time,
            end_time,
        )) = row
        else {
            return Ok(None);
        };

        let mut stmt = conn
            .prepare("SELECT archive_id FROM archive_jobs WHERE job_id = ?1 ORDER BY archive_id")
            .map_err(RepositoryError::unavailable)?;
        let ids: Vec<u32> = stmt
            .query_map(params![job_id], |row| row.get(0))
            .map_err(RepositoryError::unavailable)?
            .collect::<Result<_, _>>()
            .map_err(RepositoryError::unavailable)?;

        let mut archives = Vec::with_capacity(ids.len());
        for archive_id in ids {
            if let Some(archive) = Self::load_archive_row(&conn, job_id, archive_id)? {
                archives.push(archive);
            }
        }

        Ok(Some(Job {
            job_id: job_id.to_string(),
            user_name,
            archive_type: Self::parse_type(job_id, &archive_type)?,
            archive_size,
            total_size,
            total_size_complete,
            num_files,
            num_files_complete,
            num_archives,
            num_archives_complete,
            state: Self::parse_state(job_id, &state)?,
            start_time,
            end_time,
            archives,
        }))
    }

    fn get_archive(&self, job_id: &str, archive_id: u32) -> RepoResult<Option<ArchiveJob>> {
        let conn = self.lock();
        Self::load_archive_row(&conn, job_id, archive_id)
    }

    fn get_file_entry(
        &self,
        job_id: &str,
        archive_id: u32,
        file_path: &str,
    ) -> RepoResult<Option<FileEntry>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT entry_path, size, state FROM file_entries
             WHERE job_id = ?1 AND archive_id = ?2 AND file_path = ?3",
            params![job_id, archive_id, file_path],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()
        .map_err(RepositoryError::unavailable)?
        .map(|(entry_path, size, state)| {
            Ok(FileEntry {
                job_id: job_id.to_string(),
                archive_id,
                file_path: file_path.to_string(),
                entry_path,
                size,
                state: Self::parse_state(job_id, &state)?,
            })
        })
        .transpose()
    }

    fn list_job_ids(&self) -> RepoResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT job_id FROM jobs ORDER BY rowid")
            .map_err(RepositoryError::unavailable)?;
        let ids = stmt
            .query_map([], |row| row.get(0))
            .map_err(RepositoryError::unavailable)?
            .collect::<Result<_, _>>()
            .map_err(RepositoryError::unavailable)?;
        Ok(ids)
    }
}
