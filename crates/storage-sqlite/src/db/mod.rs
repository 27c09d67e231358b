//! Database setup: file location, integrity check, pool and migrations.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{debug, error, info};

use crate::errors::{IntoCore, StorageError};
use marketfeed_core::errors::{DatabaseError, Error, Result};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// File name of the collector database inside the data directory.
pub const DB_FILE_NAME: &str = "marketfeed.db";

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

pub mod write_actor;
pub use write_actor::{spawn_writer, WriteHandle};

/// Prepare the database file under `data_dir` and return its path.
///
/// An existing file is integrity-checked first. A corrupted file aborts with
/// [`DatabaseError::Corrupted`] unless `recover_on_corruption` is set, in which
/// case it is moved aside and a fresh file takes its place.
pub fn init(data_dir: &str, recover_on_corruption: bool) -> Result<String> {
    let db_path = get_db_path(data_dir);

    let dir = Path::new(data_dir);
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }

    if Path::new(&db_path).exists() {
        match check_integrity(&db_path) {
            Ok(()) => debug!("Integrity check passed for {}", db_path),
            Err(Error::Database(DatabaseError::Corrupted(reason))) if recover_on_corruption => {
                let moved_to = recover_corrupted_database(&db_path)?;
                error!(
                    "Database {} failed its integrity check ({}); moved to {}, stored data discarded and a new database will be created",
                    db_path, reason, moved_to
                );
            }
            Err(e) => {
                error!("Database {} failed its integrity check: {}", db_path, e);
                return Err(e);
            }
        }
    }

    let mut conn = SqliteConnection::establish(&db_path).into_core()?;
    conn.batch_execute(
        "
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 30000;
            PRAGMA synchronous  = NORMAL;
        ",
    )
    .into_core()?;

    Ok(db_path)
}

pub fn get_db_path(data_dir: &str) -> String {
    Path::new(data_dir)
        .join(DB_FILE_NAME)
        .to_string_lossy()
        .into_owned()
}

#[derive(QueryableByName)]
struct QuickCheckRow {
    #[diesel(sql_type = Text)]
    quick_check: String,
}

/// Run `PRAGMA quick_check` against the file at `db_path`.
///
/// Returns [`DatabaseError::Corrupted`] when SQLite reports anything other
/// than `ok`, or cannot read the file as a database at all.
pub fn check_integrity(db_path: &str) -> Result<()> {
    let corrupted = |reason: String| Error::Database(DatabaseError::Corrupted(reason));

    let mut conn = SqliteConnection::establish(db_path).map_err(|e| corrupted(e.to_string()))?;
    let rows = diesel::sql_query("PRAGMA quick_check")
        .load::<QuickCheckRow>(&mut conn)
        .map_err(|e| corrupted(e.to_string()))?;

    let problems: Vec<String> = rows
        .into_iter()
        .map(|row| row.quick_check)
        .filter(|line| line != "ok")
        .collect();

    if problems.is_empty() {
        Ok(())
    } else {
        Err(corrupted(problems.join("; ")))
    }
}

/// Move a corrupted database and its WAL/SHM side files aside.
///
/// Each file is renamed with a `.corrupt-<timestamp>` suffix. Returns the new
/// path of the main file.
pub fn recover_corrupted_database(db_path: &str) -> Result<String> {
    let suffix = format!("corrupt-{}", Utc::now().format("%Y%m%d_%H%M%S"));
    let moved_to = format!("{}.{}", db_path, suffix);

    for side in ["", "-wal", "-shm"] {
        let source = format!("{}{}", db_path, side);
        if !Path::new(&source).exists() {
            continue;
        }
        let target = format!("{}{}.{}", db_path, side, suffix);
        fs::rename(&source, &target).map_err(|e| {
            error!("Failed to move {} aside: {}", source, e);
            Error::Database(DatabaseError::RecoveryFailed(format!("{}: {}", source, e)))
        })?;
        info!("Moved {} to {}", source, target);
    }

    Ok(moved_to)
}

pub fn create_pool(db_path: &str) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = r2d2::Pool::builder()
        .max_size(8)
        .min_idle(Some(1))
        .connection_timeout(Duration::from_secs(30))
        .connection_customizer(Box::new(ConnectionCustomizer {}))
        .build(manager)
        .map_err(|e| Error::Database(DatabaseError::PoolCreationFailed(e.to_string())))?;
    Ok(Arc::new(pool))
}

pub fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Running database migrations");
    let mut connection = get_connection(pool)?;

    let applied = connection.run_pending_migrations(MIGRATIONS).map_err(|e| {
        error!("Database migration failed: {}", e);
        Error::from(StorageError::MigrationFailed(e.to_string()))
    })?;

    if applied.is_empty() {
        info!("No pending migrations to apply.");
    } else {
        for version in &applied {
            info!("Applied migration {}", version);
        }
    }

    Ok(())
}

/// Gets a connection from the pool
pub fn get_connection(pool: &Pool<ConnectionManager<SqliteConnection>>) -> Result<DbConnection> {
    pool.get().into_core()
}

#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionCustomizer {
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(
            "
            PRAGMA busy_timeout = 30000;
            PRAGMA synchronous = NORMAL;
        ",
        )
        .map_err(diesel::r2d2::Error::QueryError)?;

        Ok(())
    }
}

/// Everything a repository needs: the read pool and the writer.
#[derive(Clone)]
pub struct Database {
    pub pool: Arc<DbPool>,
    pub writer: WriteHandle,
}

/// Initialise, migrate and start the writer for the database in `data_dir`.
///
/// Must be called from within a Tokio runtime.
pub fn open(data_dir: &str, recover_on_corruption: bool) -> Result<Database> {
    let db_path = init(data_dir, recover_on_corruption)?;
    let pool = create_pool(&db_path)?;
    run_migrations(&pool)?;
    let writer = spawn_writer((*pool).clone());
    info!("Database ready at {}", db_path);
    Ok(Database { pool, writer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_fresh_database_passes_integrity_check() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();

        let db_path = init(data_dir, false).unwrap();
        let pool = create_pool(&db_path).unwrap();
        run_migrations(&pool).unwrap();

        check_integrity(&db_path).unwrap();
        // Migrations are idempotent
        run_migrations(&pool).unwrap();
    }

    #[test]
    fn test_garbage_file_is_reported_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = get_db_path(dir.path().to_str().unwrap());
        let mut file = fs::File::create(&db_path).unwrap();
        file.write_all(&[0xAB; 8192]).unwrap();
        drop(file);

        let err = check_integrity(&db_path).unwrap_err();
        assert!(matches!(err, Error::Database(DatabaseError::Corrupted(_))));

        let err = init(dir.path().to_str().unwrap(), false).unwrap_err();
        assert!(matches!(err, Error::Database(DatabaseError::Corrupted(_))));
        // Nothing was moved without consent
        assert!(Path::new(&db_path).exists());
    }

    #[test]
    fn test_recovery_moves_corrupt_files_aside() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();
        let db_path = get_db_path(data_dir);
        fs::write(&db_path, [0xCD; 8192]).unwrap();
        fs::write(format!("{}-wal", db_path), b"wal").unwrap();

        let db_path = init(data_dir, true).unwrap();
        let pool = create_pool(&db_path).unwrap();
        run_migrations(&pool).unwrap();
        check_integrity(&db_path).unwrap();

        let moved: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".corrupt-"))
            .collect();
        assert!(moved.iter().any(|name| name.starts_with("marketfeed.db.corrupt-")));
    }
}
