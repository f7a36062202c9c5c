//! Application state for DocSign API

use anyhow::Result;
use docsign_core::{ControllerConfig, ResubmissionPolicy};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct AppState {
    pub db: SqlitePool,
    /// Root for uploads and signed artifacts, served under /files
    pub storage_dir: PathBuf,
    pub resubmission: ResubmissionPolicy,
    /// Held across every check-then-write sequence
    pub write_lock: Mutex<()>,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docsign-api");

        // Get database path from env or use default
        let db_path = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            std::fs::create_dir_all(&data_dir).ok();
            format!("sqlite:{}/docsign.db?mode=rwc", data_dir.display())
        });

        let storage_dir = std::env::var("DOCSIGN_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("files"));

        tracing::info!("Connecting to database: {}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_path)
            .await?;

        let config = ControllerConfig::from_env();
        Self::with_pool(pool, storage_dir, config.resubmission).await
    }

    /// Build state around an existing pool, running migrations and creating
    /// the storage directories.
    pub async fn with_pool(
        pool: SqlitePool,
        storage_dir: impl AsRef<Path>,
        resubmission: ResubmissionPolicy,
    ) -> Result<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(storage_dir.join("uploads")).await?;
        tokio::fs::create_dir_all(storage_dir.join("signed")).await?;

        Self::run_migrations(&pool).await?;

        tracing::info!(
            storage = %storage_dir.display(),
            ?resubmission,
            "DocSign state ready"
        );
        Ok(Self {
            db: pool,
            storage_dir,
            resubmission,
            write_lock: Mutex::new(()),
        })
    }

    /// In-memory database, for tests
    pub async fn in_memory(
        storage_dir: impl AsRef<Path>,
        resubmission: ResubmissionPolicy,
    ) -> Result<Self> {
        // One connection: every new connection to :memory: is a new database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool, storage_dir, resubmission).await
    }

    /// Absolute path of a stored file from its relative storage path
    pub fn file_path(&self, relative: &str) -> PathBuf {
        self.storage_dir.join(relative)
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                original_name TEXT NOT NULL,
                storage_path TEXT NOT NULL,
                uploaded_at TEXT NOT NULL,
                page_count INTEGER NOT NULL,
                owner_email TEXT NOT NULL,
                document_hash TEXT NOT NULL,
                signed_artifact_path TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS placements (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id),
                page_number INTEGER NOT NULL,
                x REAL NOT NULL,
                y REAL NOT NULL,
                rendered_page_height REAL NOT NULL CHECK (rendered_page_height > 0),
                rendered_page_width REAL,
                text TEXT NOT NULL,
                font_family TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'placed',
                rejection_reason TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL REFERENCES documents(id),
                placement_id TEXT NOT NULL,
                signer_name TEXT NOT NULL,
                signer_email TEXT NOT NULL,
                ip_address TEXT NOT NULL,
                signed_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Indexes for fast lookups
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_email)
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_placements_document ON placements(document_id)
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Migrations complete");
        Ok(())
    }
}

/// Get platform-specific data directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
