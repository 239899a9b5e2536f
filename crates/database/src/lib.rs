//! SQLite persistence layer for the habit streak tracker.
//!
//! This crate owns the four persisted relations: participants, completions,
//! achievements and pending conversations. Every operation is a free async
//! function taking a `&SqlitePool`; nothing is cached in memory.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use database::{completion, participant, Database, Participant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:habit.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     // Register a participant
//!     let anna = Participant {
//!         user_id: 1001,
//!         chat_id: 1001,
//!         handle: Some("anna".to_string()),
//!         display_name: Some("Anna".to_string()),
//!         joined_at: Utc::now(),
//!     };
//!     participant::upsert_participant(db.pool(), &anna).await?;
//!
//!     // Record today's completion
//!     let today = Utc::now().date_naive();
//!     completion::mark_completed(db.pool(), anna.user_id, today, None).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod achievement;
pub mod completion;
pub mod error;
pub mod models;
pub mod participant;
pub mod pending_conversation;
pub mod validation;

pub use error::{DatabaseError, Result};
pub use models::{
    Achievement, AchievementHolder, AchievementKind, Completion, ConversationState, Participant,
    PendingConversation,
};
pub use participant::JoinOrder;
pub use validation::ValidationError;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    pub const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/habit.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect_with_pool_size("sqlite::memory:", 1).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
