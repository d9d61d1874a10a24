//! Throwaway `PostgreSQL` databases for integration tests.
//!
//! Connection settings come from `TEST_DB_*` environment variables and
//! default to the service in `docker-compose.test.yml`.

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::migrations::Migrator;

/// Application tables, children first.
const TABLES: [&str; 4] = ["vote_receipt", "candidate", "room", "user"];

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Where the test server lives.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Role to connect as. Needs `CREATEDB` for [`TestDatabase::create_unique`].
    pub username: String,
    /// Role password.
    pub password: String,
    /// Database to open.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: env_or("TEST_DB_HOST", "localhost"),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: env_or("TEST_DB_USER", "voteroom_test"),
            password: env_or("TEST_DB_PASSWORD", "voteroom_test"),
            database: env_or("TEST_DB_NAME", "voteroom_test"),
        }
    }
}

impl TestDbConfig {
    fn url_for(&self, database: &str) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{database}",
            self.username, self.password, self.host, self.port
        )
    }

    /// URL of the configured database.
    #[must_use]
    pub fn database_url(&self) -> String {
        self.url_for(&self.database)
    }

    /// URL of the maintenance database, used to create and drop others.
    #[must_use]
    pub fn postgres_url(&self) -> String {
        self.url_for("postgres")
    }
}

/// A migrated test database.
pub struct TestDatabase {
    /// Open connection.
    pub conn: DatabaseConnection,
    /// Settings it was opened with.
    pub config: TestDbConfig,
}

impl TestDatabase {
    /// Open the configured database and migrate it.
    pub async fn new() -> Result<Self, DbErr> {
        Self::with_config(TestDbConfig::default()).await
    }

    /// Open the database described by `config` and migrate it.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(config.database_url()).await?;
        Migrator::up(&conn, None).await?;
        Ok(Self { conn, config })
    }

    /// Create a fresh database with a random name, so tests can run in
    /// parallel without sharing rows. Pair with [`Self::drop_database`].
    pub async fn create_unique() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        config.database = format!("voteroom_test_{}", &suffix[..8]);

        let admin = Database::connect(config.postgres_url()).await?;
        admin
            .execute_unprepared(&format!("CREATE DATABASE \"{}\"", config.database))
            .await?;
        admin.close().await?;

        info!(database = %config.database, "Created test database");
        Self::with_config(config).await
    }

    /// The open connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Empty every application table, keeping the schema.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        let tables = TABLES.map(|t| format!("\"{t}\"")).join(", ");
        self.conn
            .execute_unprepared(&format!("TRUNCATE TABLE {tables} CASCADE"))
            .await?;
        Ok(())
    }

    /// Close the connection and drop the database.
    pub async fn drop_database(self) -> Result<(), DbErr> {
        let Self { conn, config } = self;
        conn.close().await?;

        let admin = Database::connect(config.postgres_url()).await?;
        // Stray pool connections would block the drop.
        let _ = admin
            .execute_unprepared(&format!(
                "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
                 WHERE datname = '{}' AND pid <> pg_backend_pid()",
                config.database
            ))
            .await;
        admin
            .execute_unprepared(&format!("DROP DATABASE IF EXISTS \"{}\"", config.database))
            .await?;
        admin.close().await?;

        info!(database = %config.database, "Dropped test database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_share_credentials() {
        let config = TestDbConfig {
            host: "db".to_string(),
            port: 5433,
            username: "u".to_string(),
            password: "p".to_string(),
            database: "votes".to_string(),
        };
        assert_eq!(config.database_url(), "postgres://u:p@db:5433/votes");
        assert_eq!(config.postgres_url(), "postgres://u:p@db:5433/postgres");
    }
}
