use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::{
    error::Result,
    storage::{Session, SessionStorage},
};

/// PostgreSQL-backed session store. The whole session is kept as JSONB; the
/// customer, stage and timestamps are mirrored into columns for lookups.
pub struct PostgresSessionStorage {
    pool: PgPool,
}

impl PostgresSessionStorage {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.migrate().await?;
        info!("PostgreSQL session storage ready");
        Ok(storage)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS loan_sessions (
                id TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL,
                stage TEXT NOT NULL,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS loan_sessions_customer_idx \
             ON loan_sessions (customer_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionStorage for PostgresSessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO loan_sessions (id, customer_id, stage, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            ON CONFLICT (id) DO UPDATE
            SET customer_id = EXCLUDED.customer_id,
                stage = EXCLUDED.stage,
                data = EXCLUDED.data,
                updated_at = NOW()
            "#,
        )
        .bind(&session.id)
        .bind(&session.customer_id)
        .bind(session.stage().as_str())
        .bind(Json(&session))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT data FROM loan_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let Json(session): Json<Session> = row.try_get("data")?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM loan_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_active(&self, customer_id: &str) -> Result<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT data FROM loan_sessions
            WHERE customer_id = $1 AND stage NOT IN ('sanction', 'rejected')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let Json(session): Json<Session> = row.try_get("data")?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
