//! Dapur (kitchen) registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{validate_name, DocumentKind};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::services::sequence;

#[derive(Clone)]
pub struct DapurService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Dapur {
    pub id: Uuid,
    /// Generated `DPR-NNN` code
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDapurInput {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

impl DapurService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: CreateDapurInput) -> AppResult<Dapur> {
        input.validate()?;
        validate_name("name", &input.name)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let code = sequence::next_document_number(&mut *tx, DocumentKind::Dapur, now).await?;

        let dapur = sqlx::query_as::<_, Dapur>(
            r#"
            INSERT INTO dapurs (id, code, name, address, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, code, name, address, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&code)
        .bind(input.name.trim())
        .bind(&input.address)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(dapur_id = %dapur.id, code = %dapur.code, "Dapur registered");
        Ok(dapur)
    }

    pub async fn list(&self) -> AppResult<Vec<Dapur>> {
        let dapurs = sqlx::query_as::<_, Dapur>(
            "SELECT id, code, name, address, created_at FROM dapurs ORDER BY code",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(dapurs)
    }
}
