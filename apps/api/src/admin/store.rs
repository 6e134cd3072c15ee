use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::calendar_client::DirectoryUser;
use crate::errors::AppError;
use crate::models::interviewer::InterviewerRow;
use crate::models::stage::StageConfigRow;
use crate::scheduling::models::{Interviewer, PanelFormat, StageConfig};

#[derive(Debug, Deserialize)]
pub struct NewInterviewer {
    pub email: String,
    pub name: String,
    pub ashby_user_id: Option<String>,
}

impl NewInterviewer {
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.email.contains('@') {
            return Err(AppError::Validation(format!(
                "'{}' is not an email address",
                self.email
            )));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".to_string()));
        }
        Ok(())
    }
}

fn default_duration() -> u32 {
    60
}

fn default_break() -> u32 {
    15
}

fn default_interviewer_count() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct StageConfigUpsert {
    pub ashby_stage_id: String,
    pub stage_name: String,
    pub job_id: Option<String>,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
    #[serde(default = "default_break")]
    pub break_minutes: u32,
    #[serde(default = "default_interviewer_count")]
    pub interviewer_count: u32,
    #[serde(default)]
    pub format: PanelFormat,
    /// Pool members in priority order.
    #[serde(default)]
    pub interviewer_ids: Vec<Uuid>,
}

impl StageConfigUpsert {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.ashby_stage_id.trim().is_empty() {
            return Err(AppError::Validation(
                "ashby_stage_id must not be empty".to_string(),
            ));
        }
        if self.stage_name.trim().is_empty() {
            return Err(AppError::Validation("stage_name must not be empty".to_string()));
        }
        for (field, value) in [
            ("duration_minutes", self.duration_minutes),
            ("break_minutes", self.break_minutes),
            ("interviewer_count", self.interviewer_count),
        ] {
            if i32::try_from(value).is_err() {
                return Err(AppError::Validation(format!("{field} is out of range")));
            }
        }
        Ok(())
    }
}

/// Unique and foreign-key violations surface as validation errors.
fn constraint_to_validation(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db)
            if db.is_unique_violation() || db.is_foreign_key_violation() =>
        {
            AppError::Validation(message.to_string())
        }
        _ => AppError::Database(err),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Interviewers
// ────────────────────────────────────────────────────────────────────────────

pub async fn list_interviewers(pool: &PgPool) -> Result<Vec<InterviewerRow>, AppError> {
    Ok(
        sqlx::query_as::<_, InterviewerRow>("SELECT * FROM interviewers ORDER BY name ASC")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn create_interviewer(
    pool: &PgPool,
    new: &NewInterviewer,
) -> Result<InterviewerRow, AppError> {
    new.validate()?;

    let row = sqlx::query_as::<_, InterviewerRow>(
        r#"
        INSERT INTO interviewers (email, name, ashby_user_id, is_active)
        VALUES ($1, $2, $3, TRUE)
        RETURNING *
        "#,
    )
    .bind(new.email.trim())
    .bind(new.name.trim())
    .bind(&new.ashby_user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| constraint_to_validation(e, "an interviewer with this email already exists"))?;

    info!("Created interviewer {} <{}>", row.id, row.email);
    Ok(row)
}

pub async fn delete_interviewer(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM interviewers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Interviewer {id} not found")));
    }
    info!("Deleted interviewer {id}");
    Ok(())
}

/// Inserts every directory user as an active interviewer, refreshing names of
/// existing ones. Returns how many users were synced.
pub async fn upsert_directory_users(
    pool: &PgPool,
    users: &[DirectoryUser],
) -> Result<usize, AppError> {
    let mut tx = pool.begin().await?;

    for user in users {
        sqlx::query(
            r#"
            INSERT INTO interviewers (email, name, is_active)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (email)
            DO UPDATE SET name = EXCLUDED.name, is_active = TRUE, updated_at = NOW()
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!("Synced {} directory users into interviewers", users.len());
    Ok(users.len())
}

// ────────────────────────────────────────────────────────────────────────────
// Stage configs
// ────────────────────────────────────────────────────────────────────────────

pub async fn list_stage_configs(pool: &PgPool) -> Result<Vec<StageConfigRow>, AppError> {
    Ok(sqlx::query_as::<_, StageConfigRow>(
        "SELECT * FROM interview_stage_configs ORDER BY stage_name ASC",
    )
    .fetch_all(pool)
    .await?)
}

/// Upserts by `ashby_stage_id` and replaces the pool in one transaction.
pub async fn upsert_stage_config(
    pool: &PgPool,
    upsert: &StageConfigUpsert,
) -> Result<StageConfigRow, AppError> {
    upsert.validate()?;

    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, StageConfigRow>(
        r#"
        INSERT INTO interview_stage_configs
            (ashby_stage_id, stage_name, job_id, duration_minutes, break_minutes,
             interviewer_count, format)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (ashby_stage_id) DO UPDATE SET
            stage_name = EXCLUDED.stage_name,
            duration_minutes = EXCLUDED.duration_minutes,
            break_minutes = EXCLUDED.break_minutes,
            interviewer_count = EXCLUDED.interviewer_count,
            format = EXCLUDED.format,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(&upsert.ashby_stage_id)
    .bind(&upsert.stage_name)
    .bind(&upsert.job_id)
    .bind(upsert.duration_minutes as i32)
    .bind(upsert.break_minutes as i32)
    .bind(upsert.interviewer_count as i32)
    .bind(upsert.format.as_str())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM stage_interviewer_pool WHERE stage_config_id = $1")
        .bind(row.id)
        .execute(&mut *tx)
        .await?;

    for (priority, interviewer_id) in upsert.interviewer_ids.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO stage_interviewer_pool (stage_config_id, interviewer_id, priority)
            VALUES ($1, $2, $3)
            ON CONFLICT (stage_config_id, interviewer_id) DO NOTHING
            "#,
        )
        .bind(row.id)
        .bind(interviewer_id)
        .bind(priority as i32)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            constraint_to_validation(e, &format!("interviewer {interviewer_id} does not exist"))
        })?;
    }

    tx.commit().await?;
    info!(
        "Saved stage config {} ({}) with a pool of {}",
        row.ashby_stage_id,
        row.stage_name,
        upsert.interviewer_ids.len()
    );
    Ok(row)
}

pub async fn find_stage_config(
    pool: &PgPool,
    ashby_stage_id: &str,
) -> Result<Option<StageConfigRow>, AppError> {
    Ok(sqlx::query_as::<_, StageConfigRow>(
        "SELECT * FROM interview_stage_configs WHERE ashby_stage_id = $1",
    )
    .bind(ashby_stage_id)
    .fetch_optional(pool)
    .await?)
}

/// Pool members of a stage config in priority order. Inactive interviewers are
/// included only when `active_only` is false.
pub async fn stage_pool(
    pool: &PgPool,
    stage_config_id: Uuid,
    active_only: bool,
) -> Result<Vec<InterviewerRow>, AppError> {
    Ok(sqlx::query_as::<_, InterviewerRow>(
        r#"
        SELECT i.*
        FROM stage_interviewer_pool p
        JOIN interviewers i ON i.id = p.interviewer_id
        WHERE p.stage_config_id = $1 AND (i.is_active OR NOT $2)
        ORDER BY p.priority ASC, i.name ASC
        "#,
    )
    .bind(stage_config_id)
    .bind(active_only)
    .fetch_all(pool)
    .await?)
}

/// Stage config by external stage id, with its active pool, ready for the engine.
pub async fn load_stage_for_scheduling(
    pool: &PgPool,
    ashby_stage_id: &str,
) -> Result<StageConfig, AppError> {
    let row = find_stage_config(pool, ashby_stage_id).await?.ok_or_else(|| {
        AppError::NotConfigured(format!(
            "Stage {ashby_stage_id} is not configured. Set it up under admin stage configs."
        ))
    })?;

    let members: Vec<Interviewer> = stage_pool(pool, row.id, true)
        .await?
        .into_iter()
        .map(Interviewer::from)
        .collect();

    row.into_stage_config(members)
}
