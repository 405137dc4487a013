use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::StoreError;
use crate::scheduler::{ReviewState, ScheduleMode, LONG_SLOT_COUNT, SHORT_SLOT_COUNT};

const SCHEMA_STATEMENTS: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS "review_states" (
      "id" TEXT PRIMARY KEY,
      "userId" TEXT NOT NULL,
      "wordId" TEXT NOT NULL,
      "mode" TEXT NOT NULL DEFAULT 'continuous',
      "stage" INTEGER NOT NULL DEFAULT 1,
      "easeFactor" REAL NOT NULL DEFAULT 2.5,
      "memoryStrength" REAL NOT NULL DEFAULT 0,
      "reviewCount" INTEGER NOT NULL DEFAULT 0,
      "correctCount" INTEGER NOT NULL DEFAULT 0,
      "errorCount" INTEGER NOT NULL DEFAULT 0,
      "lastReviewAt" INTEGER,
      "milestoneCompletedAt" INTEGER,
      "nextReviewAt" INTEGER NOT NULL,
      "shortSlots" INTEGER NOT NULL DEFAULT 0,
      "longSlots" INTEGER NOT NULL DEFAULT 0,
      "createdAt" INTEGER NOT NULL,
      "updatedAt" INTEGER NOT NULL,
      UNIQUE ("userId", "wordId")
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS "idx_review_states_due" ON "review_states" ("userId", "nextReviewAt")"#,
    r#"
    CREATE TABLE IF NOT EXISTS "due_reminders" (
      "userId" TEXT NOT NULL,
      "wordId" TEXT NOT NULL,
      "day" TEXT NOT NULL,
      "createdAt" INTEGER NOT NULL,
      PRIMARY KEY ("userId", "wordId", "day")
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS "idx_due_reminders_day" ON "due_reminders" ("day")"#,
];

const STATE_COLUMNS: &str = r#"
  "id","userId","wordId","mode","stage","easeFactor","memoryStrength",
  "reviewCount","correctCount","errorCount","lastReviewAt","milestoneCompletedAt","nextReviewAt",
  "shortSlots","longSlots","createdAt","updatedAt"
"#;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| StoreError::Config(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Single-connection in-memory database; every pooled connection to
    /// `:memory:` would otherwise see its own empty database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Config(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for stmt in SCHEMA_STATEMENTS {
            sqlx::query(stmt.trim()).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn insert(&self, state: &ReviewState) -> Result<(), StoreError> {
        let sql = format!(
            r#"INSERT INTO "review_states" ({STATE_COLUMNS})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT ("userId", "wordId") DO NOTHING"#
        );
        let result = sqlx::query(&sql)
            .bind(&state.id)
            .bind(&state.user_id)
            .bind(&state.word_id)
            .bind(state.mode.as_str())
            .bind(i64::from(state.stage))
            .bind(state.ease_factor)
            .bind(state.memory_strength)
            .bind(i64::from(state.review_count))
            .bind(i64::from(state.correct_count))
            .bind(i64::from(state.error_count))
            .bind(state.last_review_at.map(|t| t.timestamp_millis()))
            .bind(state.milestone_completed_at.map(|t| t.timestamp_millis()))
            .bind(state.next_review_at.timestamp_millis())
            .bind(pack_slots(&state.short_slots))
            .bind(pack_slots(&state.long_slots))
            .bind(state.created_at.timestamp_millis())
            .bind(state.updated_at.timestamp_millis())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    pub async fn get(&self, user_id: &str, word_id: &str) -> Result<Option<ReviewState>, StoreError> {
        let sql = format!(
            r#"SELECT {STATE_COLUMNS} FROM "review_states"
            WHERE "userId" = ? AND "wordId" = ?
            LIMIT 1"#
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(word_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_row).transpose()
    }

    pub async fn save(&self, state: &ReviewState) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE "review_states" SET
              "mode" = ?,
              "stage" = ?,
              "easeFactor" = ?,
              "memoryStrength" = ?,
              "reviewCount" = ?,
              "correctCount" = ?,
              "errorCount" = ?,
              "lastReviewAt" = ?,
              "milestoneCompletedAt" = ?,
              "nextReviewAt" = ?,
              "shortSlots" = ?,
              "longSlots" = ?,
              "updatedAt" = ?
            WHERE "userId" = ? AND "wordId" = ?
            "#,
        )
        .bind(state.mode.as_str())
        .bind(i64::from(state.stage))
        .bind(state.ease_factor)
        .bind(state.memory_strength)
        .bind(i64::from(state.review_count))
        .bind(i64::from(state.correct_count))
        .bind(i64::from(state.error_count))
        .bind(state.last_review_at.map(|t| t.timestamp_millis()))
        .bind(state.milestone_completed_at.map(|t| t.timestamp_millis()))
        .bind(state.next_review_at.timestamp_millis())
        .bind(pack_slots(&state.short_slots))
        .bind(pack_slots(&state.long_slots))
        .bind(state.updated_at.timestamp_millis())
        .bind(&state.user_id)
        .bind(&state.word_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    pub async fn delete(&self, user_id: &str, word_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(r#"DELETE FROM "review_states" WHERE "userId" = ? AND "wordId" = ?"#)
            .bind(user_id)
            .bind(word_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<ReviewState>, StoreError> {
        let sql = format!(
            r#"SELECT {STATE_COLUMNS} FROM "review_states"
            WHERE "userId" = ?
            ORDER BY "nextReviewAt" ASC, "wordId" ASC"#
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.pool).await?;
        rows.iter().map(map_row).collect()
    }

    pub async fn list_due_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReviewState>, StoreError> {
        let sql = format!(
            r#"SELECT {STATE_COLUMNS} FROM "review_states"
            WHERE "userId" = ? AND "nextReviewAt" <= ?
            ORDER BY "nextReviewAt" ASC, "wordId" ASC"#
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(now.timestamp_millis())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_row).collect()
    }

    pub async fn users_with_due(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT DISTINCT "userId" FROM "review_states" WHERE "nextReviewAt" <= ? ORDER BY "userId""#,
        )
        .bind(now.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("userId").map_err(StoreError::from))
            .collect()
    }

    pub async fn reminder_exists(
        &self,
        user_id: &str,
        word_id: &str,
        day: NaiveDate,
    ) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"SELECT 1 FROM "due_reminders" WHERE "userId" = ? AND "wordId" = ? AND "day" = ? LIMIT 1"#,
        )
        .bind(user_id)
        .bind(word_id)
        .bind(day.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    pub async fn record_reminder(
        &self,
        user_id: &str,
        word_id: &str,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO "due_reminders" ("userId", "wordId", "day", "createdAt")
            VALUES (?, ?, ?, ?)
            ON CONFLICT ("userId", "wordId", "day") DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(word_id)
        .bind(day.to_string())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn map_row(row: &SqliteRow) -> Result<ReviewState, StoreError> {
    let mode_raw: String = row.try_get("mode")?;
    let mode = ScheduleMode::from_str(&mode_raw).map_err(|e| StoreError::Corrupt(e.to_string()))?;

    let last_review_at = optional_datetime(row, "lastReviewAt")?;
    let milestone_completed_at = optional_datetime(row, "milestoneCompletedAt")?;

    Ok(ReviewState {
        id: row.try_get("id")?,
        user_id: row.try_get("userId")?,
        word_id: row.try_get("wordId")?,
        mode,
        stage: get_u32(row, "stage")?,
        ease_factor: row.try_get("easeFactor")?,
        memory_strength: row.try_get("memoryStrength")?,
        review_count: get_u32(row, "reviewCount")?,
        correct_count: get_u32(row, "correctCount")?,
        error_count: get_u32(row, "errorCount")?,
        last_review_at,
        milestone_completed_at,
        next_review_at: millis_to_datetime(row.try_get("nextReviewAt")?)?,
        short_slots: unpack_slots::<SHORT_SLOT_COUNT>(row.try_get("shortSlots")?),
        long_slots: unpack_slots::<LONG_SLOT_COUNT>(row.try_get("longSlots")?),
        created_at: millis_to_datetime(row.try_get("createdAt")?)?,
        updated_at: millis_to_datetime(row.try_get("updatedAt")?)?,
    })
}

fn get_u32(row: &SqliteRow, column: &str) -> Result<u32, StoreError> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn optional_datetime(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
    row.try_get::<Option<i64>, _>(column)?
        .map(millis_to_datetime)
        .transpose()
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("invalid timestamp: {ms}")))
}

fn pack_slots(slots: &[bool]) -> i64 {
    slots
        .iter()
        .enumerate()
        .filter(|(_, done)| **done)
        .fold(0i64, |acc, (idx, _)| acc | (1 << idx))
}

fn unpack_slots<const N: usize>(bits: i64) -> [bool; N] {
    let mut out = [false; N];
    for (idx, slot) in out.iter_mut().enumerate() {
        *slot = bits & (1 << idx) != 0;
    }
    out
}
