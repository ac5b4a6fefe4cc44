//! Durable job store using SQLite

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jobq_queue::store::empty_counts;
use jobq_queue::{Job, JobId, JobState, JobStore, JobUpdate, QueueError, QueueMetrics, StateCounts};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

const JOB_COLUMNS: &str = "id, command, state, attempts, max_retries, priority, timeout_secs, \
     created_at, updated_at, run_at, error_message, output, started_at, completed_at, \
     execution_time_ms";

/// Durable `JobStore` backed by the `jobs` table.
///
/// Every worker process opens its own pool on the same database file; SQLite's
/// write lock is what serializes their claims.
#[derive(Debug, Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn micros(t: DateTime<Utc>) -> i64 {
    t.timestamp_micros()
}

/// SQLite integers are signed; refuse values that would wrap.
fn to_sql_int(field: &str, v: Option<u64>) -> Result<Option<i64>, QueueError> {
    v.map(|v| {
        i64::try_from(v)
            .map_err(|_| QueueError::Store(format!("{} out of range: {}", field, v)))
    })
    .transpose()
}

fn from_micros(v: i64) -> Result<DateTime<Utc>, QueueError> {
    DateTime::from_timestamp_micros(v)
        .ok_or_else(|| QueueError::Store(format!("timestamp out of range: {}", v)))
}

fn opt_from_micros(v: Option<i64>) -> Result<Option<DateTime<Utc>>, QueueError> {
    v.map(from_micros).transpose()
}

fn store_err(e: sqlx::Error) -> QueueError {
    QueueError::store(e)
}

fn job_from_row(row: &SqliteRow) -> Result<Job, QueueError> {
    let state: String = row.try_get("state").map_err(store_err)?;
    let attempts: i64 = row.try_get("attempts").map_err(store_err)?;
    let max_retries: i64 = row.try_get("max_retries").map_err(store_err)?;
    let timeout_secs: Option<i64> = row.try_get("timeout_secs").map_err(store_err)?;
    let execution_time_ms: Option<i64> = row.try_get("execution_time_ms").map_err(store_err)?;

    Ok(Job {
        id: row.try_get("id").map_err(store_err)?,
        command: row.try_get("command").map_err(store_err)?,
        state: state
            .parse::<JobState>()
            .map_err(|_| QueueError::Store(format!("Invalid state in DB: {}", state)))?,
        attempts: u32::try_from(attempts).unwrap_or(0),
        max_retries: u32::try_from(max_retries).unwrap_or(0),
        priority: row.try_get("priority").map_err(store_err)?,
        timeout_secs: timeout_secs.and_then(|t| u64::try_from(t).ok()),
        created_at: from_micros(row.try_get("created_at").map_err(store_err)?)?,
        updated_at: from_micros(row.try_get("updated_at").map_err(store_err)?)?,
        run_at: from_micros(row.try_get("run_at").map_err(store_err)?)?,
        error_message: row.try_get("error_message").map_err(store_err)?,
        output: row.try_get("output").map_err(store_err)?,
        started_at: opt_from_micros(row.try_get("started_at").map_err(store_err)?)?,
        completed_at: opt_from_micros(row.try_get("completed_at").map_err(store_err)?)?,
        execution_time_ms: execution_time_ms.and_then(|ms| u64::try_from(ms).ok()),
    })
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: Job) -> Result<JobId, QueueError> {
        let timeout_secs = to_sql_int("timeout_secs", job.timeout_secs)?;
        let execution_time_ms = to_sql_int("execution_time_ms", job.execution_time_ms)?;

        let result = sqlx::query(
            r#"
            INSERT INTO jobs (id, command, state, attempts, max_retries, priority, timeout_secs,
                              created_at, updated_at, run_at, error_message, output,
                              started_at, completed_at, execution_time_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.command)
        .bind(job.state.as_str())
        .bind(i64::from(job.attempts))
        .bind(i64::from(job.max_retries))
        .bind(job.priority)
        .bind(timeout_secs)
        .bind(micros(job.created_at))
        .bind(micros(job.updated_at))
        .bind(micros(job.run_at))
        .bind(&job.error_message)
        .bind(&job.output)
        .bind(job.started_at.map(micros))
        .bind(job.completed_at.map(micros))
        .bind(execution_time_ms)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(job.id),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(QueueError::AlreadyExists(job.id))
            }
            Err(e) => Err(store_err(e)),
        }
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Job>, QueueError> {
        // One statement: SQLite takes the write lock before evaluating the
        // subquery, so select-and-update cannot interleave across processes.
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = 'processing',
                attempts = attempts + 1,
                updated_at = ?1,
                started_at = ?1
            WHERE id = (
                SELECT id FROM jobs
                WHERE state IN ('pending', 'failed') AND run_at <= ?1
                ORDER BY priority DESC, created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(micros(now))
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        match row {
            Some(row) => {
                let job = job_from_row(&row)?;
                debug!(job_id = %job.id, attempts = job.attempts, "Claimed job");
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, QueueError> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE jobs SET updated_at = ");
        qb.push_bind(micros(update.updated_at));

        if let Some(state) = update.state {
            qb.push(", state = ").push_bind(state.as_str());
        }
        if let Some(attempts) = update.attempts {
            qb.push(", attempts = ").push_bind(i64::from(attempts));
        }
        if let Some(run_at) = update.run_at {
            qb.push(", run_at = ").push_bind(micros(run_at));
        }
        if let Some(message) = update.error_message.clone() {
            qb.push(", error_message = ").push_bind(message);
        }
        if let Some(output) = update.output.clone() {
            qb.push(", output = ").push_bind(output);
        }
        if let Some(at) = update.completed_at {
            qb.push(", completed_at = ").push_bind(at.map(micros));
        }
        if let Some(ms) = update.execution_time_ms {
            qb.push(", execution_time_ms = ")
                .push_bind(to_sql_int("execution_time_ms", ms)?);
        }

        qb.push(" WHERE id = ").push_bind(id.to_string());
        if let Some(expected) = update.expect {
            qb.push(" AND state = ").push_bind(expected.as_str());
        }
        qb.push(" RETURNING ").push(JOB_COLUMNS);

        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        match row {
            Some(row) => job_from_row(&row),
            None => {
                // Either the row is gone or the guard didn't match
                let current = self.get(id).await?;
                Err(QueueError::InvalidState {
                    id: id.to_string(),
                    expected: update.expect.unwrap_or(current.state),
                    actual: current.state,
                })
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Job, QueueError> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        job_from_row(&row)
    }

    async fn list(&self, state: Option<JobState>) -> Result<Vec<Job>, QueueError> {
        let rows = match state {
            Some(state) => {
                let sql = format!(
                    "SELECT {} FROM jobs WHERE state = ? ORDER BY priority DESC, created_at DESC, id ASC",
                    JOB_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(state.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM jobs ORDER BY priority DESC, created_at DESC, id ASC",
                    JOB_COLUMNS
                );
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(store_err)?;

        rows.iter().map(job_from_row).collect()
    }

    async fn count_by_state(&self) -> Result<StateCounts, QueueError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM jobs GROUP BY state")
                .fetch_all(&self.pool)
                .await
                .map_err(store_err)?;

        let mut counts = empty_counts();
        for (state, count) in rows {
            let state = state
                .parse::<JobState>()
                .map_err(|_| QueueError::Store(format!("Invalid state in DB: {}", state)))?;
            counts.insert(state, count.max(0) as u64);
        }
        Ok(counts)
    }

    async fn metrics(&self, now: DateTime<Utc>) -> Result<QueueMetrics, QueueError> {
        let day_ago = micros(now - Duration::days(1));
        let (total, completed, avg_ms, recent): (i64, Option<i64>, Option<f64>, Option<i64>) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       SUM(CASE WHEN state = 'completed' THEN 1 ELSE 0 END),
                       AVG(execution_time_ms),
                       SUM(CASE WHEN created_at > ? THEN 1 ELSE 0 END)
                FROM jobs
                "#,
            )
            .bind(day_ago)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;

        let priorities: Vec<(i32, i64)> =
            sqlx::query_as("SELECT priority, COUNT(*) FROM jobs GROUP BY priority")
                .fetch_all(&self.pool)
                .await
                .map_err(store_err)?;

        let total = total.max(0) as u64;
        let completed = completed.unwrap_or(0).max(0) as u64;
        Ok(QueueMetrics {
            total,
            completed,
            success_rate: if total > 0 {
                completed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            avg_execution_ms: avg_ms,
            jobs_last_24h: recent.unwrap_or(0).max(0) as u64,
            priority_distribution: priorities
                .into_iter()
                .map(|(p, n)| (p, n.max(0) as u64))
                .collect(),
        })
    }

    async fn stale_processing(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobId>, QueueError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM jobs WHERE state = 'processing' AND updated_at < ? ORDER BY updated_at",
        )
        .bind(micros(cutoff))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
