//! PostgreSQL order store.
//!
//! A transition is one transaction: a conditional `UPDATE` keyed on
//! `(status, current_step, revision)` followed by the audit `INSERT`. Either
//! statement affecting zero rows rolls the whole transaction back. Inserts
//! that refuse open duplicates first take a transaction-scoped advisory lock
//! on `(owner, source, database)`, so concurrent identical submissions see
//! each other's rows.

use super::{InsertOutcome, OrderRepository, QueryPage, TransitionCommit};
use crate::constants::status_groups::OPEN_STATUSES;
use crate::error::{Result, WorkflowError};
use crate::models::{AuditEntry, NewAuditEntry, NewOrder, Order, OrderUpdate, TransitionKey};
use crate::scopes::{OrderScope, OrderScopeQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};

const INSERT_AUDIT_SQL: &str = r#"
    INSERT INTO order_audit_entries
        (order_id, revision, step, actor, action, from_status, to_status,
         from_step, to_step, comment, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT ON CONSTRAINT order_audit_entries_dedup_key DO NOTHING
"#;

pub struct PgOrderRepository {
    pool: PgPool,
}

crate::debug_with_pgpool!(PgOrderRepository { pool: PgPool });

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Raw `orders` row
#[derive(Debug, Clone, FromRow)]
struct OrderRow {
    id: i64,
    work_id: String,
    kind: String,
    owner: String,
    real_name: String,
    department: String,
    text: String,
    source: String,
    idc: String,
    database_name: String,
    table_name: Option<String>,
    change_type: Option<String>,
    backup: bool,
    status: String,
    current_step: i32,
    revision: i32,
    assigned: Vec<String>,
    executor: Option<String>,
    delay_until: Option<DateTime<Utc>>,
    execute_time: Option<DateTime<Utc>>,
    relevant: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = WorkflowError;

    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Order {
            id: row.id,
            work_id: row.work_id,
            kind: row.kind.parse().map_err(WorkflowError::Infrastructure)?,
            owner: row.owner,
            real_name: row.real_name,
            department: row.department,
            text: row.text,
            source: row.source,
            idc: row.idc,
            database: row.database_name,
            table: row.table_name,
            change_type: row
                .change_type
                .map(|ct| ct.parse())
                .transpose()
                .map_err(WorkflowError::Infrastructure)?,
            backup: row.backup,
            status: row.status.parse().map_err(WorkflowError::Infrastructure)?,
            current_step: from_db_int(row.current_step, "current_step")?,
            revision: from_db_int(row.revision, "revision")?,
            assigned: row.assigned,
            executor: row.executor,
            delay_until: row.delay_until,
            execute_time: row.execute_time,
            relevant: row.relevant,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Raw `order_audit_entries` row
#[derive(Debug, Clone, FromRow)]
struct AuditRow {
    id: i64,
    order_id: i64,
    revision: i32,
    step: i32,
    actor: String,
    action: String,
    from_status: Option<String>,
    to_status: String,
    from_step: i32,
    to_step: i32,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = WorkflowError;

    fn try_from(row: AuditRow) -> Result<Self> {
        Ok(AuditEntry {
            id: row.id,
            order_id: row.order_id,
            revision: from_db_int(row.revision, "revision")?,
            step: from_db_int(row.step, "step")?,
            actor: row.actor,
            action: row.action.parse().map_err(WorkflowError::Infrastructure)?,
            from_status: row
                .from_status
                .map(|status| status.parse())
                .transpose()
                .map_err(WorkflowError::Infrastructure)?,
            to_status: row.to_status.parse().map_err(WorkflowError::Infrastructure)?,
            from_step: from_db_int(row.from_step, "from_step")?,
            to_step: from_db_int(row.to_step, "to_step")?,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

fn from_db_int(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| WorkflowError::Infrastructure(format!("negative {column} in database: {value}")))
}

fn to_db_int(value: u32, column: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| WorkflowError::Infrastructure(format!("{column} out of range: {value}")))
}

async fn insert_audit<'e, E: PgExecutor<'e>>(executor: E, entry: &NewAuditEntry) -> Result<bool> {
    let result = sqlx::query(INSERT_AUDIT_SQL)
        .bind(entry.order_id)
        .bind(to_db_int(entry.revision, "revision")?)
        .bind(to_db_int(entry.step, "step")?)
        .bind(&entry.actor)
        .bind(entry.action.as_str())
        .bind(entry.from_status.map(|status| status.as_str()))
        .bind(entry.to_status.as_str())
        .bind(to_db_int(entry.from_step, "from_step")?)
        .bind(to_db_int(entry.to_step, "to_step")?)
        .bind(&entry.comment)
        .bind(entry.created_at)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

async fn open_duplicate_exists<'e, E: PgExecutor<'e>>(
    executor: E,
    order: &NewOrder,
) -> Result<bool> {
    let open: Vec<&str> = OPEN_STATUSES.iter().map(|status| status.as_str()).collect();
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM orders
            WHERE owner = $1 AND source = $2 AND database_name = $3
              AND text = $4 AND status = ANY($5)
        )
        "#,
    )
    .bind(&order.owner)
    .bind(&order.source)
    .bind(&order.database)
    .bind(&order.text)
    .bind(open)
    .fetch_one(executor)
    .await?;
    Ok(exists)
}

async fn swap<'e, E: PgExecutor<'e>>(
    executor: E,
    order_id: i64,
    expected: TransitionKey,
    update: &OrderUpdate,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = $1,
            current_step = $2,
            revision = $3,
            assigned = $4,
            text = COALESCE($5, text),
            executor = COALESCE($6, executor),
            execute_time = COALESCE($7, execute_time),
            updated_at = $8
        WHERE id = $9 AND status = $10 AND current_step = $11 AND revision = $12
        "#,
    )
    .bind(update.status.as_str())
    .bind(to_db_int(update.current_step, "current_step")?)
    .bind(to_db_int(update.revision, "revision")?)
    .bind(&update.assigned)
    .bind(&update.text)
    .bind(&update.executor)
    .bind(update.execute_time)
    .bind(update.updated_at)
    .bind(order_id)
    .bind(expected.status.as_str())
    .bind(to_db_int(expected.step, "current_step")?)
    .bind(to_db_int(expected.revision, "revision")?)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert_order(
        &self,
        order: &NewOrder,
        reject_duplicates: bool,
    ) -> Result<InsertOutcome> {
        let mut tx = self.pool.begin().await?;

        if reject_duplicates {
            // Held until commit; serializes submissions for one owner and target
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(format!(
                    "order-submission:{}/{}/{}",
                    order.owner, order.source, order.database
                ))
                .execute(&mut *tx)
                .await?;
            if open_duplicate_exists(&mut *tx, order).await? {
                tx.rollback().await?;
                return Ok(InsertOutcome::DuplicateOpen);
            }
        }

        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO orders
                (work_id, kind, owner, real_name, department, text, source, idc,
                 database_name, table_name, change_type, backup, status,
                 current_step, revision, assigned, delay_until, relevant)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'created', 0, 0, $13, $14, $15)
            ON CONFLICT (work_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&order.work_id)
        .bind(order.kind.as_str())
        .bind(&order.owner)
        .bind(&order.real_name)
        .bind(&order.department)
        .bind(&order.text)
        .bind(&order.source)
        .bind(&order.idc)
        .bind(&order.database)
        .bind(&order.table)
        .bind(order.change_type.map(|ct| ct.as_str()))
        .bind(order.backup)
        .bind(&order.assigned)
        .bind(order.delay_until)
        .bind(&order.relevant)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(InsertOutcome::WorkIdTaken);
        };
        let stored = Order::try_from(row)?;

        insert_audit(
            &mut *tx,
            &NewAuditEntry::creation(stored.id, &stored.owner, stored.created_at),
        )
        .await?;
        tx.commit().await?;

        Ok(InsertOutcome::Inserted(stored))
    }

    async fn load(&self, order_id: i64) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn load_by_work_id(&self, work_id: &str) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE work_id = $1")
            .bind(work_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn compare_and_swap(
        &self,
        order_id: i64,
        expected: TransitionKey,
        update: &OrderUpdate,
    ) -> Result<bool> {
        swap(&self.pool, order_id, expected, update).await
    }

    async fn append_audit(&self, entry: &NewAuditEntry) -> Result<bool> {
        insert_audit(&self.pool, entry).await
    }

    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if !swap(&mut *tx, commit.order_id, commit.expected, &commit.update).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        if !insert_audit(&mut *tx, &commit.audit).await? {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn history(&self, order_id: i64) -> Result<Vec<AuditEntry>> {
        sqlx::query_as::<_, AuditRow>(
            "SELECT * FROM order_audit_entries WHERE order_id = $1 ORDER BY id ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(AuditEntry::try_from)
        .collect()
    }

    async fn query(&self, scope: &OrderScope, offset: u64, limit: u64) -> Result<QueryPage> {
        let mut count = OrderScopeQuery::count(scope).into_builder();
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut select = OrderScopeQuery::select(scope)
            .page(offset, limit)
            .into_builder();
        let rows = select
            .build_query_as::<OrderRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryPage {
            rows,
            total_count: u64::try_from(total).unwrap_or_default(),
        })
    }
}
