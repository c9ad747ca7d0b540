use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{AuditListFilter, AuditStore, CountListFilter, CountMutation};
use crate::{
    database::Database,
    error::{AppError, AppResult},
    models::{
        Audit, AuditCount, AuditListing, AuditStatus, CountWithEquipment, Equipment,
        EquipmentFilter, Location, Membership,
    },
    workflow::{apply_adjustment, lifecycle::ensure_adjustments_open, AdjustmentOutcome},
};

// Postgres caps a statement at 65535 bind parameters; count rows bind 17.
const SNAPSHOT_INSERT_CHUNK: usize = 1000;

#[derive(Clone)]
pub struct PgAuditStore {
    db: Database,
}

impl PgAuditStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

async fn write_count<'e, E>(executor: E, count: &AuditCount) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE equipment_audit_counts SET
            counted_quantity = $1, discrepancy = $2, observed_condition = $3, notes = $4,
            status = $5, adjustment_approved = $6, adjustment_reason = $7, adjusted_by = $8,
            adjusted_at = $9, counted_by = $10, counted_at = $11, updated_at = $12
        WHERE id = $13
        "#,
    )
    .bind(count.counted_quantity)
    .bind(count.discrepancy)
    .bind(count.observed_condition)
    .bind(&count.notes)
    .bind(count.status)
    .bind(count.adjustment_approved)
    .bind(&count.adjustment_reason)
    .bind(count.adjusted_by)
    .bind(count.adjusted_at)
    .bind(count.counted_by)
    .bind(count.counted_at)
    .bind(count.updated_at)
    .bind(count.id)
    .execute(executor)
    .await?;

    Ok(())
}

/// `ILIKE` pattern matching `search` literally anywhere in the column.
fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for ch in search.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Lock a tenant's count line for the rest of the transaction and load its
/// audit.
async fn lock_count(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    organization_id: Uuid,
    count_id: Uuid,
) -> AppResult<(Audit, AuditCount)> {
    let count = sqlx::query_as::<_, AuditCount>(
        r#"
        SELECT c.* FROM equipment_audit_counts c
        JOIN equipment_audits a ON a.id = c.audit_id
        WHERE c.id = $1 AND a.organization_id = $2
        FOR UPDATE OF c
        "#,
    )
    .bind(count_id)
    .bind(organization_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Count not found".to_string()))?;

    let audit = sqlx::query_as::<_, Audit>("SELECT * FROM equipment_audits WHERE id = $1")
        .bind(count.audit_id)
        .fetch_one(&mut **tx)
        .await?;

    Ok((audit, count))
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn find_membership(&self, organization_id: Uuid, user_id: Uuid) -> AppResult<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT * FROM organization_members WHERE organization_id = $1 AND user_id = $2 AND is_active = true",
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(membership)
    }

    async fn find_location(&self, organization_id: Uuid, location_id: Uuid) -> AppResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>(
            "SELECT * FROM locations WHERE id = $1 AND organization_id = $2",
        )
        .bind(location_id)
        .bind(organization_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(location)
    }

    async fn list_audits(&self, organization_id: Uuid, filter: &AuditListFilter) -> AppResult<Vec<AuditListing>> {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT
                a.*,
                l.name AS location_name,
                NULLIF(CONCAT_WS(' ', cu.first_name, cu.last_name), '') AS created_by_name,
                NULLIF(CONCAT_WS(' ', pu.first_name, pu.last_name), '') AS performed_by_name
            FROM equipment_audits a
            LEFT JOIN locations l ON l.id = a.location_id
            LEFT JOIN users cu ON cu.id = a.created_by
            LEFT JOIN users pu ON pu.id = a.performed_by
            WHERE a.organization_id =
            "#,
        );
        query_builder.push_bind(organization_id);

        if let Some(status) = filter.status {
            query_builder.push(" AND a.status = ").push_bind(status);
        }
        if let Some(audit_type) = filter.audit_type {
            query_builder.push(" AND a.audit_type = ").push_bind(audit_type);
        }
        if let Some(date) = filter.date_from {
            query_builder.push(" AND a.scheduled_date >= ").push_bind(date);
        }
        if let Some(date) = filter.date_to {
            query_builder.push(" AND a.scheduled_date <= ").push_bind(date);
        }
        if let Some(search) = &filter.search {
            query_builder
                .push(" AND a.title ILIKE ")
                .push_bind(contains_pattern(search))
                .push(" ESCAPE '\\'");
        }

        query_builder
            .push(" ORDER BY a.scheduled_date DESC, a.created_at DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let audits = query_builder
            .build_query_as::<AuditListing>()
            .fetch_all(&self.db)
            .await?;

        Ok(audits)
    }

    async fn find_audit(&self, organization_id: Uuid, audit_id: Uuid) -> AppResult<Option<Audit>> {
        let audit = sqlx::query_as::<_, Audit>(
            "SELECT * FROM equipment_audits WHERE id = $1 AND organization_id = $2",
        )
        .bind(audit_id)
        .bind(organization_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(audit)
    }

    async fn insert_audit(&self, audit: &Audit) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO equipment_audits (
                id, organization_id, title, scheduled_date, audit_type, category_filter,
                location_id, notes, status, total_items, total_expected_quantity, counted_items,
                items_with_discrepancy, total_counted_quantity, created_by, performed_by,
                approved_by, created_at, started_at, completed_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(audit.id)
        .bind(audit.organization_id)
        .bind(&audit.title)
        .bind(audit.scheduled_date)
        .bind(audit.audit_type)
        .bind(&audit.category_filter)
        .bind(audit.location_id)
        .bind(&audit.notes)
        .bind(audit.status)
        .bind(audit.total_items)
        .bind(audit.total_expected_quantity)
        .bind(audit.counted_items)
        .bind(audit.items_with_discrepancy)
        .bind(audit.total_counted_quantity)
        .bind(audit.created_by)
        .bind(audit.performed_by)
        .bind(audit.approved_by)
        .bind(audit.created_at)
        .bind(audit.started_at)
        .bind(audit.completed_at)
        .bind(audit.updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn update_audit(&self, audit: &Audit, expected: AuditStatus) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE equipment_audits SET
                title = $1, scheduled_date = $2, audit_type = $3, category_filter = $4,
                location_id = $5, notes = $6, status = $7, total_items = $8,
                total_expected_quantity = $9, counted_items = $10, items_with_discrepancy = $11,
                total_counted_quantity = $12, performed_by = $13, approved_by = $14,
                started_at = $15, completed_at = $16, updated_at = $17
            WHERE id = $18 AND organization_id = $19 AND status = $20
            "#,
        )
        .bind(&audit.title)
        .bind(audit.scheduled_date)
        .bind(audit.audit_type)
        .bind(&audit.category_filter)
        .bind(audit.location_id)
        .bind(&audit.notes)
        .bind(audit.status)
        .bind(audit.total_items)
        .bind(audit.total_expected_quantity)
        .bind(audit.counted_items)
        .bind(audit.items_with_discrepancy)
        .bind(audit.total_counted_quantity)
        .bind(audit.performed_by)
        .bind(audit.approved_by)
        .bind(audit.started_at)
        .bind(audit.completed_at)
        .bind(audit.updated_at)
        .bind(audit.id)
        .bind(audit.organization_id)
        .bind(expected)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_audit(&self, organization_id: Uuid, audit_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM equipment_audits WHERE id = $1 AND organization_id = $2 AND status = $3",
        )
        .bind(audit_id)
        .bind(organization_id)
        .bind(AuditStatus::Scheduled)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn active_equipment(&self, organization_id: Uuid, filter: &EquipmentFilter) -> AppResult<Vec<Equipment>> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM equipment WHERE is_active = true AND organization_id = ");
        query_builder.push_bind(organization_id);

        if let Some(category) = &filter.category {
            query_builder.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(location_id) = filter.location_id {
            query_builder.push(" AND location_id = ").push_bind(location_id);
        }
        query_builder.push(" ORDER BY name");

        let equipment = query_builder
            .build_query_as::<Equipment>()
            .fetch_all(&self.db)
            .await?;

        Ok(equipment)
    }

    async fn start_audit(&self, audit: &Audit, lines: &[AuditCount]) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE equipment_audits SET
                status = $1, performed_by = $2, started_at = $3, total_items = $4,
                total_expected_quantity = $5, updated_at = $6
            WHERE id = $7 AND organization_id = $8 AND status = $9
            "#,
        )
        .bind(audit.status)
        .bind(audit.performed_by)
        .bind(audit.started_at)
        .bind(audit.total_items)
        .bind(audit.total_expected_quantity)
        .bind(audit.updated_at)
        .bind(audit.id)
        .bind(audit.organization_id)
        .bind(AuditStatus::Scheduled)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        for chunk in lines.chunks(SNAPSHOT_INSERT_CHUNK) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"
                INSERT INTO equipment_audit_counts (
                    id, audit_id, equipment_id, expected_quantity, counted_quantity, discrepancy,
                    observed_condition, notes, status, adjustment_approved, adjustment_reason,
                    adjusted_by, adjusted_at, counted_by, counted_at, created_at, updated_at
                )
                "#,
            );
            query_builder.push_values(chunk, |mut row, line| {
                row.push_bind(line.id)
                    .push_bind(line.audit_id)
                    .push_bind(line.equipment_id)
                    .push_bind(line.expected_quantity)
                    .push_bind(line.counted_quantity)
                    .push_bind(line.discrepancy)
                    .push_bind(line.observed_condition)
                    .push_bind(line.notes.clone())
                    .push_bind(line.status)
                    .push_bind(line.adjustment_approved)
                    .push_bind(line.adjustment_reason.clone())
                    .push_bind(line.adjusted_by)
                    .push_bind(line.adjusted_at)
                    .push_bind(line.counted_by)
                    .push_bind(line.counted_at)
                    .push_bind(line.created_at)
                    .push_bind(line.updated_at);
            });
            query_builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn counts_for_audit(&self, audit_id: Uuid) -> AppResult<Vec<AuditCount>> {
        let counts = sqlx::query_as::<_, AuditCount>(
            "SELECT * FROM equipment_audit_counts WHERE audit_id = $1",
        )
        .bind(audit_id)
        .fetch_all(&self.db)
        .await?;

        Ok(counts)
    }

    async fn list_counts(&self, audit_id: Uuid, filter: &CountListFilter) -> AppResult<Vec<CountWithEquipment>> {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT
                c.*,
                e.name AS equipment_name,
                e.category AS equipment_category,
                e.brand AS equipment_brand,
                e.condition AS equipment_condition
            FROM equipment_audit_counts c
            JOIN equipment e ON e.id = c.equipment_id
            WHERE c.audit_id =
            "#,
        );
        query_builder.push_bind(audit_id);

        if let Some(status) = filter.status {
            query_builder.push(" AND c.status = ").push_bind(status);
        }
        match filter.has_discrepancy {
            Some(true) => {
                query_builder.push(" AND c.discrepancy IS NOT NULL AND c.discrepancy <> 0");
            }
            Some(false) => {
                query_builder.push(" AND (c.discrepancy IS NULL OR c.discrepancy = 0)");
            }
            None => {}
        }
        if let Some(search) = &filter.search {
            query_builder
                .push(" AND e.name ILIKE ")
                .push_bind(contains_pattern(search))
                .push(" ESCAPE '\\'");
        }
        query_builder.push(" ORDER BY e.name, c.id");

        let counts = query_builder
            .build_query_as::<CountWithEquipment>()
            .fetch_all(&self.db)
            .await?;

        Ok(counts)
    }

    async fn find_count(&self, organization_id: Uuid, count_id: Uuid) -> AppResult<Option<AuditCount>> {
        let count = sqlx::query_as::<_, AuditCount>(
            r#"
            SELECT c.* FROM equipment_audit_counts c
            JOIN equipment_audits a ON a.id = c.audit_id
            WHERE c.id = $1 AND a.organization_id = $2
            "#,
        )
        .bind(count_id)
        .bind(organization_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(count)
    }

    async fn mutate_count(
        &self,
        organization_id: Uuid,
        count_id: Uuid,
        mutation: CountMutation,
    ) -> AppResult<AuditCount> {
        let mut tx = self.db.begin().await?;

        let (audit, count) = lock_count(&mut tx, organization_id, count_id).await?;
        let updated = mutation(&audit, &count)?;
        write_count(&mut *tx, &updated).await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn approve_adjustment(
        &self,
        organization_id: Uuid,
        count_id: Uuid,
        reason: &str,
        actor: Uuid,
    ) -> AppResult<AdjustmentOutcome> {
        let mut tx = self.db.begin().await?;

        let (audit, count) = lock_count(&mut tx, organization_id, count_id).await?;
        ensure_adjustments_open(&audit)?;

        let equipment = sqlx::query_as::<_, Equipment>(
            "SELECT * FROM equipment WHERE id = $1 AND organization_id = $2 FOR UPDATE",
        )
        .bind(count.equipment_id)
        .bind(organization_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Equipment not found".to_string()))?;

        let outcome = apply_adjustment(&count, &equipment, reason, actor, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE equipment SET
                total_quantity = total_quantity + $1,
                available_quantity = available_quantity + $1,
                condition = $2,
                updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(outcome.delta)
        .bind(outcome.equipment.condition)
        .bind(outcome.equipment.updated_at)
        .bind(outcome.equipment.id)
        .execute(&mut *tx)
        .await?;

        write_count(&mut *tx, &outcome.count).await?;

        tx.commit().await?;
        Ok(outcome)
    }
}
