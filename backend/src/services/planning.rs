//! Planning calendar service

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{event_duration_days, DateRange, EventType, PlanningKpis};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::order::{self, OrderListItem};

/// Planning service for the production calendar
#[derive(Clone)]
pub struct PlanningService {
    db: PgPool,
    capacity: u32,
    load_per_order: u32,
}

/// Planning event record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlanningEvent {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub event_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanningEventView {
    #[serde(flatten)]
    pub event: PlanningEvent,
    pub duration_days: i64,
}

impl From<PlanningEvent> for PlanningEventView {
    fn from(event: PlanningEvent) -> Self {
        Self {
            duration_days: event_duration_days(event.start_date, event.end_date),
            event,
        }
    }
}

/// Input for adding an event
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventInput {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    pub description: Option<String>,
    pub event_type: EventType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Query parameters for listing events
#[derive(Debug, Default, Deserialize)]
pub struct ListEventsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub event_type: Option<String>,
}

/// Planning board
#[derive(Debug, Clone, Serialize)]
pub struct PlanningOverview {
    pub kpis: PlanningKpis,
    pub scheduled_orders: Vec<OrderListItem>,
    pub events: Vec<PlanningEventView>,
}

fn event_type_filter(raw: Option<&str>) -> AppResult<Option<EventType>> {
    raw.filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<EventType>()
                .map_err(|e| AppError::validation("event_type", e.to_string()))
        })
        .transpose()
}

const EVENT_COLUMNS: &str =
    "id, title, description, event_type, start_date, end_date, created_by, created_at";

impl PlanningService {
    /// Create a new PlanningService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            capacity: config.planning.capacity,
            load_per_order: config.planning.load_per_order,
        }
    }

    /// KPIs, the production schedule and events still to come
    pub async fn overview(&self) -> AppResult<PlanningOverview> {
        let today = Utc::now().date_naive();

        let counts = order::count_by_status(&self.db).await?;
        let delayed = order::count_delayed(&self.db, today).await?;
        let scheduled_orders = order::scheduled_orders(&self.db).await?;
        let events = self
            .list_events(ListEventsQuery {
                from: Some(today),
                ..Default::default()
            })
            .await?;

        Ok(PlanningOverview {
            kpis: PlanningKpis::from_counts(&counts, delayed, self.load_per_order, self.capacity),
            scheduled_orders,
            events,
        })
    }

    /// Events overlapping the optional window, by start date
    pub async fn list_events(&self, query: ListEventsQuery) -> AppResult<Vec<PlanningEventView>> {
        let event_type = event_type_filter(query.event_type.as_deref())?;
        if let (Some(from), Some(to)) = (query.from, query.to) {
            DateRange::new(from, to)
                .ok_or_else(|| AppError::validation("to", "End date must not be before start date"))?;
        }

        let events = sqlx::query_as::<_, PlanningEvent>(&format!(
            r#"
            SELECT {}
            FROM planning_events
            WHERE ($1::date IS NULL OR end_date >= $1)
              AND ($2::date IS NULL OR start_date <= $2)
              AND ($3::text IS NULL OR event_type = $3)
            ORDER BY start_date, title
            "#,
            EVENT_COLUMNS
        ))
        .bind(query.from)
        .bind(query.to)
        .bind(event_type.map(|t| t.as_str()))
        .fetch_all(&self.db)
        .await?;

        Ok(events.into_iter().map(PlanningEventView::from).collect())
    }

    /// Add an event to the calendar
    pub async fn add_event(
        &self,
        created_by: Uuid,
        input: CreateEventInput,
    ) -> AppResult<PlanningEventView> {
        input.validate()?;
        shared::validate_required(&input.title).map_err(|msg| AppError::validation("title", msg))?;
        shared::validate_date_range(input.start_date, input.end_date)
            .map_err(|msg| AppError::validation("end_date", msg))?;

        let event = sqlx::query_as::<_, PlanningEvent>(&format!(
            r#"
            INSERT INTO planning_events (id, title, description, event_type, start_date, end_date, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(input.event_type.as_str())
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(created_by)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Planning event added");
        Ok(event.into())
    }

    /// Remove an event
    pub async fn delete_event(&self, event_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM planning_events WHERE id = $1")
            .bind(event_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Planning event".to_string()));
        }

        Ok(())
    }
}
