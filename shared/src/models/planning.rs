//! Planning calendar models

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::order::StatusCounts;

/// Kind of event on the planning calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Maintenance,
    Production,
    Meeting,
    Breakdown,
    Holiday,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Maintenance => "maintenance",
            EventType::Production => "production",
            EventType::Meeting => "meeting",
            EventType::Breakdown => "breakdown",
            EventType::Holiday => "holiday",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Maintenance => write!(f, "Maintenance"),
            EventType::Production => write!(f, "Production"),
            EventType::Meeting => write!(f, "Meeting"),
            EventType::Breakdown => write!(f, "Breakdown"),
            EventType::Holiday => write!(f, "Holiday"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maintenance" => Ok(EventType::Maintenance),
            "production" => Ok(EventType::Production),
            "meeting" => Ok(EventType::Meeting),
            "breakdown" => Ok(EventType::Breakdown),
            "holiday" => Ok(EventType::Holiday),
            other => Err(UnknownEventType(other.to_string())),
        }
    }
}

/// Number of calendar days covered by an event, both ends included
pub fn event_duration_days(start_date: NaiveDate, end_date: NaiveDate) -> i64 {
    (end_date - start_date).num_days() + 1
}

/// Production load as a percentage of capacity, capped at 100
pub fn workload_percent(scheduled_orders: i64, load_per_order: u32, capacity: u32) -> u8 {
    if capacity == 0 {
        return if scheduled_orders > 0 { 100 } else { 0 };
    }

    let load = scheduled_orders.max(0) as f64 * f64::from(load_per_order);
    let percent = (load / f64::from(capacity) * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Headline figures for the planning board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanningKpis {
    pub total_orders: i64,
    pub in_production: i64,
    pub confirmed: i64,
    pub to_schedule: i64,
    pub delayed: i64,
    pub completed: i64,
    pub workload_percent: u8,
}

impl PlanningKpis {
    pub fn from_counts(counts: &StatusCounts, delayed: i64, load_per_order: u32, capacity: u32) -> Self {
        Self {
            total_orders: counts.total(),
            in_production: counts.in_production,
            confirmed: counts.confirmed,
            to_schedule: counts.draft,
            delayed,
            completed: counts.completed(),
            workload_percent: workload_percent(counts.scheduled(), load_per_order, capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_single_day_event_lasts_one_day() {
        assert_eq!(event_duration_days(date(2024, 3, 1), date(2024, 3, 1)), 1);
        assert_eq!(event_duration_days(date(2024, 2, 28), date(2024, 3, 1)), 3);
    }

    #[test]
    fn test_workload_percent() {
        assert_eq!(workload_percent(0, 10, 100), 0);
        assert_eq!(workload_percent(4, 10, 100), 40);
        assert_eq!(workload_percent(25, 10, 100), 100);
        assert_eq!(workload_percent(1, 10, 0), 100);
    }

    #[test]
    fn test_kpis_from_counts() {
        let mut counts = StatusCounts::default();
        counts.record(OrderStatus::Draft, 1);
        counts.record(OrderStatus::Confirmed, 2);
        counts.record(OrderStatus::InProduction, 3);
        counts.record(OrderStatus::Shipped, 1);

        let kpis = PlanningKpis::from_counts(&counts, 2, 10, 100);
        assert_eq!(kpis.total_orders, 7);
        assert_eq!(kpis.to_schedule, 1);
        assert_eq!(kpis.completed, 1);
        assert_eq!(kpis.workload_percent, 50);
    }

    #[test]
    fn test_event_type_strings() {
        assert_eq!("breakdown".parse::<EventType>().unwrap(), EventType::Breakdown);
        assert!("party".parse::<EventType>().is_err());
    }
}
