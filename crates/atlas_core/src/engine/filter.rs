//! Access/visibility predicates over stars.
//!
//! # Responsibility
//! - Let hosts restrict which stars take part in clustering and rendering.
//!
//! # Invariants
//! - A rejected star never gains a synthesized edge or cluster membership
//!   in a filtered pass.

use crate::model::star::{date_key, normalize_date_key, parse_date_key, Star, StarValidationError};
use chrono::{Days, Local, NaiveDate};
use std::collections::HashSet;

/// Predicate deciding whether a star is visible to the current caller.
pub trait StarFilter {
    fn is_accessible(&self, star: &Star) -> bool;
}

impl<F> StarFilter for F
where
    F: Fn(&Star) -> bool,
{
    fn is_accessible(&self, star: &Star) -> bool {
        self(star)
    }
}

/// Applies an optional filter; `None` admits every star.
pub fn is_accessible(filter: Option<&dyn StarFilter>, star: &Star) -> bool {
    filter.map_or(true, |filter| filter.is_accessible(star))
}

/// Admits stars dated on or after `since`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentWindow {
    since: String,
}

impl RecentWindow {
    /// Window starting at `since` (inclusive).
    pub fn since(since: &str) -> Result<Self, StarValidationError> {
        Ok(Self {
            since: normalize_date_key(since)?,
        })
    }

    /// Window of `days` calendar days ending at `today` (inclusive of the
    /// cutoff `today - days`).
    pub fn ending_on(today: &str, days: u32) -> Result<Self, StarValidationError> {
        let today = normalize_date_key(today)?;
        parse_date_key(&today)
            .and_then(|date| Self::ending_on_date(date, days))
            .ok_or(StarValidationError::InvalidDate(today))
    }

    /// Window of `days` calendar days ending at the local calendar day.
    pub fn ending_today(days: u32) -> Option<Self> {
        Self::ending_on_date(Local::now().date_naive(), days)
    }

    fn ending_on_date(today: NaiveDate, days: u32) -> Option<Self> {
        let cutoff = today.checked_sub_days(Days::new(u64::from(days)))?;
        Some(Self {
            since: date_key(cutoff),
        })
    }

    pub fn cutoff(&self) -> &str {
        &self.since
    }
}

impl StarFilter for RecentWindow {
    fn is_accessible(&self, star: &Star) -> bool {
        star.date.as_str() >= self.since.as_str()
    }
}

/// Admits only explicitly listed dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateAllowList {
    dates: HashSet<String>,
}

impl DateAllowList {
    pub fn new<I, S>(dates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dates: dates.into_iter().map(Into::into).collect(),
        }
    }
}

impl StarFilter for DateAllowList {
    fn is_accessible(&self, star: &Star) -> bool {
        self.dates.contains(&star.date)
    }
}
