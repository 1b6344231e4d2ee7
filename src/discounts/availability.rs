//! Discount Availability
//!
//! When, where and for whom a discount is offered. Authors describe
//! availability with "all X" switches plus optional detail fields
//! ([`AvailabilityDraft`]); validation turns those into enums so a
//! validated discount cannot carry a switch that contradicts its details.

use jiff::civil::{Date, Time, Weekday};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::{discounts::errors::InvalidDiscount, ids::BranchId};

/// Availability as authored, before validation.
#[derive(Debug, Clone)]
pub struct AvailabilityDraft {
    /// Discount never expires.
    pub always_active: bool,

    /// First active day, required when not always active.
    pub active_from: Option<Date>,

    /// Last active day (inclusive), required when not always active.
    pub active_until: Option<Date>,

    /// Discount applies at any time of day.
    pub all_day: bool,

    /// Daily opening time, required when not all day.
    pub day_start: Option<Time>,

    /// Daily closing time (exclusive), required when not all day.
    pub day_end: Option<Time>,

    /// Discount applies on every weekday.
    pub all_week: bool,

    /// Weekdays on which the discount applies when not all week.
    pub days_of_week: Vec<Weekday>,

    /// Only customers using the app qualify.
    pub app_users_only: bool,

    /// Discount is offered at every branch.
    pub all_branches: bool,

    /// Branches offering the discount when not all branches.
    pub branches: Vec<BranchId>,
}

impl Default for AvailabilityDraft {
    fn default() -> Self {
        Self {
            always_active: true,
            active_from: None,
            active_until: None,
            all_day: true,
            day_start: None,
            day_end: None,
            all_week: true,
            days_of_week: Vec::new(),
            app_users_only: false,
            all_branches: true,
            branches: Vec::new(),
        }
    }
}

/// Calendar period during which a discount runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivePeriod {
    /// No start or end.
    Always,

    /// Runs from `from` through the whole of `until`.
    Between {
        /// First active day.
        from: Date,
        /// Last active day.
        until: Date,
    },
}

impl ActivePeriod {
    /// Whether `date` falls within the period.
    pub fn contains(&self, date: Date) -> bool {
        match self {
            Self::Always => true,
            Self::Between { from, until } => *from <= date && date <= *until,
        }
    }
}

/// Time-of-day window during which a discount runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayWindow {
    /// Any time of day.
    AllDay,

    /// Half-open window `[start, end)`.
    Between {
        /// Opening time.
        start: Time,
        /// Closing time, exclusive.
        end: Time,
    },
}

impl DayWindow {
    /// Whether `time` falls within the window.
    pub fn contains(&self, time: Time) -> bool {
        match self {
            Self::AllDay => true,
            Self::Between { start, end } => *start <= time && time < *end,
        }
    }
}

/// Weekdays on which a discount runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Weekdays {
    /// Every day.
    All,

    /// Only the listed days (never empty).
    Only(SmallVec<[Weekday; 7]>),
}

impl Weekdays {
    /// Whether the discount runs on `weekday`.
    pub fn contains(&self, weekday: Weekday) -> bool {
        match self {
            Self::All => true,
            Self::Only(days) => days.contains(&weekday),
        }
    }
}

/// Branches offering a discount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchScope {
    /// Every branch.
    All,

    /// Only the listed branches (never empty).
    Only(FxHashSet<BranchId>),
}

impl BranchScope {
    /// Whether `branch` offers the discount.
    pub fn contains(&self, branch: &BranchId) -> bool {
        match self {
            Self::All => true,
            Self::Only(branches) => branches.contains(branch),
        }
    }
}

/// Validated availability of a discount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    period: ActivePeriod,
    hours: DayWindow,
    days: Weekdays,
    branches: BranchScope,
    app_users_only: bool,
}

impl Availability {
    /// Availability with no restrictions at all.
    pub fn unrestricted() -> Self {
        Self {
            period: ActivePeriod::Always,
            hours: DayWindow::AllDay,
            days: Weekdays::All,
            branches: BranchScope::All,
            app_users_only: false,
        }
    }

    /// Validate an authored availability.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidDiscount`] when a restriction switch is off but its
    /// details are missing, empty or inverted.
    pub fn validate(draft: AvailabilityDraft) -> Result<Self, InvalidDiscount> {
        let period = if draft.always_active {
            ActivePeriod::Always
        } else {
            let (Some(from), Some(until)) = (draft.active_from, draft.active_until) else {
                return Err(InvalidDiscount::MissingActivePeriod);
            };

            if from > until {
                return Err(InvalidDiscount::InvertedActivePeriod { from, until });
            }

            ActivePeriod::Between { from, until }
        };

        let hours = if draft.all_day {
            DayWindow::AllDay
        } else {
            let (Some(start), Some(end)) = (draft.day_start, draft.day_end) else {
                return Err(InvalidDiscount::MissingDayWindow);
            };

            if start >= end {
                return Err(InvalidDiscount::InvertedDayWindow { start, end });
            }

            DayWindow::Between { start, end }
        };

        let days = if draft.all_week {
            Weekdays::All
        } else {
            let mut days: SmallVec<[Weekday; 7]> = SmallVec::new();

            for day in draft.days_of_week {
                if !days.contains(&day) {
                    days.push(day);
                }
            }

            if days.is_empty() {
                return Err(InvalidDiscount::NoWeekdays);
            }

            Weekdays::Only(days)
        };

        let branches = if draft.all_branches {
            BranchScope::All
        } else {
            let branches: FxHashSet<BranchId> = draft.branches.into_iter().collect();

            if branches.is_empty() {
                return Err(InvalidDiscount::NoBranches);
            }

            BranchScope::Only(branches)
        };

        Ok(Self {
            period,
            hours,
            days,
            branches,
            app_users_only: draft.app_users_only,
        })
    }

    /// Calendar period.
    pub const fn period(&self) -> &ActivePeriod {
        &self.period
    }

    /// Daily window.
    pub const fn hours(&self) -> &DayWindow {
        &self.hours
    }

    /// Weekdays.
    pub const fn days(&self) -> &Weekdays {
        &self.days
    }

    /// Branch scope.
    pub const fn branches(&self) -> &BranchScope {
        &self.branches
    }

    /// Whether only app users qualify.
    pub const fn app_users_only(&self) -> bool {
        self.app_users_only
    }
}
