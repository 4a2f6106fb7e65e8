//! Recurrence rules.
//!
//! Accepted forms:
//! - RRULE-style: `FREQ=MONTHLY;INTERVAL=2;UNTIL=2026-12-31;FROM=COMPLETION`
//! - Words: `daily`, `weekly`, `monthly`, `yearly`, `every 3 days`
//!
//! Month arithmetic clamps to the end of the month (Jan 31 + 1 month is
//! Feb 28/29).

use chrono::{Days, Months, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" | "day" | "days" => Some(Self::Daily),
            "weekly" | "week" | "weeks" => Some(Self::Weekly),
            "monthly" | "month" | "months" => Some(Self::Monthly),
            "yearly" | "annually" | "year" | "years" => Some(Self::Yearly),
            _ => None,
        }
    }

    const fn as_rule(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

/// What the next occurrence is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    /// Shift each date from its own current value.
    #[default]
    Due,
    /// Next due is one interval after the completion date.
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub until: Option<NaiveDate>,
    pub anchor: Anchor,
}

/// Dates for the next occurrence of a recurring task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NextDates {
    pub due: Option<NaiveDate>,
    pub defer: Option<NaiveDate>,
    pub scheduled: Option<NaiveDate>,
}

impl RecurrenceRule {
    /// Parse rule text.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the text is not a rule.
    pub fn parse(text: &str) -> Result<Self, String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err("empty recurrence rule".to_string());
        }

        let lower = trimmed.to_lowercase();
        let lower = lower.strip_prefix("rrule:").unwrap_or(&lower);

        if lower.contains('=') {
            Self::parse_rrule(lower)
        } else {
            Self::parse_words(lower)
        }
    }

    fn parse_rrule(text: &str) -> Result<Self, String> {
        let mut frequency = None;
        let mut interval = 1;
        let mut until = None;
        let mut anchor = Anchor::Due;

        for part in text.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| format!("expected KEY=VALUE, got '{part}'"))?;
            match key.trim() {
                "freq" => {
                    frequency = Some(
                        Frequency::parse(value.trim())
                            .ok_or_else(|| format!("unknown frequency '{value}'"))?,
                    );
                }
                "interval" => interval = parse_interval(value.trim())?,
                "until" => until = Some(parse_until(value.trim())?),
                "from" => {
                    anchor = match value.trim() {
                        "due" => Anchor::Due,
                        "completion" | "completed" => Anchor::Completion,
                        other => return Err(format!("unknown anchor '{other}'")),
                    };
                }
                other => return Err(format!("unsupported rule part '{other}'")),
            }
        }

        Ok(Self {
            frequency: frequency.ok_or("rule has no FREQ")?,
            interval,
            until,
            anchor,
        })
    }

    fn parse_words(text: &str) -> Result<Self, String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let (frequency, interval) = match words.as_slice() {
            [single] => (Frequency::parse(single), 1),
            ["every", unit] => (Frequency::parse(unit), 1),
            ["every", n, unit] => (Frequency::parse(unit), parse_interval(n)?),
            _ => (None, 1),
        };

        frequency
            .map(|frequency| Self {
                frequency,
                interval,
                until: None,
                anchor: Anchor::Due,
            })
            .ok_or_else(|| format!("unrecognized recurrence '{text}'"))
    }

    /// Move a date forward by one interval.
    #[must_use]
    pub fn advance(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self.frequency {
            Frequency::Daily => date.checked_add_days(Days::new(u64::from(self.interval))),
            Frequency::Weekly => date.checked_add_days(Days::new(u64::from(self.interval) * 7)),
            Frequency::Monthly => date.checked_add_months(Months::new(self.interval)),
            Frequency::Yearly => {
                date.checked_add_months(Months::new(self.interval.checked_mul(12)?))
            }
        }
    }

    /// Compute the next occurrence's dates.
    ///
    /// Returns `Ok(None)` when the series has ended (next due after `UNTIL`).
    /// A task with no dates at all recurs from its completion date.
    ///
    /// # Errors
    ///
    /// Returns a reason when date arithmetic overflows.
    pub fn next_dates(
        &self,
        current: NextDates,
        completed_on: NaiveDate,
    ) -> Result<Option<NextDates>, String> {
        let step = |date: NaiveDate| {
            self.advance(date)
                .ok_or_else(|| format!("date overflow advancing {date}"))
        };

        let has_dates =
            current.due.is_some() || current.defer.is_some() || current.scheduled.is_some();

        let next = match (self.anchor, has_dates) {
            (Anchor::Due, true) => NextDates {
                due: current.due.map(step).transpose()?,
                defer: current.defer.map(step).transpose()?,
                scheduled: current.scheduled.map(step).transpose()?,
            },
            (Anchor::Completion, true) => {
                let base = step(completed_on)?;
                match current.due {
                    Some(due) => NextDates {
                        due: Some(base),
                        defer: current.defer.map(|d| base - (due - d)),
                        scheduled: current.scheduled.map(|s| base - (due - s)),
                    },
                    None => NextDates {
                        due: None,
                        defer: current.defer.map(|_| base),
                        scheduled: current.scheduled.map(|_| base),
                    },
                }
            }
            (_, false) => NextDates {
                due: Some(step(completed_on)?),
                ..NextDates::default()
            },
        };

        let lead = next.due.or(next.scheduled).or(next.defer);
        if let (Some(until), Some(lead)) = (self.until, lead) {
            if lead > until {
                return Ok(None);
            }
        }

        Ok(Some(next))
    }

    /// Canonical RRULE-style text for this rule.
    #[must_use]
    pub fn to_rule_string(&self) -> String {
        let mut out = format!("FREQ={}", self.frequency.as_rule());
        if self.interval != 1 {
            out.push_str(&format!(";INTERVAL={}", self.interval));
        }
        if let Some(until) = self.until {
            out.push_str(&format!(";UNTIL={}", until.format("%Y-%m-%d")));
        }
        if self.anchor == Anchor::Completion {
            out.push_str(";FROM=COMPLETION");
        }
        out
    }
}

fn parse_interval(s: &str) -> Result<u32, String> {
    match s.parse::<u32>() {
        Ok(0) | Err(_) => Err(format!("interval must be a positive integer, got '{s}'")),
        Ok(n) => Ok(n),
    }
}

fn parse_until(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .map_err(|_| format!("invalid UNTIL date '{s}'"))
}
