//! Sleep report aggregation.
//!
//! Pure functions over a snapshot of the record store. Nothing here fails:
//! unparseable dates are skipped, and a window without records produces the
//! illustrative demo shape flagged with `illustrative = true`, so callers can
//! tell placeholder buckets from real ones.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{SleepGoal, SleepRecord};

/// Hour-of-night checkpoints for the day view.
pub const DAY_CHECKPOINTS: [u32; 5] = [0, 2, 4, 6, 8];

const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MONTH_WEEK_LABELS: [&str; 4] = ["W1", "W2", "W3", "W4"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    #[default]
    Week,
    Month,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" => Ok(Period::Day),
            "week" | "weekly" => Ok(Period::Week),
            "month" | "monthly" => Ok(Period::Month),
            other => Err(format!("unknown period {other:?} (expected day, week or month)")),
        }
    }
}

/// One labelled slice of the time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodBucket {
    pub label: String,
    /// Sleep duration in hours.
    pub hours: f64,
    /// Sleep score, 0–100.
    pub score: f64,
    /// Records that contributed; 0 for empty or illustrative buckets.
    pub samples: usize,
}

impl PeriodBucket {
    fn fixed(label: &str, hours: f64, score: f64) -> Self {
        Self {
            label: label.to_string(),
            hours,
            score,
            samples: 0,
        }
    }
}

/// Share of deep / light / REM sleep in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageDistribution {
    pub deep: f64,
    pub light: f64,
    pub rem: f64,
}

impl StageDistribution {
    pub const PLACEHOLDER: StageDistribution = StageDistribution {
        deep: 25.0,
        light: 55.0,
        rem: 20.0,
    };

    pub fn total(&self) -> f64 {
        self.deep + self.light + self.rem
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub period: Period,
    /// `YYYY-MM-DD` date the window was built around.
    pub anchor: String,
    pub buckets: Vec<PeriodBucket>,
    pub stages: StageDistribution,
    /// Longest single night in the window, minutes.
    pub longest_minutes: u32,
    /// Average sleep against the goal's time in bed, percent (capped at 100).
    pub efficiency_percent: f64,
    /// Mean sleep duration in the window, minutes.
    pub average_minutes: f64,
    pub average_score: f64,
    pub record_count: usize,
    /// True when buckets and stages are the demo placeholders.
    pub illustrative: bool,
    pub insight: String,
}

/// Most recent parseable record date.
pub fn anchor_date(records: &[SleepRecord]) -> Option<NaiveDate> {
    records.iter().filter_map(SleepRecord::parsed_date).max()
}

/// Records whose date falls inside the period window around `anchor`.
pub fn active_records(records: &[SleepRecord], period: Period, anchor: NaiveDate) -> Vec<&SleepRecord> {
    records
        .iter()
        .filter(|r| r.parsed_date().is_some_and(|d| in_window(d, period, anchor)))
        .collect()
}

fn in_window(date: NaiveDate, period: Period, anchor: NaiveDate) -> bool {
    match period {
        Period::Day => date == anchor,
        Period::Week => same_week(date, anchor),
        Period::Month => date.year() == anchor.year() && date.month() == anchor.month(),
    }
}

/// Monday-to-Sunday week membership. Compares ISO weeks instead of doing
/// date arithmetic, so dates at chrono's bounds cannot overflow.
fn same_week(date: NaiveDate, anchor: NaiveDate) -> bool {
    date.iso_week() == anchor.iso_week()
}

/// Labelled buckets for `period`, aggregated from the records in its window.
/// Falls back to [`illustrative_buckets`] when the window is empty.
pub fn period_buckets(records: &[SleepRecord], period: Period, anchor: NaiveDate) -> Vec<PeriodBucket> {
    let active = active_records(records, period, anchor);
    if active.is_empty() {
        return illustrative_buckets(period);
    }
    match period {
        Period::Day => day_buckets(&active),
        Period::Week => week_buckets(&active, anchor),
        Period::Month => month_buckets(&active),
    }
}

fn day_buckets(night: &[&SleepRecord]) -> Vec<PeriodBucket> {
    let (hours, score) = means(night);
    DAY_CHECKPOINTS
        .iter()
        .map(|&checkpoint| {
            let asleep = hours.min(f64::from(checkpoint));
            PeriodBucket {
                label: format!("{checkpoint:02}h"),
                hours: round_to(asleep, 2),
                score: if asleep > 0.0 { round_to(score, 1) } else { 0.0 },
                samples: night.len(),
            }
        })
        .collect()
}

fn week_buckets(active: &[&SleepRecord], anchor: NaiveDate) -> Vec<PeriodBucket> {
    WEEKDAY_LABELS
        .iter()
        .enumerate()
        .map(|(offset, label)| {
            let on_day: Vec<&SleepRecord> = active
                .iter()
                .copied()
                .filter(|r| {
                    r.parsed_date().is_some_and(|d| {
                        same_week(d, anchor) && d.weekday().num_days_from_monday() as usize == offset
                    })
                })
                .collect();
            bucket(label, &on_day)
        })
        .collect()
}

fn month_buckets(active: &[&SleepRecord]) -> Vec<PeriodBucket> {
    MONTH_WEEK_LABELS
        .iter()
        .enumerate()
        .map(|(week, label)| {
            let in_week: Vec<&SleepRecord> = active
                .iter()
                .copied()
                .filter(|r| r.parsed_date().is_some_and(|d| week_of_month(d) == week))
                .collect();
            bucket(label, &in_week)
        })
        .collect()
}

/// Zero-based week of the month; days 29–31 fold into the fourth week.
fn week_of_month(date: NaiveDate) -> usize {
    (((date.day() - 1) / 7) as usize).min(MONTH_WEEK_LABELS.len() - 1)
}

fn bucket(label: &str, records: &[&SleepRecord]) -> PeriodBucket {
    let (hours, score) = means(records);
    PeriodBucket {
        label: label.to_string(),
        hours: round_to(hours, 2),
        score: round_to(score, 1),
        samples: records.len(),
    }
}

/// Mean hours and mean score; zeros for an empty slice.
fn means(records: &[&SleepRecord]) -> (f64, f64) {
    if records.is_empty() {
        return (0.0, 0.0);
    }
    let n = records.len() as f64;
    let hours = records.iter().map(|r| r.duration_hours()).sum::<f64>() / n;
    let score = records.iter().map(|r| f64::from(r.score)).sum::<f64>() / n;
    (hours, score)
}

/// Fixed demo shapes shown before there is any history.
pub fn illustrative_buckets(period: Period) -> Vec<PeriodBucket> {
    match period {
        Period::Day => vec![
            PeriodBucket::fixed("00h", 0.0, 0.0),
            PeriodBucket::fixed("02h", 2.0, 80.0),
            PeriodBucket::fixed("04h", 4.0, 90.0),
            PeriodBucket::fixed("06h", 6.0, 85.0),
            PeriodBucket::fixed("08h", 7.5, 95.0),
        ],
        Period::Week => vec![
            PeriodBucket::fixed("Mon", 7.2, 85.0),
            PeriodBucket::fixed("Tue", 6.5, 70.0),
            PeriodBucket::fixed("Wed", 8.0, 92.0),
            PeriodBucket::fixed("Thu", 5.8, 62.0),
            PeriodBucket::fixed("Fri", 7.5, 78.0),
            PeriodBucket::fixed("Sat", 9.2, 95.0),
            PeriodBucket::fixed("Sun", 8.5, 88.0),
        ],
        Period::Month => vec![
            PeriodBucket::fixed("W1", 6.8, 72.0),
            PeriodBucket::fixed("W2", 7.4, 85.0),
            PeriodBucket::fixed("W3", 7.1, 78.0),
            PeriodBucket::fixed("W4", 8.2, 92.0),
        ],
    }
}

/// Average deep/light/REM shares, normalised to sum to 100.
/// Returns the placeholder distribution when there is nothing to average.
pub fn stage_distribution<'a, I>(records: I) -> StageDistribution
where
    I: IntoIterator<Item = &'a SleepRecord>,
{
    let (mut deep, mut light, mut rem, mut n) = (0.0, 0.0, 0.0, 0usize);
    for r in records {
        deep += f64::from(r.deep_sleep);
        light += f64::from(r.light_sleep);
        rem += f64::from(r.rem_sleep);
        n += 1;
    }
    let total = deep + light + rem;
    if n == 0 || total <= 0.0 {
        return StageDistribution::PLACEHOLDER;
    }
    StageDistribution {
        deep: round_to(deep / total * 100.0, 1),
        light: round_to(light / total * 100.0, 1),
        rem: round_to(rem / total * 100.0, 1),
    }
}

pub fn longest_minutes<'a, I>(records: I) -> u32
where
    I: IntoIterator<Item = &'a SleepRecord>,
{
    records.into_iter().map(|r| r.duration).max().unwrap_or(0)
}

pub fn average_minutes<'a, I>(records: I) -> f64
where
    I: IntoIterator<Item = &'a SleepRecord>,
{
    let (sum, n) = records
        .into_iter()
        .fold((0u64, 0u64), |(sum, n), r| (sum + u64::from(r.duration), n + 1));
    if n == 0 {
        0.0
    } else {
        sum as f64 / n as f64
    }
}

/// Average sleep over the goal's time in bed, as a percentage capped at 100.
pub fn efficiency_percent(average_minutes: f64, goal: &SleepGoal) -> f64 {
    let in_bed = f64::from(goal.in_bed_minutes());
    if in_bed <= 0.0 || average_minutes <= 0.0 {
        return 0.0;
    }
    round_to((average_minutes / in_bed * 100.0).min(100.0), 1)
}

/// Build the full report. `anchor` defaults to the most recent record date.
pub fn summarize(
    records: &[SleepRecord],
    period: Period,
    anchor: Option<NaiveDate>,
    goal: &SleepGoal,
) -> AnalyticsReport {
    let anchor = anchor
        .or_else(|| anchor_date(records))
        .unwrap_or_else(|| Utc::now().date_naive());
    let active = active_records(records, period, anchor);
    let illustrative = active.is_empty();

    let buckets = period_buckets(records, period, anchor);
    let stages = stage_distribution(active.iter().copied());
    let average = average_minutes(active.iter().copied());
    let average_score = if active.is_empty() {
        0.0
    } else {
        active.iter().map(|r| f64::from(r.score)).sum::<f64>() / active.len() as f64
    };

    let insight = insight_for(period, &active, &buckets, average);

    AnalyticsReport {
        period,
        anchor: anchor.format(crate::models::DATE_FORMAT).to_string(),
        stages,
        longest_minutes: longest_minutes(active.iter().copied()),
        efficiency_percent: efficiency_percent(average, goal),
        average_minutes: round_to(average, 1),
        average_score: round_to(average_score, 1),
        record_count: active.len(),
        illustrative,
        insight,
        buckets,
    }
}

fn insight_for(period: Period, active: &[&SleepRecord], buckets: &[PeriodBucket], average: f64) -> String {
    if active.is_empty() {
        return "Log a few nights to unlock your sleep report.".to_string();
    }
    if average < 420.0 {
        return "You are averaging under seven hours. Try moving bedtime a little earlier.".to_string();
    }
    match period {
        Period::Week => {
            let sampled = |range: std::ops::Range<usize>| -> Option<f64> {
                let hours: Vec<f64> = buckets[range]
                    .iter()
                    .filter(|b| b.samples > 0)
                    .map(|b| b.hours)
                    .collect();
                (!hours.is_empty()).then(|| hours.iter().sum::<f64>() / hours.len() as f64)
            };
            if let (Some(weekday), Some(weekend)) = (sampled(0..5), sampled(5..7)) {
                if weekend - weekday >= 1.0 {
                    return "You are catching up on sleep at the weekend. Weekday nights need more time."
                        .to_string();
                }
            }
        }
        Period::Month => {
            let hours: Vec<f64> = buckets.iter().filter(|b| b.samples > 0).map(|b| b.hours).collect();
            let spread = hours.iter().cloned().fold(f64::MIN, f64::max)
                - hours.iter().cloned().fold(f64::MAX, f64::min);
            if hours.len() > 1 && spread <= 1.0 {
                return "Your sleep pattern this month has been steady.".to_string();
            }
        }
        Period::Day => {}
    }
    "Keep the routine going. Consistency is what lifts sleep quality.".to_string()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Mood;

    fn night(id: &str, date: &str, score: u8, duration: u32, stages: (u8, u8, u8)) -> SleepRecord {
        SleepRecord {
            id: id.to_string(),
            date: date.to_string(),
            score,
            duration,
            deep_sleep: stages.0,
            light_sleep: stages.1,
            rem_sleep: stages.2,
            mood: Mood::Neutral,
            satisfaction: 3,
            title: String::new(),
            memo: String::new(),
            tags: vec![],
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn december() -> Vec<SleepRecord> {
        vec![
            // 2024-12-20 is a Friday; its week runs 16..=22.
            night("r1", "2024-12-20", 88, 480, (30, 50, 20)),
            night("r2", "2024-12-19", 65, 350, (15, 65, 20)),
            night("r3", "2024-12-15", 75, 420, (20, 60, 20)),
        ]
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("Week".parse::<Period>().unwrap(), Period::Week);
        assert_eq!("monthly".parse::<Period>().unwrap(), Period::Month);
        assert!("year".parse::<Period>().is_err());
    }

    #[test]
    fn test_week_buckets_aggregate_real_records() {
        let records = december();
        let buckets = period_buckets(&records, Period::Week, date("2024-12-20"));

        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].label, "Mon");
        let thu = &buckets[3];
        assert_eq!(thu.samples, 1);
        assert!((thu.hours - 5.83).abs() < 0.01);
        assert!((thu.score - 65.0).abs() < 1e-9);
        let fri = &buckets[4];
        assert!((fri.hours - 8.0).abs() < 1e-9);
        // 2024-12-15 is the previous Sunday, outside the window.
        assert_eq!(buckets[6].samples, 0);
        assert_eq!(buckets[6].hours, 0.0);
    }

    #[test]
    fn test_month_buckets_by_week_of_month() {
        let mut records = december();
        records.push(night("r4", "2024-12-30", 90, 540, (25, 55, 20)));
        let buckets = period_buckets(&records, Period::Month, date("2024-12-20"));

        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[0].samples, 0);
        // 15 -> W3
        assert_eq!(buckets[2].samples, 3);
        // 30 folds into W4
        assert_eq!(buckets[3].samples, 1);
        assert!((buckets[3].hours - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_day_buckets_track_hours_asleep() {
        let records = december();
        let buckets = period_buckets(&records, Period::Day, date("2024-12-19"));

        let hours: Vec<f64> = buckets.iter().map(|b| b.hours).collect();
        assert_eq!(hours, vec![0.0, 2.0, 4.0, 5.83, 5.83]);
        assert_eq!(buckets[0].score, 0.0);
        assert_eq!(buckets[1].score, 65.0);
    }

    #[test]
    fn test_empty_window_falls_back_to_illustrative_shape() {
        let buckets = period_buckets(&[], Period::Week, date("2024-12-20"));
        assert_eq!(buckets, illustrative_buckets(Period::Week));
        assert!(buckets.iter().all(|b| b.samples == 0));

        let report = summarize(&[], Period::Month, None, &SleepGoal::default());
        assert!(report.illustrative);
        assert_eq!(report.record_count, 0);
        assert_eq!(report.longest_minutes, 0);
        assert_eq!(report.efficiency_percent, 0.0);
        assert_eq!(report.stages, StageDistribution::PLACEHOLDER);
    }

    #[test]
    fn test_stage_distribution_sums_to_100() {
        let records = vec![
            night("a", "2024-12-01", 70, 400, (33, 33, 33)),
            night("b", "2024-12-02", 70, 400, (10, 70, 25)),
            night("c", "2024-12-03", 70, 400, (0, 0, 7)),
        ];
        let dist = stage_distribution(&records);
        assert!((dist.total() - 100.0).abs() <= 0.2, "total was {}", dist.total());

        let dist = stage_distribution(&december());
        assert!((dist.total() - 100.0).abs() <= 0.2);
        assert!((dist.deep - 21.7).abs() < 0.05);
    }

    #[test]
    fn test_stage_distribution_placeholder_when_empty_or_zero() {
        assert_eq!(stage_distribution(&[]), StageDistribution::PLACEHOLDER);
        let zeros = vec![night("z", "2024-12-01", 0, 0, (0, 0, 0))];
        assert_eq!(stage_distribution(&zeros), StageDistribution::PLACEHOLDER);
    }

    #[test]
    fn test_summarize_week_scalars() {
        let report = summarize(&december(), Period::Week, None, &SleepGoal::default());

        assert_eq!(report.anchor, "2024-12-20");
        assert!(!report.illustrative);
        assert_eq!(report.record_count, 2);
        assert_eq!(report.longest_minutes, 480);
        assert_eq!(report.average_minutes, 415.0);
        assert_eq!(report.average_score, 76.5);
        // 415 / 510
        assert!((report.efficiency_percent - 81.4).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_is_capped() {
        let goal = SleepGoal {
            bedtime: "23:00".to_string(),
            wake_time: "05:00".to_string(),
        };
        assert_eq!(efficiency_percent(480.0, &goal), 100.0);
        assert_eq!(efficiency_percent(0.0, &goal), 0.0);
    }

    #[test]
    fn test_unparseable_dates_are_skipped() {
        let records = vec![night("bad", "12/20/2024", 90, 500, (30, 50, 20))];
        assert!(anchor_date(&records).is_none());
        let report = summarize(&records, Period::Week, Some(date("2024-12-20")), &SleepGoal::default());
        assert!(report.illustrative);
    }

    #[test]
    fn test_weekend_catch_up_insight() {
        let records = vec![
            night("mon", "2024-12-16", 70, 400, (20, 60, 20)),
            night("tue", "2024-12-17", 70, 440, (20, 60, 20)),
            night("sat", "2024-12-21", 90, 560, (20, 60, 20)),
        ];
        let report = summarize(&records, Period::Week, None, &SleepGoal::default());
        assert!(report.insight.contains("weekend"), "{}", report.insight);
    }

    #[test]
    fn test_dates_at_calendar_bounds_never_panic() {
        let far = NaiveDate::MAX.format(crate::models::DATE_FORMAT).to_string();
        let records = vec![
            night("far", &far, 80, 420, (20, 60, 20)),
            night("r1", "2024-12-20", 88, 480, (25, 55, 20)),
        ];
        assert_eq!(anchor_date(&records), Some(NaiveDate::MAX));

        for period in [Period::Day, Period::Week, Period::Month] {
            let report = summarize(&records, period, None, &SleepGoal::default());
            assert_eq!(report.record_count, 1, "{period}");
            assert!(!report.illustrative);

            let report = summarize(&records, period, Some(NaiveDate::MIN), &SleepGoal::default());
            assert!(report.illustrative, "{period}");
        }
    }
}
