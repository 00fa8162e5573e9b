use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::model::{AttendanceFact, AttendanceStatus};

/// Two-decimal rounding applied when a rate leaves the service.
pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Percentage of `statuses` equal to `status`. An empty set rates 0.
pub fn rate<I>(statuses: I, status: AttendanceStatus) -> f64
where
    I: IntoIterator<Item = AttendanceStatus>,
{
    StatusTally::from_statuses(statuses).rate(status)
}

pub fn ratio_percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64) / (total as f64) * 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTally {
    pub present: usize,
    pub absent: usize,
    pub justified: usize,
}

impl StatusTally {
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = AttendanceStatus>,
    {
        let mut t = StatusTally::default();
        for s in statuses {
            t.add(s);
        }
        t
    }

    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Justified => self.justified += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.present + self.absent + self.justified
    }

    pub fn count(&self, status: AttendanceStatus) -> usize {
        match status {
            AttendanceStatus::Present => self.present,
            AttendanceStatus::Absent => self.absent,
            AttendanceStatus::Justified => self.justified,
        }
    }

    pub fn rate(&self, status: AttendanceStatus) -> f64 {
        ratio_percent(self.count(status), self.total())
    }

    pub fn presence_rate(&self) -> f64 {
        self.rate(AttendanceStatus::Present)
    }

    pub fn absence_rate(&self) -> f64 {
        self.rate(AttendanceStatus::Absent)
    }

    pub fn justified_rate(&self) -> f64 {
        self.rate(AttendanceStatus::Justified)
    }

    pub fn summary(&self) -> RateSummary {
        RateSummary::from(self)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RateSummary {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub justified: usize,
    pub presence_rate: f64,
    pub absence_rate: f64,
    pub justified_rate: f64,
}

impl From<&StatusTally> for RateSummary {
    fn from(t: &StatusTally) -> Self {
        Self {
            total: t.total(),
            present: t.present,
            absent: t.absent,
            justified: t.justified,
            presence_rate: round_2_decimals(t.presence_rate()),
            absence_rate: round_2_decimals(t.absence_rate()),
            justified_rate: round_2_decimals(t.justified_rate()),
        }
    }
}

pub fn tally(facts: &[AttendanceFact]) -> StatusTally {
    StatusTally::from_statuses(facts.iter().map(|f| f.status))
}

/// Groups facts by `key` and tallies each group.
pub fn tally_by<F>(facts: &[AttendanceFact], key: F) -> HashMap<String, StatusTally>
where
    F: Fn(&AttendanceFact) -> &str,
{
    let mut out: HashMap<String, StatusTally> = HashMap::new();
    for f in facts {
        out.entry(key(f).to_string()).or_default().add(f.status);
    }
    out
}

pub fn within(facts: &[AttendanceFact], from: NaiveDate, to: NaiveDate) -> Vec<AttendanceFact> {
    facts
        .iter()
        .filter(|f| from <= f.date && f.date <= to)
        .cloned()
        .collect()
}

/// A student's rate in one class next to that class's overall rate.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassComparison {
    pub class_id: String,
    pub enrollment_id: String,
    pub student: StatusTally,
    pub class: StatusTally,
}

impl ClassComparison {
    pub fn difference(&self) -> f64 {
        self.student.presence_rate() - self.class.presence_rate()
    }
}

/// `enrollments` are the student's `(enrollment_id, class_id)` pairs;
/// `class_facts` must cover every record of those classes.
pub fn compare_with_classes(
    enrollments: &[(String, String)],
    class_facts: &[AttendanceFact],
) -> Vec<ClassComparison> {
    let by_class = tally_by(class_facts, |f| f.class_id.as_str());
    let by_enrollment = tally_by(class_facts, |f| f.enrollment_id.as_str());
    enrollments
        .iter()
        .map(|(enrollment_id, class_id)| ClassComparison {
            class_id: class_id.clone(),
            enrollment_id: enrollment_id.clone(),
            student: by_enrollment.get(enrollment_id).copied().unwrap_or_default(),
            class: by_class.get(class_id).copied().unwrap_or_default(),
        })
        .collect()
}

fn by_rate_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Stable descending sort on raw presence rate.
pub fn rank_by_presence<T>(items: &mut [(T, StatusTally)]) {
    items.sort_by(|a, b| by_rate_desc(a.1.presence_rate(), b.1.presence_rate()));
}

/// Stable descending sort on raw absence rate.
pub fn rank_by_absence<T>(items: &mut [(T, StatusTally)]) {
    items.sort_by(|a, b| by_rate_desc(a.1.absence_rate(), b.1.absence_rate()));
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket<K> {
    pub key: K,
    pub tally: StatusTally,
}

/// Sunday-first weekday buckets; days without records are omitted.
pub fn bucket_by_weekday(facts: &[AttendanceFact]) -> Vec<Bucket<Weekday>> {
    let mut slots: [StatusTally; 7] = Default::default();
    for f in facts {
        slots[f.date.weekday().num_days_from_sunday() as usize].add(f.status);
    }
    let mut out = Vec::new();
    let mut day = Weekday::Sun;
    for slot in slots {
        if slot.total() > 0 {
            out.push(Bucket { key: day, tally: slot });
        }
        day = day.succ();
    }
    out
}

/// Chronological `(year, month)` buckets.
pub fn bucket_by_month(facts: &[AttendanceFact]) -> Vec<Bucket<(i32, u32)>> {
    let mut months: BTreeMap<(i32, u32), StatusTally> = BTreeMap::new();
    for f in facts {
        months
            .entry((f.date.year(), f.date.month()))
            .or_default()
            .add(f.status);
    }
    months
        .into_iter()
        .map(|(key, tally)| Bucket { key, tally })
        .collect()
}

/// Chronological counts of plain dates per month.
pub fn count_by_month<I>(dates: I) -> Vec<((i32, u32), usize)>
where
    I: IntoIterator<Item = NaiveDate>,
{
    let mut months: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for d in dates {
        *months.entry((d.year(), d.month())).or_default() += 1;
    }
    months.into_iter().collect()
}

pub fn month_label((year, month): (i32, u32)) -> String {
    format!("{:04}-{:02}", year, month)
}

pub fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AttendanceStatus::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    fn fact(enrollment: &str, class: &str, date: NaiveDate, status: AttendanceStatus) -> AttendanceFact {
        AttendanceFact {
            enrollment_id: enrollment.to_string(),
            class_id: class.to_string(),
            student_id: format!("s-{}", enrollment),
            professor_id: "p1".to_string(),
            date,
            status,
        }
    }

    #[test]
    fn seven_two_one_split() {
        let mut statuses = vec![Present; 7];
        statuses.extend([Absent, Absent, Justified]);
        let t = StatusTally::from_statuses(statuses.iter().copied());
        let s = t.summary();
        assert_eq!(s.total, 10);
        assert_eq!(s.presence_rate, 70.0);
        assert_eq!(s.absence_rate, 20.0);
        assert_eq!(s.justified_rate, 10.0);
        assert_eq!(rate(statuses, Present), 70.0);
    }

    #[test]
    fn empty_set_rates_zero() {
        for status in AttendanceStatus::ALL {
            assert_eq!(rate(Vec::<AttendanceStatus>::new(), status), 0.0);
        }
        let s = StatusTally::default().summary();
        assert_eq!((s.presence_rate, s.absence_rate, s.justified_rate), (0.0, 0.0, 0.0));
    }

    #[test]
    fn rates_sum_to_hundred() {
        let sets: Vec<Vec<AttendanceStatus>> = vec![
            vec![Present],
            vec![Present, Absent, Absent],
            vec![Justified, Absent, Present, Present, Absent, Present, Justified],
            vec![Absent; 13],
        ];
        for set in sets {
            let t = StatusTally::from_statuses(set.iter().copied());
            let raw: f64 = AttendanceStatus::ALL.iter().map(|s| t.rate(*s)).sum();
            assert!((raw - 100.0).abs() < 1e-9, "raw sum {}", raw);
            let s = t.summary();
            let rounded = s.presence_rate + s.absence_rate + s.justified_rate;
            assert!((rounded - 100.0).abs() <= 0.02, "rounded sum {}", rounded);
        }
    }

    #[test]
    fn rounding_only_at_boundary() {
        let t = StatusTally::from_statuses([Present, Absent, Absent]);
        assert!((t.presence_rate() - 100.0 / 3.0).abs() < 1e-12);
        assert_eq!(t.summary().presence_rate, 33.33);
        assert_eq!(t.summary().absence_rate, 66.67);
    }

    #[test]
    fn comparison_against_class_average() {
        let facts = vec![
            fact("e1", "c1", d(2025, 3, 3), Present),
            fact("e1", "c1", d(2025, 3, 4), Absent),
            fact("e2", "c1", d(2025, 3, 3), Present),
            fact("e2", "c1", d(2025, 3, 4), Present),
        ];
        let cmp = compare_with_classes(&[("e1".into(), "c1".into())], &facts);
        assert_eq!(cmp.len(), 1);
        assert_eq!(cmp[0].student.presence_rate(), 50.0);
        assert_eq!(cmp[0].class.presence_rate(), 75.0);
        assert_eq!(cmp[0].difference(), -25.0);
    }

    #[test]
    fn comparison_for_class_without_records() {
        let cmp = compare_with_classes(&[("e9".into(), "c9".into())], &[]);
        assert_eq!(cmp[0].difference(), 0.0);
        assert_eq!(cmp[0].student.total(), 0);
    }

    #[test]
    fn ranking_uses_raw_ratio_and_is_stable() {
        let a = StatusTally::from_statuses([Present, Present, Absent]); // 66.666..
        let b = StatusTally::from_statuses([Present, Present, Present, Absent, Absent, Absent, Absent, Present, Present]); // 55.5..
        let c = StatusTally::from_statuses([Present, Absent, Absent, Present, Present, Present]); // 66.666..
        let mut items = vec![("b", b), ("a", a), ("c", c)];
        rank_by_presence(&mut items);
        let order: Vec<&str> = items.iter().map(|(k, _)| *k).collect();
        assert_eq!(order, vec!["a", "c", "b"]);

        rank_by_absence(&mut items);
        assert_eq!(items[0].0, "b");
    }

    #[test]
    fn weekday_buckets_are_sunday_first() {
        // 2025-03-02 is a Sunday.
        let facts = vec![
            fact("e1", "c1", d(2025, 3, 5), Present), // Wednesday
            fact("e1", "c1", d(2025, 3, 2), Absent),  // Sunday
            fact("e1", "c1", d(2025, 3, 12), Absent), // Wednesday
            fact("e1", "c1", d(2025, 3, 3), Present), // Monday
        ];
        let buckets = bucket_by_weekday(&facts);
        let days: Vec<Weekday> = buckets.iter().map(|b| b.key).collect();
        assert_eq!(days, vec![Weekday::Sun, Weekday::Mon, Weekday::Wed]);
        assert_eq!(buckets[2].tally.total(), 2);
        assert_eq!(buckets[2].tally.presence_rate(), 50.0);
        assert_eq!(weekday_label(buckets[0].key), "Sunday");
    }

    #[test]
    fn month_buckets_are_chronological() {
        let facts = vec![
            fact("e1", "c1", d(2025, 2, 10), Present),
            fact("e1", "c1", d(2024, 12, 1), Absent),
            fact("e1", "c1", d(2025, 2, 11), Absent),
        ];
        let buckets = bucket_by_month(&facts);
        let labels: Vec<String> = buckets.iter().map(|b| month_label(b.key)).collect();
        assert_eq!(labels, vec!["2024-12", "2025-02"]);
        assert_eq!(buckets[1].tally.total(), 2);
    }

    #[test]
    fn window_is_inclusive() {
        let facts = vec![
            fact("e1", "c1", d(2025, 1, 1), Present),
            fact("e1", "c1", d(2025, 1, 31), Present),
            fact("e1", "c1", d(2025, 2, 1), Present),
        ];
        assert_eq!(within(&facts, d(2025, 1, 1), d(2025, 1, 31)).len(), 2);
    }
}
