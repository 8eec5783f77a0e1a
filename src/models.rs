use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Category whose subjects are free-form rather than declared in the catalog.
pub const OTHER_CATEGORY: &str = "Other";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum Milestone {
    #[value(name = "90")]
    Day90,
    #[value(name = "180")]
    Day180,
}

impl Milestone {
    pub const ALL: [Milestone; 2] = [Milestone::Day90, Milestone::Day180];

    pub fn days(self) -> u32 {
        match self {
            Milestone::Day90 => 90,
            Milestone::Day180 => 180,
        }
    }

    pub fn kind(self) -> RecordKind {
        match self {
            Milestone::Day90 => RecordKind::Progress90,
            Milestone::Day180 => RecordKind::Progress180,
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-Day", self.days())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Rating {
    #[serde(rename = "Satisfactory")]
    Satisfactory,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
    #[serde(rename = "Unsatisfactory")]
    Unsatisfactory,
}

impl Rating {
    pub const ALL: [Rating; 3] = [
        Rating::Satisfactory,
        Rating::NeedsImprovement,
        Rating::Unsatisfactory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Satisfactory => "Satisfactory",
            Rating::NeedsImprovement => "Needs Improvement",
            Rating::Unsatisfactory => "Unsatisfactory",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Rating::ALL
            .into_iter()
            .find(|rating| rating.as_str() == value)
            .ok_or_else(|| format!("unknown rating {value:?}"))
    }
}

/// The four record collections, named as both JSON keys and table names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum RecordKind {
    Attendance,
    Assignments,
    #[value(name = "progress-90")]
    Progress90,
    #[value(name = "progress-180")]
    Progress180,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Attendance,
        RecordKind::Assignments,
        RecordKind::Progress90,
        RecordKind::Progress180,
    ];

    pub fn table(self) -> &'static str {
        match self {
            RecordKind::Attendance => "attendance",
            RecordKind::Assignments => "assignments",
            RecordKind::Progress90 => "progress_90",
            RecordKind::Progress180 => "progress_180",
        }
    }

    pub fn milestone(self) -> Option<Milestone> {
        match self {
            RecordKind::Progress90 => Some(Milestone::Day90),
            RecordKind::Progress180 => Some(Milestone::Day180),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub student: String,
    pub present: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub date: NaiveDate,
    pub student: String,
    pub category: String,
    pub subject: String,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub student: String,
    pub subject: String,
    pub rating: Rating,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Attendance(AttendanceRecord),
    Assignment(AssignmentRecord),
    Progress(Milestone, ProgressRecord),
}

/// Composite key identifying a record within its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Attendance {
        date: NaiveDate,
        student: String,
    },
    Assignment {
        date: NaiveDate,
        student: String,
        category: String,
        subject: String,
    },
    Progress {
        milestone: Milestone,
        student: String,
        subject: String,
    },
}

impl RecordKey {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordKey::Attendance { .. } => RecordKind::Attendance,
            RecordKey::Assignment { .. } => RecordKind::Assignments,
            RecordKey::Progress { milestone, .. } => milestone.kind(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Attendance { date, student } => {
                write!(f, "attendance[{date}, {student}]")
            }
            RecordKey::Assignment {
                date,
                student,
                category,
                subject,
            } => write!(f, "assignments[{date}, {student}, {category}, {subject}]"),
            RecordKey::Progress {
                milestone,
                student,
                subject,
            } => write!(f, "{}[{student}, {subject}]", milestone.kind()),
        }
    }
}

impl Record {
    pub fn attendance(date: NaiveDate, student: &str, present: bool) -> Self {
        Record::Attendance(AttendanceRecord {
            date,
            student: student.to_string(),
            present,
            updated_at: Utc::now(),
        })
    }

    pub fn assignment(
        date: NaiveDate,
        student: &str,
        category: &str,
        subject: &str,
        completed: bool,
    ) -> Self {
        Record::Assignment(AssignmentRecord {
            date,
            student: student.to_string(),
            category: category.to_string(),
            subject: subject.to_string(),
            completed,
            updated_at: Utc::now(),
        })
    }

    pub fn progress(milestone: Milestone, student: &str, subject: &str, rating: Rating) -> Self {
        Record::Progress(
            milestone,
            ProgressRecord {
                student: student.to_string(),
                subject: subject.to_string(),
                rating,
                updated_at: Utc::now(),
            },
        )
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Attendance(_) => RecordKind::Attendance,
            Record::Assignment(_) => RecordKind::Assignments,
            Record::Progress(milestone, _) => milestone.kind(),
        }
    }

    pub fn key(&self) -> RecordKey {
        match self {
            Record::Attendance(r) => RecordKey::Attendance {
                date: r.date,
                student: r.student.clone(),
            },
            Record::Assignment(r) => RecordKey::Assignment {
                date: r.date,
                student: r.student.clone(),
                category: r.category.clone(),
                subject: r.subject.clone(),
            },
            Record::Progress(milestone, r) => RecordKey::Progress {
                milestone: *milestone,
                student: r.student.clone(),
                subject: r.subject.clone(),
            },
        }
    }

    pub fn student(&self) -> &str {
        match self {
            Record::Attendance(r) => &r.student,
            Record::Assignment(r) => &r.student,
            Record::Progress(_, r) => &r.student,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Record::Attendance(r) => Some(r.date),
            Record::Assignment(r) => Some(r.date),
            Record::Progress(..) => None,
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            Record::Attendance(r) => r.updated_at,
            Record::Assignment(r) => r.updated_at,
            Record::Progress(_, r) => r.updated_at,
        }
    }

    pub fn touch(&mut self, at: DateTime<Utc>) {
        match self {
            Record::Attendance(r) => r.updated_at = at,
            Record::Assignment(r) => r.updated_at = at,
            Record::Progress(_, r) => r.updated_at = at,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Attendance(r) => write!(
                f,
                "{} {}: {}",
                r.date,
                r.student,
                if r.present { "present" } else { "absent" }
            ),
            Record::Assignment(r) => write!(
                f,
                "{} {}: {} - {} {}",
                r.date,
                r.student,
                r.category,
                r.subject,
                if r.completed { "completed" } else { "not completed" }
            ),
            Record::Progress(milestone, r) => {
                write!(f, "{milestone} {}: {} {}", r.student, r.subject, r.rating)
            }
        }
    }
}

/// Inclusive date window used by listing and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

/// Criteria applied to a listed collection. Fields a record kind does not
/// carry (dates and categories on progress records) are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub student: Option<String>,
    pub category: Option<String>,
    pub subject: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ListFilter {
    pub fn for_student(student: &str) -> Self {
        Self {
            student: Some(student.to_string()),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(student) = &self.student {
            if record.student() != student {
                return false;
            }
        }

        if let Some(date) = record.date() {
            if self.from.is_some_and(|from| date < from) || self.to.is_some_and(|to| date > to) {
                return false;
            }
        }

        let (category, subject) = match record {
            Record::Attendance(_) => (None, None),
            Record::Assignment(r) => (Some(r.category.as_str()), Some(r.subject.as_str())),
            Record::Progress(_, r) => (None, Some(r.subject.as_str())),
        };

        if let (Some(wanted), Some(actual)) = (&self.category, category) {
            if wanted != actual {
                return false;
            }
        }
        if let (Some(wanted), Some(actual)) = (&self.subject, subject) {
            if wanted != actual {
                return false;
            }
        }
        true
    }
}

/// All four collections, in the shape of the local backup document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub assignments: Vec<AssignmentRecord>,
    #[serde(default)]
    pub progress_90: Vec<ProgressRecord>,
    #[serde(default)]
    pub progress_180: Vec<ProgressRecord>,
}

impl RecordSet {
    fn progress_mut(&mut self, milestone: Milestone) -> &mut Vec<ProgressRecord> {
        match milestone {
            Milestone::Day90 => &mut self.progress_90,
            Milestone::Day180 => &mut self.progress_180,
        }
    }

    pub fn progress(&self, milestone: Milestone) -> &[ProgressRecord] {
        match milestone {
            Milestone::Day90 => &self.progress_90,
            Milestone::Day180 => &self.progress_180,
        }
    }

    /// Replaces the record with the same key in place, or appends it.
    pub fn upsert(&mut self, record: Record) {
        match record {
            Record::Attendance(new) => {
                match self
                    .attendance
                    .iter_mut()
                    .find(|r| r.date == new.date && r.student == new.student)
                {
                    Some(slot) => *slot = new,
                    None => self.attendance.push(new),
                }
            }
            Record::Assignment(new) => {
                match self.assignments.iter_mut().find(|r| {
                    r.date == new.date
                        && r.student == new.student
                        && r.category == new.category
                        && r.subject == new.subject
                }) {
                    Some(slot) => *slot = new,
                    None => self.assignments.push(new),
                }
            }
            Record::Progress(milestone, new) => {
                let list = self.progress_mut(milestone);
                match list
                    .iter_mut()
                    .find(|r| r.student == new.student && r.subject == new.subject)
                {
                    Some(slot) => *slot = new,
                    None => list.push(new),
                }
            }
        }
    }

    /// Removes the record stored under `key`; returns whether one existed.
    pub fn remove(&mut self, key: &RecordKey) -> bool {
        match key {
            RecordKey::Attendance { date, student } => {
                let before = self.attendance.len();
                self.attendance
                    .retain(|r| !(r.date == *date && r.student == *student));
                before != self.attendance.len()
            }
            RecordKey::Assignment {
                date,
                student,
                category,
                subject,
            } => {
                let before = self.assignments.len();
                self.assignments.retain(|r| {
                    !(r.date == *date
                        && r.student == *student
                        && r.category == *category
                        && r.subject == *subject)
                });
                before != self.assignments.len()
            }
            RecordKey::Progress {
                milestone,
                student,
                subject,
            } => {
                let list = self.progress_mut(*milestone);
                let before = list.len();
                list.retain(|r| !(r.student == *student && r.subject == *subject));
                before != list.len()
            }
        }
    }

    pub fn records(&self, kind: RecordKind) -> Vec<Record> {
        match kind {
            RecordKind::Attendance => self
                .attendance
                .iter()
                .cloned()
                .map(Record::Attendance)
                .collect(),
            RecordKind::Assignments => self
                .assignments
                .iter()
                .cloned()
                .map(Record::Assignment)
                .collect(),
            RecordKind::Progress90 | RecordKind::Progress180 => {
                let milestone = match kind.milestone() {
                    Some(milestone) => milestone,
                    None => return Vec::new(),
                };
                self.progress(milestone)
                    .iter()
                    .cloned()
                    .map(|r| Record::Progress(milestone, r))
                    .collect()
            }
        }
    }

    /// Overwrites one collection with `records`, keeping their order; records
    /// of other kinds are skipped. Keys in `records` must already be unique.
    pub fn replace(&mut self, kind: RecordKind, records: Vec<Record>) {
        match kind {
            RecordKind::Attendance => self.attendance.clear(),
            RecordKind::Assignments => self.assignments.clear(),
            RecordKind::Progress90 => self.progress_90.clear(),
            RecordKind::Progress180 => self.progress_180.clear(),
        }
        for record in records {
            match record {
                Record::Attendance(r) if kind == RecordKind::Attendance => self.attendance.push(r),
                Record::Assignment(r) if kind == RecordKind::Assignments => {
                    self.assignments.push(r)
                }
                Record::Progress(milestone, r) if milestone.kind() == kind => {
                    self.progress_mut(milestone).push(r)
                }
                _ => {}
            }
        }
    }

    /// Milestones with at least one rating on file for `student`.
    pub fn certified_milestones(&self, student: &str) -> Vec<Milestone> {
        Milestone::ALL
            .into_iter()
            .filter(|m| self.progress(*m).iter().any(|r| r.student == student))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.attendance.len()
            + self.assignments.len()
            + self.progress_90.len()
            + self.progress_180.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
    }

    #[test]
    fn upsert_overwrites_same_key() {
        let mut set = RecordSet::default();
        set.upsert(Record::attendance(day(1), "Lucy", false));
        set.upsert(Record::attendance(day(1), "Lucy", true));
        set.upsert(Record::attendance(day(1), "Vann", true));

        assert_eq!(set.attendance.len(), 2);
        assert!(set.attendance[0].present);
        assert_eq!(set.attendance[0].student, "Lucy");
    }

    #[test]
    fn progress_collections_are_independent() {
        let mut set = RecordSet::default();
        set.upsert(Record::progress(Milestone::Day90, "Lucy", "Math", Rating::Satisfactory));
        set.upsert(Record::progress(Milestone::Day180, "Lucy", "Math", Rating::Unsatisfactory));

        assert_eq!(set.progress_90.len(), 1);
        assert_eq!(set.progress_180.len(), 1);
        assert_eq!(set.progress_90[0].rating, Rating::Satisfactory);
    }

    #[test]
    fn remove_reports_whether_a_record_existed() {
        let mut set = RecordSet::default();
        let record = Record::assignment(day(2), "Killian", "Other", "Chess", true);
        let key = record.key();
        set.upsert(record);

        assert!(set.remove(&key));
        assert!(!set.remove(&key));
        assert!(set.is_empty());
    }

    #[test]
    fn replace_drops_foreign_kinds() {
        let mut set = RecordSet::default();
        set.upsert(Record::attendance(day(1), "Lucy", true));
        set.replace(
            RecordKind::Attendance,
            vec![
                Record::attendance(day(3), "Vann", false),
                Record::progress(Milestone::Day90, "Vann", "Math", Rating::Satisfactory),
            ],
        );

        assert_eq!(set.attendance.len(), 1);
        assert_eq!(set.attendance[0].student, "Vann");
        assert!(set.progress_90.is_empty());
    }

    #[test]
    fn replace_keeps_a_full_year_in_order() {
        let start = NaiveDate::from_ymd_opt(2025, 7, 21).unwrap();
        let records: Vec<Record> = (0..10_000u64)
            .map(|i| {
                let date = start + chrono::Days::new(i / 40);
                let subject = format!("Subject {}", i % 40);
                Record::assignment(date, "Lucy", OTHER_CATEGORY, &subject, i % 2 == 0)
            })
            .collect();

        let mut set = RecordSet::default();
        set.upsert(Record::assignment(day(1), "Vann", "Velos Coop", "Drama", true));
        set.replace(RecordKind::Assignments, records);

        assert_eq!(set.assignments.len(), 10_000);
        assert_eq!(set.assignments[0].subject, "Subject 0");
        assert_eq!(set.assignments[9_999].subject, "Subject 39");
        assert!(set.assignments.iter().all(|r| r.student == "Lucy"));
    }

    #[test]
    fn filter_matches_student_and_dates() {
        let filter = ListFilter {
            student: Some("Lucy".into()),
            from: Some(day(2)),
            to: Some(day(4)),
            ..ListFilter::default()
        };

        assert!(filter.matches(&Record::attendance(day(3), "Lucy", true)));
        assert!(!filter.matches(&Record::attendance(day(5), "Lucy", true)));
        assert!(!filter.matches(&Record::attendance(day(3), "Vann", true)));
        // progress records carry no date
        assert!(filter.matches(&Record::progress(
            Milestone::Day90,
            "Lucy",
            "Math",
            Rating::Satisfactory
        )));
    }

    #[test]
    fn filter_on_subject_skips_attendance_fields() {
        let filter = ListFilter {
            subject: Some("Math".into()),
            ..ListFilter::default()
        };
        assert!(filter.matches(&Record::attendance(day(1), "Lucy", true)));
        assert!(!filter.matches(&Record::assignment(day(1), "Lucy", "Three Oaks Academy", "PE", true)));
    }

    #[test]
    fn certified_milestones_per_student() {
        let mut set = RecordSet::default();
        set.upsert(Record::progress(Milestone::Day90, "Lucy", "Math", Rating::Satisfactory));
        assert_eq!(set.certified_milestones("Lucy"), vec![Milestone::Day90]);
        assert!(set.certified_milestones("Vann").is_empty());
    }

    #[test]
    fn rating_parses_display_strings() {
        assert_eq!("Needs Improvement".parse::<Rating>(), Ok(Rating::NeedsImprovement));
        assert!("needs improvement".parse::<Rating>().is_err());
        assert_eq!(
            serde_json::to_string(&Rating::NeedsImprovement).unwrap(),
            "\"Needs Improvement\""
        );
    }

    #[test]
    fn record_key_display_names_collection() {
        let key = Record::progress(Milestone::Day180, "Vann", "Science", Rating::Satisfactory).key();
        assert_eq!(key.to_string(), "progress_180[Vann, Science]");
        assert_eq!(key.kind(), RecordKind::Progress180);
    }
}
