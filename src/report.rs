use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use crate::calendar::SchoolCalendar;
use crate::catalog::StudentCatalog;
use crate::error::ReportRenderError;
use crate::models::{AssignmentRecord, DateRange, Milestone, Rating, RecordSet, OTHER_CATEGORY};
use crate::pdf::{Font, PdfWriter};

const NO_DATA: &str = "no data";

/// Hits out of recorded entries. The rate is `None` when nothing was recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub hits: u32,
    pub total: u32,
}

impl Tally {
    fn record(&mut self, hit: bool) {
        self.total += 1;
        if hit {
            self.hits += 1;
        }
    }

    fn absorb(&mut self, other: Tally) {
        self.hits += other.hits;
        self.total += other.total;
    }

    /// Percentage in `0.0..=100.0`.
    pub fn rate(&self) -> Option<f64> {
        (self.total > 0).then(|| f64::from(self.hits) / f64::from(self.total) * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSummary {
    pub category: String,
    pub subject: String,
    pub completion: Tally,
}

impl SubjectSummary {
    pub fn column(&self) -> String {
        format!("{} - {}", self.category, self.subject)
    }
}

/// A rating as it will be printed; checked against [`Rating`] at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEntry {
    pub milestone: Milestone,
    pub subject: String,
    pub rating: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierCounts {
    pub milestone: Milestone,
    pub satisfactory: u32,
    pub needs_improvement: u32,
    pub unsatisfactory: u32,
}

impl TierCounts {
    fn empty(milestone: Milestone) -> Self {
        Self {
            milestone,
            satisfactory: 0,
            needs_improvement: 0,
            unsatisfactory: 0,
        }
    }

    fn count(&mut self, rating: Rating) {
        match rating {
            Rating::Satisfactory => self.satisfactory += 1,
            Rating::NeedsImprovement => self.needs_improvement += 1,
            Rating::Unsatisfactory => self.unsatisfactory += 1,
        }
    }

    pub fn get(&self, rating: Rating) -> u32 {
        match rating {
            Rating::Satisfactory => self.satisfactory,
            Rating::NeedsImprovement => self.needs_improvement,
            Rating::Unsatisfactory => self.unsatisfactory,
        }
    }
}

/// One tracked date for one student. `completed[i]` belongs to
/// `subjects[i]` of the owning [`StudentSummary`].
#[derive(Debug, Clone, PartialEq)]
pub struct DayEntry {
    pub date: NaiveDate,
    pub present: bool,
    pub completed: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentSummary {
    pub student: String,
    pub attendance: Tally,
    pub subjects: Vec<SubjectSummary>,
    pub progress: Vec<ProgressEntry>,
    pub tiers: Vec<TierCounts>,
    /// Every date tracked for any reported student, in date order.
    pub days: Vec<DayEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: String,
    pub completion: Tally,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryModel {
    pub generated_at: DateTime<Utc>,
    pub school_year: DateRange,
    pub range: DateRange,
    pub total_school_days: u32,
    pub school_days_in_range: u32,
    pub tracked_days: usize,
    pub first_tracked: Option<NaiveDate>,
    pub last_tracked: Option<NaiveDate>,
    pub milestone_dates: Vec<(Milestone, NaiveDate)>,
    pub students: Vec<StudentSummary>,
    pub categories: Vec<CategorySummary>,
}

pub struct ReportGenerator<'a> {
    catalog: &'a StudentCatalog,
    calendar: &'a SchoolCalendar,
}

fn completion(assignments: &[&AssignmentRecord], category: &str, subject: &str) -> Tally {
    let mut tally = Tally::default();
    for record in assignments
        .iter()
        .filter(|r| r.category == category && r.subject == subject)
    {
        tally.record(record.completed);
    }
    tally
}

impl<'a> ReportGenerator<'a> {
    pub fn new(catalog: &'a StudentCatalog, calendar: &'a SchoolCalendar) -> Self {
        Self { catalog, calendar }
    }

    /// Aggregates `data` for the named students over `range`. Students come
    /// out in roster order whatever order they were requested in.
    pub fn build_summary(
        &self,
        data: &RecordSet,
        students: &[String],
        range: DateRange,
    ) -> SummaryModel {
        for name in students {
            if self.catalog.student(name).is_none() {
                warn!(student = %name, "skipping unknown student in report");
            }
        }

        let mut tracked = BTreeSet::new();
        let mut categories: Vec<CategorySummary> = Vec::new();
        let mut summaries = Vec::new();
        let mut daily_sources = Vec::new();

        for student in self
            .catalog
            .students()
            .iter()
            .filter(|s| students.contains(&s.name))
        {
            let mut attendance = Tally::default();
            let mut present_on = BTreeMap::new();
            for record in data
                .attendance
                .iter()
                .filter(|r| r.student == student.name && range.contains(r.date))
            {
                attendance.record(record.present);
                tracked.insert(record.date);
                present_on.insert(record.date, record.present);
            }

            let assignments: Vec<&AssignmentRecord> = data
                .assignments
                .iter()
                .filter(|r| r.student == student.name && range.contains(r.date))
                .collect();
            tracked.extend(assignments.iter().map(|r| r.date));

            let mut subjects = Vec::new();
            for category in &student.categories {
                for subject in &category.subjects {
                    subjects.push(SubjectSummary {
                        category: category.name.clone(),
                        subject: subject.clone(),
                        completion: completion(&assignments, &category.name, subject),
                    });
                }
            }

            let custom: BTreeSet<&str> = assignments
                .iter()
                .filter(|r| r.category == OTHER_CATEGORY)
                .map(|r| r.subject.as_str())
                .collect();
            for subject in custom {
                if subjects
                    .iter()
                    .any(|s| s.category == OTHER_CATEGORY && s.subject == subject)
                {
                    continue;
                }
                subjects.push(SubjectSummary {
                    category: OTHER_CATEGORY.to_string(),
                    subject: subject.to_string(),
                    completion: completion(&assignments, OTHER_CATEGORY, subject),
                });
            }

            for subject in &subjects {
                match categories.iter_mut().find(|c| c.category == subject.category) {
                    Some(existing) => existing.completion.absorb(subject.completion),
                    None => categories.push(CategorySummary {
                        category: subject.category.clone(),
                        completion: subject.completion,
                    }),
                }
            }

            let mut progress = Vec::new();
            let mut tiers = Vec::new();
            for milestone in Milestone::ALL {
                let mut counts = TierCounts::empty(milestone);
                let mut rated: Vec<_> = data
                    .progress(milestone)
                    .iter()
                    .filter(|r| r.student == student.name)
                    .collect();
                rated.sort_by_key(|r| {
                    let position = self
                        .catalog
                        .progress_subjects()
                        .iter()
                        .position(|s| *s == r.subject)
                        .unwrap_or(usize::MAX);
                    (position, r.subject.clone())
                });
                for record in rated {
                    counts.count(record.rating);
                    progress.push(ProgressEntry {
                        milestone,
                        subject: record.subject.clone(),
                        rating: record.rating.to_string(),
                    });
                }
                tiers.push(counts);
            }

            summaries.push(StudentSummary {
                student: student.name.clone(),
                attendance,
                subjects,
                progress,
                tiers,
                days: Vec::new(),
            });
            daily_sources.push((present_on, assignments));
        }

        for (summary, (present_on, assignments)) in summaries.iter_mut().zip(&daily_sources) {
            summary.days = tracked
                .iter()
                .map(|&date| DayEntry {
                    date,
                    present: present_on.get(&date).copied().unwrap_or(false),
                    completed: summary
                        .subjects
                        .iter()
                        .map(|s| {
                            assignments.iter().any(|r| {
                                r.date == date
                                    && r.completed
                                    && r.category == s.category
                                    && r.subject == s.subject
                            })
                        })
                        .collect(),
                })
                .collect();
        }

        let before_range = range
            .from
            .pred_opt()
            .map(|d| self.calendar.school_days_elapsed(d))
            .unwrap_or(0);

        SummaryModel {
            generated_at: Utc::now(),
            school_year: DateRange::new(self.calendar.start(), self.calendar.end()),
            range,
            total_school_days: self.calendar.total_school_days(),
            school_days_in_range: self
                .calendar
                .school_days_elapsed(range.to)
                .saturating_sub(before_range),
            tracked_days: tracked.len(),
            first_tracked: tracked.first().copied(),
            last_tracked: tracked.last().copied(),
            milestone_dates: Milestone::ALL
                .into_iter()
                .filter_map(|m| self.calendar.milestone_date(m).map(|d| (m, d)))
                .collect(),
            students: summaries,
            categories,
        }
    }
}

fn percent(rate: Option<f64>) -> String {
    match rate {
        Some(rate) => format!("{rate:.1}%"),
        None => NO_DATA.to_string(),
    }
}

/// Rejects any progress entry whose rating is not one of the known tiers.
fn check_ratings(model: &SummaryModel) -> Result<(), ReportRenderError> {
    for student in &model.students {
        for entry in &student.progress {
            if entry.rating.parse::<Rating>().is_err() {
                return Err(ReportRenderError::MalformedRating {
                    student: student.student.clone(),
                    milestone: entry.milestone,
                    subject: entry.subject.clone(),
                    value: entry.rating.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Subject columns: the union over all students in first-seen order.
fn subject_columns(model: &SummaryModel) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for student in &model.students {
        for subject in &student.subjects {
            let column = subject.column();
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
    }
    columns
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ReportRenderError> {
    writer
        .into_inner()
        .map_err(|err| ReportRenderError::Io(err.into_error()))
}

/// One row per student. A subject the student does not take is left blank.
pub fn render_csv(model: &SummaryModel) -> Result<Vec<u8>, ReportRenderError> {
    check_ratings(model)?;

    let columns = subject_columns(model);

    let mut header = vec![
        "Student".to_string(),
        "From".to_string(),
        "To".to_string(),
        "Days Present".to_string(),
        "Days Recorded".to_string(),
        "Attendance Rate".to_string(),
    ];
    header.extend(columns.iter().cloned());
    for milestone in Milestone::ALL {
        for rating in Rating::ALL {
            header.push(format!("{milestone} {rating}"));
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;

    for student in &model.students {
        let mut row = vec![
            student.student.clone(),
            model.range.from.to_string(),
            model.range.to.to_string(),
            student.attendance.hits.to_string(),
            student.attendance.total.to_string(),
            percent(student.attendance.rate()),
        ];
        for column in &columns {
            let cell = student
                .subjects
                .iter()
                .find(|s| s.column() == *column)
                .map(|s| percent(s.completion.rate()))
                .unwrap_or_default();
            row.push(cell);
        }
        for milestone in Milestone::ALL {
            let counts = student
                .tiers
                .iter()
                .find(|t| t.milestone == milestone)
                .copied()
                .unwrap_or_else(|| TierCounts::empty(milestone));
            for rating in Rating::ALL {
                row.push(counts.get(rating).to_string());
            }
        }
        writer.write_record(&row)?;
    }

    finish_csv(writer)
}

/// Daily tracking sheet: one row per (date, student) in date then roster
/// order, with a completion flag per subject column.
pub fn render_daily_csv(model: &SummaryModel) -> Result<Vec<u8>, ReportRenderError> {
    let columns = subject_columns(model);

    let mut header = vec!["Date".to_string(), "Student".to_string(), "Present".to_string()];
    header.extend(columns.iter().cloned());

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;

    let day_count = model.students.first().map_or(0, |s| s.days.len());
    for index in 0..day_count {
        for student in &model.students {
            let Some(day) = student.days.get(index) else {
                continue;
            };
            let mut row = vec![
                day.date.to_string(),
                student.student.clone(),
                day.present.to_string(),
            ];
            for column in &columns {
                let cell = student
                    .subjects
                    .iter()
                    .position(|s| s.column() == *column)
                    .and_then(|i| day.completed.get(i))
                    .map(|done| done.to_string())
                    .unwrap_or_default();
                row.push(cell);
            }
            writer.write_record(&row)?;
        }
    }

    finish_csv(writer)
}

/// Progress tracking sheet: one row per rating, milestone first, then
/// students in roster order.
pub fn render_progress_csv(model: &SummaryModel) -> Result<Vec<u8>, ReportRenderError> {
    check_ratings(model)?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Milestone", "Student", "Subject", "Rating"])?;
    for milestone in Milestone::ALL {
        for student in &model.students {
            for entry in student.progress.iter().filter(|e| e.milestone == milestone) {
                writer.write_record([
                    milestone.to_string().as_str(),
                    student.student.as_str(),
                    entry.subject.as_str(),
                    entry.rating.as_str(),
                ])?;
            }
        }
    }

    finish_csv(writer)
}

pub fn render_pdf(model: &SummaryModel) -> Result<Vec<u8>, ReportRenderError> {
    check_ratings(model)?;

    let long_date = |d: NaiveDate| d.format("%B %d, %Y").to_string();
    let mut pdf = PdfWriter::new("Three Oaks Academy Comprehensive Progress Report");

    pdf.centered(Font::Bold, 18.0, "Three Oaks Academy Comprehensive Progress Report");
    pdf.gap(20.0);
    pdf.line(
        Font::Regular,
        10.0,
        &format!(
            "Report Generated: {}",
            model.generated_at.format("%B %d, %Y at %I:%M %p UTC")
        ),
    );
    pdf.line(
        Font::Regular,
        10.0,
        &format!(
            "School Year: {} - {}",
            long_date(model.school_year.from),
            long_date(model.school_year.to)
        ),
    );
    pdf.line(
        Font::Regular,
        10.0,
        &format!("Report Range: {} to {}", model.range.from, model.range.to),
    );
    if let (Some(first), Some(last)) = (model.first_tracked, model.last_tracked) {
        pdf.line(
            Font::Regular,
            10.0,
            &format!(
                "Data Range: {first} to {last} ({} days tracked)",
                model.tracked_days
            ),
        );
    }
    pdf.gap(20.0);

    pdf.line(Font::Bold, 14.0, "Executive Summary");
    let year_share = if model.total_school_days > 0 {
        model.tracked_days as f64 / f64::from(model.total_school_days) * 100.0
    } else {
        0.0
    };
    pdf.line(
        Font::Regular,
        10.0,
        &format!(
            "- Total School Days Tracked: {} out of {} possible ({year_share:.1}% of school year)",
            model.tracked_days, model.total_school_days
        ),
    );
    pdf.line(
        Font::Regular,
        10.0,
        &format!("- School Days In Report Range: {}", model.school_days_in_range),
    );
    for (milestone, date) in &model.milestone_dates {
        pdf.line(
            Font::Regular,
            10.0,
            &format!("- {milestone} Milestone Date: {}", long_date(*date)),
        );
    }
    pdf.gap(20.0);

    let subject_widths = [144.0, 90.0, 72.0, 90.0];
    for student in &model.students {
        pdf.line(Font::Bold, 14.0, &format!("Detailed Report: {}", student.student));

        pdf.line(Font::Bold, 12.0, "Attendance Record");
        match student.attendance.rate() {
            Some(rate) => pdf.line(
                Font::Regular,
                10.0,
                &format!(
                    "Days Present: {} out of {} tracked days ({rate:.1}%)",
                    student.attendance.hits, student.attendance.total
                ),
            ),
            None => pdf.line(Font::Regular, 10.0, "No attendance data recorded"),
        }
        pdf.gap(10.0);

        pdf.line(Font::Bold, 12.0, "Subject Completion Analysis");
        let mut current_category: Option<&str> = None;
        for subject in &student.subjects {
            if current_category != Some(subject.category.as_str()) {
                current_category = Some(subject.category.as_str());
                pdf.line(Font::Bold, 11.0, &format!("{}:", subject.category));
                pdf.row(
                    Font::Bold,
                    9.0,
                    &[
                        "Subject".to_string(),
                        "Completed Days".to_string(),
                        "Total Days".to_string(),
                        "Completion Rate".to_string(),
                    ],
                    &subject_widths,
                );
            }
            pdf.row(
                Font::Regular,
                9.0,
                &[
                    subject.subject.clone(),
                    subject.completion.hits.to_string(),
                    subject.completion.total.to_string(),
                    percent(subject.completion.rate()),
                ],
                &subject_widths,
            );
        }
        pdf.gap(10.0);

        pdf.line(Font::Bold, 12.0, "Academic Progress Milestones");
        if student.progress.is_empty() {
            pdf.line(Font::Regular, 10.0, "No milestone assessments completed yet");
        } else {
            let widths = [72.0, 144.0, 108.0];
            pdf.row(
                Font::Bold,
                9.0,
                &["Milestone".to_string(), "Subject".to_string(), "Rating".to_string()],
                &widths,
            );
            for entry in &student.progress {
                pdf.row(
                    Font::Regular,
                    9.0,
                    &[
                        entry.milestone.to_string(),
                        entry.subject.clone(),
                        entry.rating.clone(),
                    ],
                    &widths,
                );
            }
            for tiers in &student.tiers {
                pdf.line(
                    Font::Regular,
                    9.0,
                    &format!(
                        "{}: {} Satisfactory, {} Needs Improvement, {} Unsatisfactory",
                        tiers.milestone,
                        tiers.satisfactory,
                        tiers.needs_improvement,
                        tiers.unsatisfactory
                    ),
                );
            }
        }
        pdf.gap(20.0);
    }

    pdf.line(Font::Bold, 14.0, "Overall Program Analysis");
    pdf.line(Font::Bold, 12.0, "Subject Category Performance");
    let recorded: Vec<&CategorySummary> = model
        .categories
        .iter()
        .filter(|c| c.completion.total > 0)
        .collect();
    if recorded.is_empty() {
        pdf.line(Font::Regular, 10.0, "No assignments recorded in this range");
    } else {
        let widths = [144.0, 108.0, 72.0, 90.0];
        pdf.row(
            Font::Bold,
            9.0,
            &[
                "Category".to_string(),
                "Total Assignments".to_string(),
                "Completed".to_string(),
                "Completion Rate".to_string(),
            ],
            &widths,
        );
        for category in recorded {
            pdf.row(
                Font::Regular,
                9.0,
                &[
                    category.category.clone(),
                    category.completion.total.to_string(),
                    category.completion.hits.to_string(),
                    percent(category.completion.rate()),
                ],
                &widths,
            );
        }
    }
    pdf.gap(20.0);

    pdf.line(
        Font::Italic,
        9.0,
        "This report contains comprehensive homeschool documentation for regulatory \
         compliance and academic record-keeping.",
    );

    Ok(pdf.finish())
}
