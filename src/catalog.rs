//! The student roster: who is enrolled, which categories and subjects each
//! student takes, and which subjects get milestone progress ratings.

use serde::{Deserialize, Serialize};

use crate::error::PersistError;
use crate::models::{Record, OTHER_CATEGORY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub name: String,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl Student {
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentCatalog {
    students: Vec<Student>,
    progress_subjects: Vec<String>,
}

impl StudentCatalog {
    pub fn new(students: Vec<Student>, progress_subjects: Vec<String>) -> Self {
        Self {
            students,
            progress_subjects,
        }
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn student(&self, name: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.name == name)
    }

    pub fn student_names(&self) -> Vec<String> {
        self.students.iter().map(|s| s.name.clone()).collect()
    }

    pub fn progress_subjects(&self) -> &[String] {
        &self.progress_subjects
    }

    fn require_student(&self, name: &str) -> Result<&Student, PersistError> {
        self.student(name)
            .ok_or_else(|| PersistError::Validation(format!("unknown student {name:?}")))
    }

    /// Checks a record's key against the roster.
    pub fn validate(&self, record: &Record) -> Result<(), PersistError> {
        match record {
            Record::Attendance(r) => {
                self.require_student(&r.student)?;
            }
            Record::Assignment(r) => {
                let student = self.require_student(&r.student)?;
                if r.category == OTHER_CATEGORY {
                    if r.subject.trim().is_empty() {
                        return Err(PersistError::Validation(
                            "custom subject name must not be empty".into(),
                        ));
                    }
                    return Ok(());
                }
                let category = student.category(&r.category).ok_or_else(|| {
                    PersistError::Validation(format!(
                        "{} has no category {:?}",
                        r.student, r.category
                    ))
                })?;
                if !category.subjects.iter().any(|s| *s == r.subject) {
                    return Err(PersistError::Validation(format!(
                        "{:?} is not a {} subject for {}",
                        r.subject, r.category, r.student
                    )));
                }
            }
            Record::Progress(milestone, r) => {
                self.require_student(&r.student)?;
                if !self.progress_subjects.iter().any(|s| *s == r.subject) {
                    return Err(PersistError::Validation(format!(
                        "{:?} is not assessed at the {milestone} milestone",
                        r.subject
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validates the inputs of an "Other" subject rename.
    pub fn validate_rename(&self, student: &str, from: &str, to: &str) -> Result<(), PersistError> {
        self.require_student(student)?;
        let (from, to) = (from.trim(), to.trim());
        if from.is_empty() || to.is_empty() {
            return Err(PersistError::Validation(
                "custom subject name must not be empty".into(),
            ));
        }
        if from == to {
            return Err(PersistError::Validation(format!(
                "subject is already named {to:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Milestone, Rating};
    use chrono::NaiveDate;

    fn catalog() -> StudentCatalog {
        StudentCatalog::new(
            vec![Student {
                name: "Lucy".into(),
                categories: vec![Category {
                    name: "Velos Coop".into(),
                    subjects: vec!["Drama".into(), "Archery".into(), "Dance".into()],
                }],
            }],
            vec!["Reading".into(), "Math".into()],
        )
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
    }

    #[test]
    fn accepts_declared_subject() {
        let record = Record::assignment(date(), "Lucy", "Velos Coop", "Dance", true);
        assert!(catalog().validate(&record).is_ok());
    }

    #[test]
    fn rejects_undeclared_subject() {
        let record = Record::assignment(date(), "Lucy", "Velos Coop", "Woodworking", true);
        let err = catalog().validate(&record).unwrap_err();
        assert!(matches!(err, PersistError::Validation(_)));
    }

    #[test]
    fn other_category_allows_any_subject() {
        let record = Record::assignment(date(), "Lucy", OTHER_CATEGORY, "Piano", false);
        assert!(catalog().validate(&record).is_ok());

        let blank = Record::assignment(date(), "Lucy", OTHER_CATEGORY, "  ", false);
        assert!(catalog().validate(&blank).is_err());
    }

    #[test]
    fn rejects_unknown_student() {
        let record = Record::attendance(date(), "Max", true);
        assert!(catalog().validate(&record).is_err());
    }

    #[test]
    fn progress_subject_must_be_assessed() {
        let ok = Record::progress(Milestone::Day90, "Lucy", "Math", Rating::Satisfactory);
        let bad = Record::progress(Milestone::Day90, "Lucy", "Drama", Rating::Satisfactory);
        assert!(catalog().validate(&ok).is_ok());
        assert!(catalog().validate(&bad).is_err());
    }

    #[test]
    fn rename_requires_a_new_name() {
        let catalog = catalog();
        assert!(catalog.validate_rename("Lucy", "Piano", "Violin").is_ok());
        assert!(catalog.validate_rename("Lucy", "Piano", "Piano").is_err());
        assert!(catalog.validate_rename("Lucy", "Piano", "").is_err());
        assert!(catalog.validate_rename("Max", "Piano", "Violin").is_err());
        assert!(catalog.validate_rename("Lucy", "Piano ", "Piano").is_err());
        assert!(catalog.validate_rename("Lucy", " ", "Piano").is_err());
    }
}
