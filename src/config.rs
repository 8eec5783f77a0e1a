//! TOML configuration: school year, roster, and where records are stored.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::SchoolCalendar;
use crate::catalog::{Category, Student, StudentCatalog};
use crate::error::ConfigError;
use crate::models::OTHER_CATEGORY;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub school_year: SchoolYearConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default = "default_progress_subjects")]
    pub progress_subjects: Vec<String>,
    #[serde(default = "default_students")]
    pub students: Vec<Student>,
}

/// Dates are written as quoted `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolYearConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for SchoolYearConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2025, 7, 21).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2026, 5, 31).unwrap_or(NaiveDate::MIN),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_local_path")]
    pub local_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_path: default_local_path(),
        }
    }
}

fn default_local_path() -> PathBuf {
    PathBuf::from("academy_data.json")
}

/// Hosted Postgres settings. `DATABASE_URL` takes precedence over `database_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            timeout_secs: default_timeout_secs(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_max_connections() -> u32 {
    5
}

fn default_progress_subjects() -> Vec<String> {
    ["Reading", "Writing", "Math", "Science", "Social Studies"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn category(name: &str, subjects: &[&str]) -> Category {
    Category {
        name: name.to_string(),
        subjects: subjects.iter().map(|s| s.to_string()).collect(),
    }
}

fn default_students() -> Vec<Student> {
    let academy = [
        "PE",
        "Math",
        "Reading",
        "Cursive",
        "Typing",
        "News review",
        "Logic",
    ];
    let mut killian_academy = academy.to_vec();
    killian_academy.insert(5, "History");

    vec![
        Student {
            name: "Killian".into(),
            categories: vec![
                category("Three Oaks Academy", &killian_academy),
                category(
                    "UHC Coop",
                    &["Ecology", "Lego Stem", "Literature Discussion", "IEW"],
                ),
                category("Velos Coop", &["Drama", "Archery", "Woodworking"]),
            ],
        },
        Student {
            name: "Lucy".into(),
            categories: vec![
                category("Three Oaks Academy", &academy),
                category("UHC Coop", &["Science", "IEW", "Art", "History"]),
                category("Velos Coop", &["Drama", "Archery", "Dance"]),
            ],
        },
        Student {
            name: "Vann".into(),
            categories: vec![
                category("Three Oaks Academy", &academy),
                category("UHC Coop", &["Science", "IEW", "Art", "History"]),
                category("Velos Coop", &["Drama", "Archery"]),
            ],
        },
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            school_year: SchoolYearConfig::default(),
            storage: StorageConfig::default(),
            remote: RemoteConfig::default(),
            progress_subjects: default_progress_subjects(),
            students: default_students(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise falls back to the built-in roster.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load(path);
        }
        tracing::info!(path = %path.display(), "config file not found, using built-in roster");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        SchoolCalendar::new(self.school_year.start, self.school_year.end)?;

        if self.students.is_empty() {
            return Err(ConfigError::Invalid("at least one student is required".into()));
        }
        if self.progress_subjects.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one progress subject is required".into(),
            ));
        }
        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::Invalid("remote.timeout_secs must be positive".into()));
        }

        let mut names = HashSet::new();
        for student in &self.students {
            if student.name.trim().is_empty() {
                return Err(ConfigError::Invalid("student name must not be empty".into()));
            }
            if !names.insert(student.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate student {:?}",
                    student.name
                )));
            }

            let mut categories = HashSet::new();
            for category in &student.categories {
                if !categories.insert(category.name.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate category {:?} for {}",
                        category.name, student.name
                    )));
                }
                if category.name != OTHER_CATEGORY && category.subjects.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "category {:?} for {} has no subjects",
                        category.name, student.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn calendar(&self) -> Result<SchoolCalendar, ConfigError> {
        SchoolCalendar::new(self.school_year.start, self.school_year.end)
    }

    pub fn catalog(&self) -> StudentCatalog {
        StudentCatalog::new(self.students.clone(), self.progress_subjects.clone())
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    /// Connection string for the hosted store; `None` means offline for the
    /// whole process.
    pub fn database_url(&self) -> Option<String> {
        std::env::var("DATABASE_URL")
            .ok()
            .or_else(|| self.remote.database_url.clone())
            .filter(|url| !url.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.students.len(), 3);
        assert_eq!(config.catalog().student_names(), vec!["Killian", "Lucy", "Vann"]);
    }

    #[test]
    fn default_roster_keeps_declared_order() {
        let config = AppConfig::default();
        let killian = &config.students[0];
        let academy = killian.category("Three Oaks Academy").unwrap();
        assert_eq!(academy.subjects[4], "Typing");
        assert_eq!(academy.subjects[5], "History");
        assert_eq!(academy.subjects.last().map(String::as_str), Some("Logic"));
    }

    #[test]
    fn parses_minimal_toml() {
        let toml_str = r#"
progress_subjects = ["Math"]

[school_year]
start = "2025-08-18"
end = "2026-05-22"

[storage]
local_path = "/tmp/records.json"

[remote]
timeout_secs = 2

[[students]]
name = "Ada"

[[students.categories]]
name = "Home"
subjects = ["Math", "Reading"]
"#;
        let config = AppConfig::from_toml(toml_str).unwrap();
        assert_eq!(
            config.school_year.start,
            NaiveDate::from_ymd_opt(2025, 8, 18).unwrap()
        );
        assert_eq!(config.storage.local_path, PathBuf::from("/tmp/records.json"));
        assert_eq!(config.remote.timeout_secs, 2);
        assert_eq!(config.remote.max_connections, 5);
        assert_eq!(config.students.len(), 1);
        assert_eq!(config.students[0].categories[0].subjects, vec!["Math", "Reading"]);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.students.len(), 3);
        assert_eq!(config.progress_subjects.len(), 5);
        assert_eq!(config.storage.local_path, PathBuf::from("academy_data.json"));
    }

    #[test]
    fn rejects_reversed_school_year() {
        let err = AppConfig::from_toml(
            "[school_year]\nstart = \"2026-05-31\"\nend = \"2025-07-21\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_duplicate_students() {
        let mut config = AppConfig::default();
        config.students.push(config.students[0].clone());
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_category() {
        let mut config = AppConfig::default();
        config.students[0].categories.push(Category {
            name: "Music".into(),
            subjects: Vec::new(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = AppConfig::from_toml("students = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_or_default(Path::new("/nonexistent/academy.toml")).unwrap();
        assert_eq!(config.students.len(), 3);
    }
}
