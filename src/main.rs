use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod calendar;
mod catalog;
mod config;
mod error;
mod facade;
mod models;
mod pdf;
mod report;
mod store;
mod transfer;

use config::AppConfig;
use facade::{Connectivity, PersistenceFacade};
use models::{DateRange, ListFilter, Milestone, Rating, Record, RecordKind};
use report::ReportGenerator;
use store::{LocalStore, PgStore};

type Facade = PersistenceFacade<PgStore, LocalStore>;

#[derive(Parser)]
#[command(name = "academy-tracker")]
#[command(about = "Homeschool attendance, assignment and progress records", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "academy.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Csv,
    Pdf,
}

impl ReportFormat {
    fn extension(self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Pdf => "pdf",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the hosted database schema
    InitDb,
    /// Record attendance for one student
    Attendance {
        #[arg(long)]
        student: String,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        absent: bool,
    },
    /// Record an assignment for one subject
    Assignment {
        #[arg(long)]
        student: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        incomplete: bool,
    },
    /// Record a 90- or 180-day progress rating
    Progress {
        #[arg(long, value_enum)]
        milestone: Milestone,
        #[arg(long)]
        student: String,
        #[arg(long)]
        subject: String,
        #[arg(long, value_enum)]
        rating: Rating,
    },
    /// Rename a custom "Other" subject, carrying its history over
    RenameSubject {
        #[arg(long)]
        student: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// List stored records
    List {
        #[arg(long, value_enum)]
        kind: RecordKind,
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Show school-year progress, due milestones and connectivity
    Status {
        /// Defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Write a CSV or PDF summary report
    Report {
        #[arg(long, value_enum, default_value_t = ReportFormat::Pdf)]
        format: ReportFormat,
        /// Repeat to select several students; defaults to everyone
        #[arg(long = "student")]
        students: Vec<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write the daily and progress tracking sheets as CSV
        #[arg(long)]
        detail: bool,
    },
    /// Export every record as a JSON backup
    Backup {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import attendance from a CSV file with date,student,present columns
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
}

async fn open_facade(config: &AppConfig) -> anyhow::Result<Facade> {
    let remote = match config.database_url() {
        Some(url) => match PgStore::connect_lazy(
            &url,
            config.remote.max_connections,
            config.remote_timeout(),
        ) {
            Ok(store) => Some(store),
            Err(err) => {
                warn!(error = %err, "unusable database URL, running offline");
                None
            }
        },
        None => {
            info!("no database configured, running offline");
            None
        }
    };
    let local = LocalStore::new(config.storage.local_path.clone());
    let calendar = config.calendar()?;
    Ok(PersistenceFacade::connect(remote, local, config.catalog(), calendar).await)
}

fn offline_notice(facade: &Facade) {
    let label = match facade.connectivity() {
        Connectivity::Healthy => return,
        Connectivity::Degraded => "hosted store unreachable",
        Connectivity::Offline => "no hosted store configured",
    };
    println!(
        "Offline mode ({label}): working from {}.",
        facade.local().path().display()
    );
}

/// `reports/summary.pdf` + `daily` gives `reports/summary_daily.csv`.
fn detail_path(out: &Path, sheet: &str) -> PathBuf {
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "academy_report".to_string());
    out.with_file_name(format!("{stem}_{sheet}.csv"))
}

fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn weekend_note(facade: &Facade, date: NaiveDate) {
    if !facade.calendar().is_school_day(date) {
        println!("Note: {date} is not a school day.");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let today = Local::now().date_naive();

    if let Commands::InitDb = cli.command {
        let url = config
            .database_url()
            .context("DATABASE_URL must be set to a production Postgres instance")?;
        let store = PgStore::connect_lazy(
            &url,
            config.remote.max_connections,
            config.remote_timeout(),
        )?;
        store.init_db().await.context("failed to migrate Postgres")?;
        println!("Schema ready.");
        return Ok(());
    }

    let mut facade = open_facade(&config).await?;

    match cli.command {
        Commands::InitDb => {}
        Commands::Attendance {
            student,
            date,
            absent,
        } => {
            let date = date.unwrap_or(today);
            facade
                .upsert(Record::attendance(date, &student, !absent))
                .await?;
            println!(
                "Attendance saved: {student} {} on {date}.",
                if absent { "absent" } else { "present" }
            );
            weekend_note(&facade, date);
        }
        Commands::Assignment {
            student,
            category,
            subject,
            date,
            incomplete,
        } => {
            let date = date.unwrap_or(today);
            facade
                .upsert(Record::assignment(
                    date,
                    &student,
                    &category,
                    &subject,
                    !incomplete,
                ))
                .await?;
            println!("{subject} saved for {student} on {date}.");
            weekend_note(&facade, date);
        }
        Commands::Progress {
            milestone,
            student,
            subject,
            rating,
        } => {
            facade
                .upsert(Record::progress(milestone, &student, &subject, rating))
                .await?;
            println!("{milestone} {subject} saved for {student}: {rating}.");
        }
        Commands::RenameSubject { student, from, to } => {
            let moved = facade.rename_subject(&student, &from, &to).await?;
            println!("Renamed {moved} {from:?} records to {to:?} for {student}.");
        }
        Commands::List {
            kind,
            student,
            category,
            subject,
            from,
            to,
        } => {
            let filter = ListFilter {
                student,
                category,
                subject,
                from,
                to,
            };
            let records = facade.list(kind, &filter).await?;
            if records.is_empty() {
                println!("No {kind} records found.");
            }
            for record in records {
                println!(
                    "- {record} (updated {})",
                    record.updated_at().format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Status { as_of } => {
            let as_of = as_of.unwrap_or(today);
            let data = facade.snapshot().await?;
            let calendar = facade.calendar();

            println!(
                "School year: {} to {}",
                calendar.start().format("%B %d, %Y"),
                calendar.end().format("%B %d, %Y")
            );
            println!(
                "Days completed: {}/{}",
                calendar.school_days_elapsed(as_of),
                calendar.total_school_days()
            );
            for milestone in Milestone::ALL {
                if let Some(date) = calendar.milestone_date(milestone) {
                    println!("{milestone} milestone: {}", date.format("%m/%d/%Y"));
                }
            }
            for name in facade.catalog().student_names() {
                let certified = data.certified_milestones(&name);
                if let Some(due) = calendar.due_milestone(as_of, &certified) {
                    println!("{name}: {due} progress assessment due");
                }
            }
            println!(
                "Records: {} attendance, {} assignments, {} 90-day, {} 180-day",
                data.attendance.len(),
                data.assignments.len(),
                data.progress_90.len(),
                data.progress_180.len()
            );
        }
        Commands::Report {
            format,
            students,
            from,
            to,
            out,
            detail,
        } => {
            let data = facade.snapshot().await?;
            let calendar = facade.calendar();
            let range = DateRange::new(
                from.unwrap_or(calendar.start()),
                to.unwrap_or(calendar.end()),
            );
            let students = if students.is_empty() {
                facade.catalog().student_names()
            } else {
                students
            };

            let generator = ReportGenerator::new(facade.catalog(), calendar);
            let model = generator.build_summary(&data, &students, range);
            let bytes = match format {
                ReportFormat::Csv => report::render_csv(&model)?,
                ReportFormat::Pdf => report::render_pdf(&model)?,
            };

            let out = out.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "academy_report_{}.{}",
                    today.format("%Y%m%d"),
                    format.extension()
                ))
            });
            write_output(&out, &bytes)?;
            println!("Report written to {}.", out.display());

            if detail {
                let daily = detail_path(&out, "daily");
                write_output(&daily, &report::render_daily_csv(&model)?)?;
                let progress = detail_path(&out, "progress");
                write_output(&progress, &report::render_progress_csv(&model)?)?;
                println!(
                    "Tracking sheets written to {} and {}.",
                    daily.display(),
                    progress.display()
                );
            }
        }
        Commands::Backup { out } => {
            let data = facade.snapshot().await?;
            let json = transfer::backup_json(facade.calendar(), &data)?;
            let out = out.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "academy_backup_{}.json",
                    Local::now().format("%Y%m%d_%H%M")
                ))
            });
            write_output(&out, json.as_bytes())?;
            println!("Backup of {} records written to {}.", data.len(), out.display());
        }
        Commands::Import { csv } => {
            let imported = transfer::import_attendance_csv(&mut facade, &csv).await?;
            println!("Imported {imported} attendance rows from {}.", csv.display());
        }
    }

    offline_notice(&facade);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_attendance_defaults() {
        let cli = Cli::parse_from(["academy-tracker", "attendance", "--student", "Lucy"]);
        assert_eq!(cli.config, PathBuf::from("academy.toml"));
        match cli.command {
            Commands::Attendance {
                student,
                date,
                absent,
            } => {
                assert_eq!(student, "Lucy");
                assert!(date.is_none());
                assert!(!absent);
            }
            _ => panic!("expected Attendance command"),
        }
    }

    #[test]
    fn parse_progress_values() {
        let cli = Cli::parse_from([
            "academy-tracker",
            "--config",
            "/etc/academy.toml",
            "progress",
            "--milestone",
            "180",
            "--student",
            "Vann",
            "--subject",
            "Math",
            "--rating",
            "needs-improvement",
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/academy.toml"));
        match cli.command {
            Commands::Progress {
                milestone, rating, ..
            } => {
                assert_eq!(milestone, Milestone::Day180);
                assert_eq!(rating, Rating::NeedsImprovement);
            }
            _ => panic!("expected Progress command"),
        }
    }

    #[test]
    fn parse_list_with_dates() {
        let cli = Cli::parse_from([
            "academy-tracker",
            "list",
            "--kind",
            "progress-90",
            "--from",
            "2025-09-01",
        ]);
        match cli.command {
            Commands::List { kind, from, to, .. } => {
                assert_eq!(kind, RecordKind::Progress90);
                assert_eq!(from, NaiveDate::from_ymd_opt(2025, 9, 1));
                assert!(to.is_none());
            }
            _ => panic!("expected List command"),
        }
    }

    #[test]
    fn parse_report_students() {
        let cli = Cli::parse_from([
            "academy-tracker",
            "report",
            "--format",
            "csv",
            "--student",
            "Lucy",
            "--student",
            "Vann",
        ]);
        match cli.command {
            Commands::Report {
                format, students, ..
            } => {
                assert_eq!(format, ReportFormat::Csv);
                assert_eq!(students, vec!["Lucy", "Vann"]);
            }
            _ => panic!("expected Report command"),
        }
    }

    #[test]
    fn report_defaults_to_pdf() {
        let cli = Cli::parse_from(["academy-tracker", "report"]);
        match cli.command {
            Commands::Report {
                format,
                out,
                detail,
                ..
            } => {
                assert_eq!(format, ReportFormat::Pdf);
                assert!(out.is_none());
                assert!(!detail);
            }
            _ => panic!("expected Report command"),
        }
    }

    #[test]
    fn detail_sheets_sit_next_to_report() {
        let cli = Cli::parse_from([
            "academy-tracker",
            "report",
            "--format",
            "csv",
            "--detail",
            "--out",
            "reports/fall.csv",
        ]);
        let Commands::Report { detail, out, .. } = cli.command else {
            panic!("expected Report command");
        };
        assert!(detail);
        let out = out.unwrap();
        assert_eq!(
            detail_path(&out, "daily"),
            PathBuf::from("reports/fall_daily.csv")
        );
        assert_eq!(
            detail_path(Path::new("summary.pdf"), "progress"),
            PathBuf::from("summary_progress.csv")
        );
    }

    #[test]
    fn rejects_bad_date() {
        let result = Cli::try_parse_from([
            "academy-tracker",
            "attendance",
            "--student",
            "Lucy",
            "--date",
            "09/01/2025",
        ]);
        assert!(result.is_err());
    }
}
