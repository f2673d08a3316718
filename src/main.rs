use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc, Weekday};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

mod analytics;
mod attendance;
mod category;
mod config;
mod db;
mod error;
mod level;
mod logging;
mod models;
mod rank;
mod report;
mod scores;
mod store;

use analytics::AnalyticsEngine;
use attendance::DateWindow;
use category::AttendanceCategory;
use config::{EngineConfig, DEFAULT_FREQUENT_REST_DAY_THRESHOLD};
use db::PgStore;
use error::parse_id;
use scores::ScoreKind;
use store::StudentRecords;

#[derive(Parser)]
#[command(name = "school-analytics")]
#[command(
    about = "Attendance, level and class-rank analytics for school records",
    long_about = None
)]
struct Cli {
    /// Date treated as "today" (YYYY-MM-DD); defaults to the current UTC date
    #[arg(long, global = true)]
    today: Option<NaiveDate>,
    /// Weekly rest day whose absences are tracked separately
    #[arg(long, global = true, env = "ANALYTICS_REST_DAY", default_value = "fri")]
    rest_day: Weekday,
    /// Rest-day absences at or above this count are frequent
    #[arg(
        long,
        global = true,
        env = "ANALYTICS_REST_DAY_THRESHOLD",
        default_value_t = DEFAULT_FREQUENT_REST_DAY_THRESHOLD
    )]
    rest_day_threshold: u32,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WindowArgs {
    /// First day of the attendance window; defaults to the semester start
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last day of the attendance window; defaults to today
    #[arg(long)]
    end: Option<NaiveDate>,
}

impl WindowArgs {
    fn resolve(&self, today: NaiveDate) -> DateWindow {
        DateWindow::resolve(self.start, self.end, today)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import students, attendance or grades from CSV files
    Import {
        #[arg(long)]
        students: Option<PathBuf>,
        #[arg(long)]
        attendance: Option<PathBuf>,
        #[arg(long)]
        grades: Option<PathBuf>,
    },
    /// Attendance statistics and category for one student
    Attendance {
        #[arg(long)]
        student: String,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        json: bool,
    },
    /// Compute a student's level and refresh the stored one
    Level {
        #[arg(long)]
        student: String,
        /// Print the level without writing it back
        #[arg(long)]
        dry_run: bool,
    },
    /// Rank of a student inside a class
    Rank {
        #[arg(long)]
        student: String,
        /// Class to rank within; defaults to the student's own class
        #[arg(long)]
        class: Option<String>,
    },
    /// Full analytics profile of one student
    Profile {
        #[arg(long)]
        student: String,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        json: bool,
    },
    /// Students of a class in a given attendance category
    Flagged {
        #[arg(long)]
        class: String,
        /// Category label or key, e.g. `frequent_rest_day_absence`
        #[arg(long)]
        category: AttendanceCategory,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Record a single score on a grade row
    RecordGrade {
        #[arg(long)]
        student: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        semester: i32,
        #[arg(long)]
        year: String,
        #[arg(long, value_enum)]
        kind: ScoreKind,
        #[arg(long)]
        score: f64,
    },
    /// Generate a markdown report for a class
    Report {
        #[arg(long)]
        class: String,
        /// Heading used for the class; defaults to its id
        #[arg(long)]
        label: Option<String>,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let today = cli.today.unwrap_or_else(|| Utc::now().date_naive());
    let config = EngineConfig::new(cli.rest_day, cli.rest_day_threshold);

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let engine = AnalyticsEngine::new(PgStore::new(pool.clone()), config);

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted (class {}).", db::SEED_CLASS_ID);
        }
        Commands::Import {
            students,
            attendance,
            grades,
        } => {
            let mut summary = db::ImportSummary::default();
            if let Some(path) = &students {
                summary.students = db::import_students(&pool, path)
                    .await
                    .with_context(|| format!("failed to import {}", path.display()))?;
            }
            if let Some(path) = &attendance {
                db::import_attendance(&pool, path, &mut summary)
                    .await
                    .with_context(|| format!("failed to import {}", path.display()))?;
            }
            if let Some(path) = &grades {
                db::import_grades(&pool, path, &mut summary)
                    .await
                    .with_context(|| format!("failed to import {}", path.display()))?;
            }
            println!(
                "Imported {} students, {} attendance records, {} grade rows ({} skipped).",
                summary.students, summary.attendance, summary.grades, summary.skipped
            );
        }
        Commands::Attendance {
            student,
            window,
            json,
        } => {
            let student_id = parse_id("student", &student)?;
            let window = window.resolve(today);
            let summary = engine.attendance_summary(student_id, window).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            let stats = &summary.statistics;
            println!("Attendance {} to {}:", window.start, window.end);
            println!(
                "- {} days: {} present, {} absent, {} late, {} excused",
                stats.total_days,
                stats.present_days,
                stats.absent_days,
                stats.late_days,
                stats.excused_days
            );
            println!(
                "- rest-day absences {}, longest absence run {}, rate {:.2}%",
                stats.friday_absences, stats.consecutive_absences, stats.attendance_rate
            );
            println!("- category: {} [{}]", summary.category, summary.severity);
        }
        Commands::Level { student, dry_run } => {
            let student_id = parse_id("student", &student)?;
            let cached_level = engine
                .store()
                .fetch_student(student_id)
                .await?
                .map(|record| record.level);
            let level = engine.student_level(student_id).await?;

            println!("Level: {level}");
            match cached_level {
                Some(cached) if cached != level => {
                    if dry_run {
                        println!("Stored level {cached} is stale (dry run, not updated).");
                    } else if engine.write_back_level(student_id, cached_level, level).await? {
                        println!("Stored level updated from {cached}.");
                    }
                }
                Some(_) => println!("Stored level is current."),
                None => println!("Student is not on record; nothing stored."),
            }
        }
        Commands::Rank { student, class } => {
            let student_id = parse_id("student", &student)?;
            let class_id = match class.as_deref() {
                Some(raw) => Some(parse_id("class", raw)?),
                None => engine
                    .store()
                    .fetch_student(student_id)
                    .await?
                    .and_then(|record| record.class_id),
            };

            let rank = engine.class_rank(student_id, class_id).await?;
            if rank == 0 {
                println!("No class rank for this student.");
            } else {
                println!("Class rank: {rank}");
            }
        }
        Commands::Profile {
            student,
            window,
            json,
        } => {
            let student_id = parse_id("student", &student)?;
            let profile = engine.student_profile(student_id, window.resolve(today)).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
                return Ok(());
            }

            println!(
                "{} ({})",
                profile.full_name.as_deref().unwrap_or("unknown student"),
                profile.category.as_str()
            );
            let stored = match profile.cached_level {
                Some(cached) if profile.level_is_stale() => format!("stored {cached}, stale"),
                Some(_) => "stored".to_string(),
                None => "not on record".to_string(),
            };
            println!("- level {} ({stored})", profile.level);
            println!(
                "- class rank {}, average {:.2} ({})",
                profile.class_rank, profile.academic_average, profile.academic_status
            );
            println!(
                "- attendance {:.2}%: {} [{}]",
                profile.attendance.statistics.attendance_rate,
                profile.attendance.category,
                profile.attendance.severity
            );
        }
        Commands::Flagged {
            class,
            category,
            window,
        } => {
            let class_id = parse_id("class", &class)?;
            let window = window.resolve(today);
            let roster = engine.store().fetch_class_roster(class_id).await?;
            let matches = engine.students_by_category(category, &roster, window).await?;

            if matches.is_empty() {
                println!("No students in \"{category}\" for this window.");
                return Ok(());
            }

            println!("Students in \"{}\" [{}]:", category, category.severity());
            for summary in &matches {
                let stats = &summary.statistics;
                let frequent = engine
                    .has_frequent_rest_day_absences(summary.student_id, window, None)
                    .await?;
                println!(
                    "- {}: {} absent, {} late, {} on rest day{}",
                    summary.student_id,
                    stats.absent_days,
                    stats.late_days,
                    stats.friday_absences,
                    if frequent { " (frequent)" } else { "" }
                );
            }
        }
        Commands::RecordGrade {
            student,
            subject,
            semester,
            year,
            kind,
            score,
        } => {
            let entry = db::GradeEntry {
                student_id: parse_id("student", &student)?,
                subject_id: parse_id("subject", &subject)?,
                semester,
                academic_year: year,
                kind,
                score,
            };
            db::record_grade(&pool, &entry).await?;
            println!("Recorded {} = {} for {}.", kind.column(), score, entry.student_id);
        }
        Commands::Report {
            class,
            label,
            window,
            out,
        } => {
            let class_id = parse_id("class", &class)?;
            let window = window.resolve(today);
            let profiles = engine.class_profiles(class_id, window).await?;
            let label = label.unwrap_or_else(|| class_id.to_string());
            let report = report::build_report(&label, window, &profiles);
            std::fs::write(&out, report)?;
            info!(class_id = %class_id, students = profiles.len(), "class report built");
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
