use bookshelf_migrate::config::MigrationConfig;
use bookshelf_migrate::merge::{book_authors, book_topics, paper_authors, papers};
use bookshelf_migrate::report;
use bookshelf_migrate::validate::{IntegrityValidator, ValidationReport};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "migrate")]
#[command(about = "Merge two bookshelf database exports into one canonical database")]
#[command(version)]
struct Args {
    /// Path to the migration config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every merge step in dependency order, then validate
    Run,
    /// Merge Authors and enrich BookAuthors links
    BookAuthors,
    /// Merge Topic and enrich BookTopic links
    BookTopics,
    /// Merge PAuthors and enrich PapersAuthors links
    PaperAuthors,
    /// Merge Papers and aggregate author id arrays (needs paper-authors first)
    Papers,
    /// Validate migration outputs against the raw sources
    Check {
        /// Which entity family to validate
        #[arg(value_enum, default_value_t = CheckFamily::All)]
        family: CheckFamily,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CheckFamily {
    All,
    BookAuthors,
    BookTopics,
    PaperAuthors,
    Papers,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = MigrationConfig::load(&args.config)?;
    info!("Loaded config from {}", args.config.display());

    match args.command {
        Commands::Run => run_all(&config),
        Commands::BookAuthors => {
            book_authors::run(&config)?;
            Ok(())
        }
        Commands::BookTopics => {
            book_topics::run(&config)?;
            Ok(())
        }
        Commands::PaperAuthors => {
            paper_authors::run(&config)?;
            Ok(())
        }
        Commands::Papers => {
            papers::run(&config)?;
            Ok(())
        }
        Commands::Check { family } => check(&config, family),
    }
}

fn run_all(config: &MigrationConfig) -> Result<()> {
    book_authors::run(config)?;
    book_topics::run(config)?;
    paper_authors::run(config)?;
    papers::run(config)?;

    let validator = IntegrityValidator::new(config);
    finish(validator.validate_all()?)
}

fn check(config: &MigrationConfig, family: CheckFamily) -> Result<()> {
    let validator = IntegrityValidator::new(config);
    let mut report = ValidationReport::default();
    match family {
        CheckFamily::All => report = validator.validate_all()?,
        CheckFamily::BookAuthors => report.families.push(validator.validate_book_authors()?),
        CheckFamily::BookTopics => report.families.push(validator.validate_book_topics()?),
        CheckFamily::PaperAuthors => report.families.push(validator.validate_paper_authors()?),
        CheckFamily::Papers => report.families.push(validator.validate_papers()?),
    }
    finish(report)
}

fn finish(validation: ValidationReport) -> Result<()> {
    let (passed, failed) = validation.counts();
    report::summary(passed, failed);
    if validation.passed() {
        report::pass("ALL CHECKS PASSED");
        Ok(())
    } else {
        report::fail("VALIDATION FAILED");
        std::process::exit(1);
    }
}
