use std::fmt;
use std::str::FromStr;

use lesson_core::model::{BankId, LessonNumber};
use serde_json::json;
use services::{AppServices, Clock, ServiceConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArg { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { name: &'static str, raw: String },
    InvalidBankId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArg { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidNumber { name, raw } => write!(f, "invalid <{name}> value: {raw}"),
            ArgsError::InvalidBankId { raw } => write!(f, "invalid bank id: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn require_arg(
    args: &mut impl Iterator<Item = String>,
    name: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingArg { name })
}

fn parse_number<T: FromStr>(raw: String, name: &'static str) -> Result<T, ArgsError> {
    raw.parse()
        .map_err(|_| ArgsError::InvalidNumber { name, raw })
}

fn parse_bank_id(raw: String) -> Result<BankId, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidBankId { raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--db <sqlite_url>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  generate <document_id> [--text-file <path>]");
    eprintln!("  diagnostic <bank_id>");
    eprintln!("  lesson <bank_id> <lesson_number>");
    eprintln!("  attempt <bank_id> <lesson_number> <question_index> <tries> <correct_tries>");
    eprintln!("  finalize <bank_id>");
    eprintln!("  progress <bank_id>");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:lessons.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LESSONS_DB_URL, LESSONS_WORDS_PER_PART, LESSONS_TEXT_SOURCE_URL");
    eprintln!("  LESSONS_{{PRIMARY,SECONDARY}}_{{API_KEY,BASE_URL,MODEL}}, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Generate {
        document_id: String,
        text_file: Option<String>,
    },
    Diagnostic {
        bank_id: BankId,
    },
    Lesson {
        bank_id: BankId,
        number: LessonNumber,
    },
    Attempt {
        bank_id: BankId,
        number: LessonNumber,
        index: usize,
        tries: u32,
        correct_tries: u32,
    },
    Finalize {
        bank_id: BankId,
    },
    Progress {
        bank_id: BankId,
    },
}

struct Args {
    db_url: Option<String>,
    command: Command,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let mut args = args.into_iter();
        let mut db_url = None;

        let name = loop {
            let Some(arg) = args.next() else {
                return Ok(None);
            };
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = Some(value);
                }
                "--help" | "-h" => return Ok(None),
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => break arg,
            }
        };

        let command = match name.as_str() {
            "generate" => Self::parse_generate(&mut args)?,
            "diagnostic" => Command::Diagnostic {
                bank_id: parse_bank_id(require_arg(&mut args, "bank_id")?)?,
            },
            "lesson" => Command::Lesson {
                bank_id: parse_bank_id(require_arg(&mut args, "bank_id")?)?,
                number: LessonNumber::new(parse_number(
                    require_arg(&mut args, "lesson_number")?,
                    "lesson_number",
                )?),
            },
            "attempt" => Command::Attempt {
                bank_id: parse_bank_id(require_arg(&mut args, "bank_id")?)?,
                number: LessonNumber::new(parse_number(
                    require_arg(&mut args, "lesson_number")?,
                    "lesson_number",
                )?),
                index: parse_number(require_arg(&mut args, "question_index")?, "question_index")?,
                tries: parse_number(require_arg(&mut args, "tries")?, "tries")?,
                correct_tries: parse_number(
                    require_arg(&mut args, "correct_tries")?,
                    "correct_tries",
                )?,
            },
            "finalize" => Command::Finalize {
                bank_id: parse_bank_id(require_arg(&mut args, "bank_id")?)?,
            },
            "progress" => Command::Progress {
                bank_id: parse_bank_id(require_arg(&mut args, "bank_id")?)?,
            },
            _ => return Err(ArgsError::UnknownCommand(name)),
        };

        if let Some(extra) = args.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Some(Self { db_url, command }))
    }

    fn parse_generate(args: &mut impl Iterator<Item = String>) -> Result<Command, ArgsError> {
        let mut document_id = None;
        let mut text_file = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--text-file" => text_file = Some(require_value(args, "--text-file")?),
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ if document_id.is_none() => document_id = Some(arg),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Command::Generate {
            document_id: document_id.ok_or(ArgsError::MissingArg {
                name: "document_id",
            })?,
            text_file,
        })
    }
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(app: &AppServices, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Generate {
            document_id,
            text_file,
        } => {
            let bank_id = match text_file {
                Some(path) => {
                    let text = tokio::fs::read_to_string(&path).await?;
                    app.banks().generate_bank(&document_id, &text).await?
                }
                None => app.banks().generate_bank_for_document(&document_id).await?,
            };
            let bank = app.banks().get_bank(bank_id).await?;
            print_json(&json!({
                "bank_id": bank_id.to_hex(),
                "document_id": bank.document_id(),
                "questions": bank.len(),
                "state": bank.state().as_str(),
            }))
        }
        Command::Diagnostic { bank_id } => {
            print_json(&app.banks().get_diagnostic_lesson(bank_id).await?)
        }
        Command::Lesson { bank_id, number } => {
            print_json(&app.banks().get_lesson(bank_id, number).await?)
        }
        Command::Attempt {
            bank_id,
            number,
            index,
            tries,
            correct_tries,
        } => {
            let question = app
                .progress()
                .record_attempt(bank_id, number, index, tries, correct_tries)
                .await?;
            print_json(&question)
        }
        Command::Finalize { bank_id } => {
            let lessons = app.finalize().finalize(bank_id).await?;
            info!(bank = %bank_id, lessons = lessons.len(), "finalize complete");
            print_json(&lessons)
        }
        Command::Progress { bank_id } => {
            print_json(&app.progress().lesson_progress(bank_id).await?)
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return Err(e.into());
        }
    };

    let mut config = ServiceConfig::from_env();
    if let Some(db_url) = parsed.db_url {
        config = config.with_db_url(db_url);
    }
    let db_url = normalize_sqlite_url(&config.db_url);
    prepare_sqlite_file(&db_url)?;
    let config = config.with_db_url(db_url);

    let app = AppServices::new_sqlite(&config, Clock::default()).await?;
    execute(&app, parsed.command).await
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
