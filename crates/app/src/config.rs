use std::fmt;
use std::path::PathBuf;

use placement_core::model::UserId;
use services::quiz::DEFAULT_QUIZ_SIZE;
use services::{ChatSettings, Sender};

pub const DEFAULT_DB_URL: &str = "sqlite://bot.sqlite3";
pub const DEFAULT_BOT_USERNAME: &str = "placement_bot";

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidValue { flag: &'static str, raw: String },
    NegativeQuizSize { raw: String },
    InvalidDbUrl { raw: String },
    MissingArgument { name: &'static str },
    UnexpectedArgument(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::NegativeQuizSize { raw } => {
                write!(f, "quiz size must not be negative: {raw}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::MissingArgument { name } => write!(f, "missing argument: <{name}>"),
            ArgsError::UnexpectedArgument(arg) => write!(f, "unexpected argument: {arg}"),
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

fn parse_u64(flag: &'static str, raw: &str) -> Result<u64, ArgsError> {
    raw.trim().parse().map_err(|_| ArgsError::InvalidValue {
        flag,
        raw: raw.to_string(),
    })
}

fn parse_quiz_size(flag: &'static str, raw: &str) -> Result<usize, ArgsError> {
    let value: i64 = raw.trim().parse().map_err(|_| ArgsError::InvalidValue {
        flag,
        raw: raw.to_string(),
    })?;
    if value < 0 {
        return Err(ArgsError::NegativeQuizSize {
            raw: raw.to_string(),
        });
    }
    usize::try_from(value).map_err(|_| ArgsError::InvalidValue {
        flag,
        raw: raw.to_string(),
    })
}

/// Console identity used by the `chat` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: String,
}

impl Identity {
    pub fn sender(&self) -> Sender {
        Sender {
            id: self.user_id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
        }
    }
}

/// Settings resolved from `.env`, the environment and flags (flags win).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_url: String,
    pub admin_id: Option<UserId>,
    pub bot_username: String,
    pub catalog: Option<PathBuf>,
    pub quiz_size: usize,
    pub seed: Option<u64>,
    pub identity: Identity,
    /// Referral code sent with the initial `/start` of a console chat.
    pub referral: Option<String>,
    pub limit: u32,
    /// Positional arguments left for the subcommand.
    pub positionals: Vec<String>,
}

impl Config {
    /// Parses flags on top of environment defaults. `env` looks up variables.
    pub fn parse(
        args: &mut impl Iterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env("BOT_DB_URL").map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut admin_id = env("BOT_ADMIN_ID")
            .map(|raw| parse_u64("BOT_ADMIN_ID", &raw).map(UserId::new))
            .transpose()?;
        let mut bot_username = env("BOT_USERNAME").unwrap_or_else(|| DEFAULT_BOT_USERNAME.into());
        let mut catalog = env("BOT_CATALOG").map(PathBuf::from);
        let mut quiz_size = env("BOT_QUIZ_SIZE")
            .map(|raw| parse_quiz_size("BOT_QUIZ_SIZE", &raw))
            .transpose()?
            .unwrap_or(DEFAULT_QUIZ_SIZE);

        let mut seed = None;
        let mut user_id = None;
        let mut username = None;
        let mut first_name = None;
        let mut referral = None;
        let mut limit = 100;
        let mut positionals = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--admin-id" => {
                    let value = require_value(args, "--admin-id")?;
                    admin_id = Some(UserId::new(parse_u64("--admin-id", &value)?));
                }
                "--bot-username" => bot_username = require_value(args, "--bot-username")?,
                "--catalog" => catalog = Some(PathBuf::from(require_value(args, "--catalog")?)),
                "--quiz-size" => {
                    let value = require_value(args, "--quiz-size")?;
                    quiz_size = parse_quiz_size("--quiz-size", &value)?;
                }
                "--seed" => {
                    let value = require_value(args, "--seed")?;
                    seed = Some(parse_u64("--seed", &value)?);
                }
                "--user-id" => {
                    let value = require_value(args, "--user-id")?;
                    user_id = Some(UserId::new(parse_u64("--user-id", &value)?));
                }
                "--username" => username = Some(require_value(args, "--username")?),
                "--name" => first_name = Some(require_value(args, "--name")?),
                "--ref" => referral = Some(require_value(args, "--ref")?),
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    limit = u32::try_from(parse_u64("--limit", &value)?).map_err(|_| {
                        ArgsError::InvalidValue {
                            flag: "--limit",
                            raw: value.clone(),
                        }
                    })?;
                }
                "--help" | "-h" => {
                    crate::print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positionals.push(arg),
            }
        }

        // Without an explicit identity the console user is the admin, so the
        // admin commands can be tried from the same session.
        let user_id = user_id.or(admin_id).unwrap_or_else(|| UserId::new(1));
        Ok(Self {
            db_url,
            admin_id,
            bot_username,
            catalog,
            quiz_size,
            seed,
            identity: Identity {
                user_id,
                username,
                first_name: first_name.unwrap_or_else(|| "Console".into()),
            },
            referral,
            limit,
            positionals,
        })
    }

    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            admin_id: self.admin_id,
            bot_username: self.bot_username.clone(),
            quiz_size: self.quiz_size,
            seed: self.seed,
        }
    }
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
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
