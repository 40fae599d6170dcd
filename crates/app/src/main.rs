mod config;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use placement_core::model::{PartnerId, SHEET_HEADERS};
use services::chat::{created_link_text, partner_stats_text, total_stats_text};
use services::{AppServices, Catalog, Clock, Incoming, Keyboard, Reply};

use config::{ArgsError, Config, prepare_sqlite_file};

pub(crate) fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- chat        [options] [--user-id <id>] [--ref <code>]");
    eprintln!("  cargo run -p app -- create-link [options] <platform> <theme> [partner_id]");
    eprintln!("  cargo run -p app -- stats       [options] [partner_id]");
    eprintln!("  cargo run -p app -- leads       [options] [--limit <n>]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>      default sqlite://bot.sqlite3");
    eprintln!("  --admin-id <id>        user allowed to run /create_link and /stats");
    eprintln!("  --bot-username <name>  used in referral URLs");
    eprintln!("  --catalog <path>       question catalog TOML (embedded copy otherwise)");
    eprintln!("  --quiz-size <n>        questions per quiz, default 10");
    eprintln!("  --seed <n>             fixed RNG seed");
    eprintln!();
    eprintln!("In chat, `#k` presses button k and `/contact <phone>` shares a contact.");
    eprintln!();
    eprintln!("Environment (.env is read too):");
    eprintln!("  BOT_DB_URL, BOT_ADMIN_ID, BOT_USERNAME, BOT_CATALOG, BOT_QUIZ_SIZE, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Chat,
    CreateLink,
    Stats,
    Leads,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "chat" => Some(Self::Chat),
            "create-link" => Some(Self::CreateLink),
            "stats" => Some(Self::Stats),
            "leads" => Some(Self::Leads),
            _ => None,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn rng_for(config: &Config) -> StdRng {
    config
        .seed
        .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

fn print_reply(reply: &Reply) {
    println!("{}", reply.text);
    match &reply.keyboard {
        Keyboard::None => {}
        Keyboard::RequestContact => println!("  [/contact <phone>]"),
        keyboard @ Keyboard::Options { .. } => {
            let mut index = 0;
            for row in keyboard.rows() {
                let cells: Vec<String> = row
                    .iter()
                    .map(|label| {
                        index += 1;
                        format!("#{index} {label}")
                    })
                    .collect();
                println!("  {}", cells.join("   "));
            }
        }
    }
    println!();
}

/// Maps a console line to an incoming message, resolving `#k` against the
/// buttons of the last reply.
fn to_incoming(config: &Config, line: &str, buttons: &[String]) -> Incoming {
    let sender = config.identity.sender();
    if let Some(phone) = line.strip_prefix("/contact ") {
        return Incoming::contact(sender, phone.trim());
    }
    let picked = line
        .strip_prefix('#')
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .and_then(|k| k.checked_sub(1))
        .and_then(|k| buttons.get(k));
    match picked {
        Some(label) => Incoming::text(sender, label.clone()),
        None => Incoming::text(sender, line),
    }
}

fn buttons_of(replies: &[Reply]) -> Vec<String> {
    replies
        .last()
        .map(|reply| {
            reply
                .keyboard
                .rows()
                .into_iter()
                .flatten()
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

async fn run_chat(app: &AppServices, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let chat = app.chat();
    let start = match &config.referral {
        Some(code) => format!("/start {code}"),
        None => "/start".to_string(),
    };
    let replies = chat
        .handle(Incoming::text(config.identity.sender(), start))
        .await?;
    replies.iter().for_each(print_reply);
    let mut buttons = buttons_of(&replies);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let replies = chat.handle(to_incoming(config, line, &buttons)).await?;
        replies.iter().for_each(print_reply);
        if !replies.is_empty() {
            buttons = buttons_of(&replies);
        }
    }
    Ok(())
}

fn parse_partner(raw: &str) -> Result<PartnerId, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidValue {
        flag: "partner_id",
        raw: raw.to_string(),
    })
}

async fn run_create_link(
    app: &AppServices,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let (platform, theme, partner) = match config.positionals.as_slice() {
        [platform, theme] => (platform, theme, None),
        [platform, theme, partner] => (platform, theme, Some(parse_partner(partner)?)),
        [] | [_] => {
            return Err(ArgsError::MissingArgument {
                name: if config.positionals.is_empty() {
                    "platform"
                } else {
                    "theme"
                },
            }
            .into());
        }
        [_, _, _, extra, ..] => return Err(ArgsError::UnexpectedArgument(extra.clone()).into()),
    };
    let mut rng = rng_for(config);
    let created = app
        .referrals()
        .create_link(platform, theme, partner, &mut rng)
        .await?;
    println!("{}", created_link_text(&created));
    Ok(())
}

async fn run_stats(app: &AppServices, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let text = match config.positionals.as_slice() {
        [] => total_stats_text(&app.referrals().total_stats().await?),
        [raw] => partner_stats_text(&app.referrals().partner_stats(parse_partner(raw)?).await?),
        [_, extra, ..] => return Err(ArgsError::UnexpectedArgument(extra.clone()).into()),
    };
    println!("{text}");
    Ok(())
}

async fn run_leads(app: &AppServices, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(extra) = config.positionals.first() {
        return Err(ArgsError::UnexpectedArgument(extra.clone()).into());
    }
    println!("{}", SHEET_HEADERS.join("\t"));
    for lead in app.leads().recent(config.limit).await? {
        let row: Vec<String> = lead
            .sheet_row()
            .into_iter()
            .map(|cell| cell.replace(['\t', '\n'], " "))
            .collect();
        println!("{}", row.join("\t"));
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand means an interactive chat.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Chat,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Chat,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let config = Config::parse(&mut iter, |key| std::env::var(key).ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let catalog = match &config.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::embedded()?,
    };

    prepare_sqlite_file(&config.db_url)?;
    let app = AppServices::new_sqlite(
        &config.db_url,
        Clock::system(),
        catalog,
        config.chat_settings(),
    )
    .await?;
    tracing::debug!(db_url = %config.db_url, ?cmd, "services ready");

    match cmd {
        Command::Chat => run_chat(&app, &config).await,
        Command::CreateLink => run_create_link(&app, &config).await,
        Command::Stats => run_stats(&app, &config).await,
        Command::Leads => run_leads(&app, &config).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut args = std::iter::empty::<String>();
        Config::parse(&mut args, |_| None).unwrap()
    }

    #[test]
    fn subcommands_are_recognized() {
        assert_eq!(Command::from_arg("chat"), Some(Command::Chat));
        assert_eq!(Command::from_arg("create-link"), Some(Command::CreateLink));
        assert_eq!(Command::from_arg("leads"), Some(Command::Leads));
        assert_eq!(Command::from_arg("ui"), None);
    }

    #[test]
    fn hash_number_presses_a_button() {
        let buttons = vec!["A1".to_string(), "B2".to_string()];
        assert_eq!(to_incoming(&config(), "#2", &buttons).text, "B2");
        assert_eq!(to_incoming(&config(), "#0", &buttons).text, "#0");
        assert_eq!(to_incoming(&config(), "#9", &buttons).text, "#9");
        assert_eq!(to_incoming(&config(), "hello", &buttons).text, "hello");
    }

    #[test]
    fn contact_command_shares_a_phone() {
        let incoming = to_incoming(&config(), "/contact +380671234567", &[]);
        assert_eq!(incoming.contact_phone.as_deref(), Some("+380671234567"));
    }

    #[test]
    fn buttons_come_from_the_last_reply() {
        let replies = vec![
            Reply::text("intro"),
            Reply::with_keyboard("pick", Keyboard::options(["x", "y", "z"].as_slice(), 2)),
        ];
        assert_eq!(buttons_of(&replies), ["x", "y", "z"]);
        assert!(buttons_of(&[]).is_empty());
    }
}
