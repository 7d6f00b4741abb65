use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;

use figureout::chat::{AnyChat, keyring};
use figureout::config::{self, Settings};
use figureout::core::cache::ReminderCache;
use figureout::core::drop::DropResolver;
use figureout::core::reminder::DetailLevel;
use figureout::core::session::ConfigureSession;
use figureout::core::subtasks::SubtaskGenerator;
use figureout::store::OrgStore;

const FIRST_LOAD_TIMEOUT: Duration = Duration::from_secs(5);
const WATCH_INTERVAL: Duration = Duration::from_secs(2);

fn init_logging(debug: bool) {
    figureout::set_debug_logging(debug);

    // Log to the systemd user journal (`journalctl --user -t figureout -f`).
    // Wrapper filters: this crate at info/debug (per settings), everything else at warn.
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("figureout") {
                let max = if figureout::debug_logging() {
                    log::LevelFilter::Debug
                } else {
                    log::LevelFilter::Info
                };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    let journal = systemd_journal_logger::JournalLog::new()
        .map(|j| j.with_syslog_identifier(config::APP_NAME.to_string()));
    let installed = match journal {
        Ok(inner) => log::set_boxed_logger(Box::new(FilteredJournal { inner })).is_ok(),
        Err(_) => false,
    };

    if installed {
        // Global max must be Debug so crate debug logs can pass through when toggled
        log::set_max_level(log::LevelFilter::Debug);
    } else {
        // No journal here (macOS, containers): log to stderr instead.
        let level = if debug { "figureout=debug,warn" } else { "figureout=info,warn" };
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
            .try_init();
    }
}

struct Options {
    detail: Option<u8>,
    set_key: Option<String>,
    check_key: bool,
    yes: bool,
    payload: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options {
        detail: None,
        set_key: None,
        check_key: false,
        yes: false,
        payload: Vec::new(),
    };
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--detail" => {
                let value = iter.next().ok_or("--detail needs a level from 1 to 5")?;
                let level: u8 = value
                    .parse()
                    .map_err(|_| format!("Invalid detail level: {}", value))?;
                options.detail = Some(level);
            }
            "--set-key" => {
                let key = iter.next().ok_or("--set-key needs a key")?;
                options.set_key = Some(key.clone());
            }
            "--check-key" => options.check_key = true,
            "--yes" | "-y" => options.yes = true,
            _ => options.payload.push(arg.clone()),
        }
    }
    Ok(options)
}

/// Whether a line read from `input` says yes. End of input counts as no.
fn read_answer(input: &mut impl BufRead) -> bool {
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes"),
        Err(_) => false,
    }
}

/// Ask on the terminal. A piped-in payload has used up stdin, so the answer
/// then comes from the controlling terminal instead.
fn confirm(question: &str, stdin_used: bool) -> bool {
    if stdin_used {
        let tty = match std::fs::File::open("/dev/tty") {
            Ok(tty) => tty,
            Err(e) => {
                log::debug!("No terminal to confirm on: {}", e);
                println!("Pass --yes to add them when piping the reminder in.");
                return false;
            }
        };
        print!("{} [y/N] ", question);
        let _ = std::io::stdout().flush();
        return read_answer(&mut std::io::BufReader::new(tty));
    }
    print!("{} [y/N] ", question);
    let _ = std::io::stdout().flush();
    read_answer(&mut std::io::stdin().lock())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = config::default_settings_path();
    let mut settings = Settings::load(&settings_path);
    init_logging(settings.debug_logging);

    let args: Vec<String> = std::env::args().collect();
    let options = parse_args(&args)?;

    if let Some(level) = options.detail {
        settings.detail_level = DetailLevel::new(level);
        settings.save(&settings_path)?;
    }

    if let Some(ref key) = options.set_key {
        match keyring::store_api_key(settings.provider, key).await {
            Ok(()) => log::info!("API key stored in keyring"),
            Err(e) => {
                log::warn!("{}; keeping the key in settings instead", e);
                settings.api_key = key.clone();
                settings.save(&settings_path)?;
            }
        }
    }

    let api_key = if settings.has_api_key() {
        settings.api_key.clone()
    } else {
        match keyring::load_api_key(settings.provider).await {
            Ok(Some(key)) => key,
            Ok(None) => String::new(),
            Err(e) => {
                log::debug!("No API key from keyring: {}", e);
                String::new()
            }
        }
    };

    let chat = AnyChat::new(
        settings.provider,
        settings.base_url.as_deref(),
        settings.model.as_deref(),
    );

    if options.check_key {
        match chat.verify_api_key(&api_key).await {
            Ok(msg) => println!("{}", msg),
            Err(e) => println!("{}", e),
        }
        return Ok(());
    }

    // The drag payload: arguments if given, otherwise whatever is piped in.
    let stdin_used = options.payload.is_empty();
    let payload = if stdin_used {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        text
    } else {
        options.payload.join(" ")
    };
    if payload.trim().is_empty() {
        if options.detail.is_none() && options.set_key.is_none() {
            eprintln!("Drop a reminder by passing its title or piping it in.");
        }
        return Ok(());
    }

    let store = Arc::new(OrgStore::new(&settings.reminders_directory));
    let cache = ReminderCache::new();
    let mut loaded = cache.subscribe();
    let sync = cache.spawn_sync(store.clone());
    let watcher = store.spawn_watcher(WATCH_INTERVAL);

    if tokio::time::timeout(FIRST_LOAD_TIMEOUT, loaded.changed()).await.is_err() {
        log::warn!("Reminders did not load in time");
    }

    let target = DropResolver::new(cache.clone()).spawn();
    target.drop_entered(payload.clone());
    target.perform_drop(payload);
    let state = target.close().await;

    let Some(reminder) = state.committed_match else {
        log::info!("Dropped text matches no incomplete reminder");
        sync.abort();
        watcher.abort();
        return Ok(());
    };

    let mut session = ConfigureSession::new(reminder, settings.detail_level);
    let source = session.reminder();
    println!("Title: {}", source.title().unwrap_or_default());
    if let Some(notes) = source.notes() {
        println!("Notes: {}", notes);
    }
    println!("Detail level: {}", session.detail_level().get());

    if !ConfigureSession::can_figure_out(&api_key) {
        println!("Add an API key with --set-key to figure this out.");
        sync.abort();
        watcher.abort();
        return Ok(());
    }

    let generator = SubtaskGenerator::new(chat);
    let results = session.figure_out(&generator, &api_key).await;
    if results.is_empty() {
        println!("No subtasks came back.");
    } else {
        for (i, result) in results.iter().enumerate() {
            println!("{:>3}. {}", i + 1, result);
        }
        if options.yes || confirm("Add to Reminders?", stdin_used) {
            match session.approve(&*store) {
                Ok(count) => println!("Added {} reminders.", count),
                Err(e) => eprintln!("{}", e),
            }
        } else {
            session.dismiss();
        }
    }

    sync.abort();
    watcher.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("figureout")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn answers_read_as_yes_or_no() {
        assert!(read_answer(&mut "y\n".as_bytes()));
        assert!(read_answer(&mut "yes\n".as_bytes()));
        assert!(!read_answer(&mut "n\n".as_bytes()));
        assert!(!read_answer(&mut "\n".as_bytes()));
    }

    #[test]
    fn exhausted_input_is_no() {
        // What stdin looks like after the payload was piped in.
        let mut input = "Clean room\n".as_bytes();
        let mut payload = String::new();
        std::io::Read::read_to_string(&mut input, &mut payload).unwrap();
        assert!(!read_answer(&mut input));
    }

    #[test]
    fn flags_and_title_words_are_split() {
        let options = parse_args(&args(&["--detail", "2", "-y", "Clean", "room"])).unwrap();
        assert_eq!(options.detail, Some(2));
        assert!(options.yes);
        assert_eq!(options.payload.join(" "), "Clean room");
        assert!(parse_args(&args(&["--detail", "many"])).is_err());
    }
}
