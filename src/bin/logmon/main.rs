// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, ValueEnum};
use logmon::budget::DEFAULT_MAX_LINES_PER_SECOND;
use logmon::source::DEFAULT_MAX_LINE_LEN;
use logmon::{
    Budget, CursorStore, EmitError, EmitterTarget, FileCursor, FilePattern, ItemState,
    LogSource, LogSourceConfig, LogValue, PatternSyntax, ProcessStatus, RotationState,
    RuleConfig, ValueEmitter, process_log, process_logrt,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::select;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::metadata::LevelFilter;
use tracing::{debug, error, info, warn};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

#[derive(Debug, Parser)]
#[command(name = "logmon")]
#[command(bin_name = "logmon")]
#[command(version, about, long_about = None)]
struct Arguments {
    #[arg(value_enum, long, env = "LOGMON_LOG_FORMAT", default_value = "text")]
    /// Log format
    log_format: LogFormatArg,

    /// File to monitor, or the rotation pattern when --rotate is set
    #[arg(env = "LOGMON_PATH")]
    path: String,

    /// Follow a rotating set of files matched by PATH
    #[arg(long, env = "LOGMON_ROTATE", default_value = "false")]
    rotate: bool,

    /// Syntax of the file name part of a rotation pattern
    #[arg(value_enum, long, env = "LOGMON_PATTERN_SYNTAX", default_value = "glob")]
    pattern_syntax: PatternSyntaxArg,

    /// Only keep lines matching one of these patterns
    #[arg(long, env = "LOGMON_INCLUDE", value_delimiter = ',')]
    include: Vec<String>,

    /// Drop lines matching any of these patterns, checked before --include
    #[arg(long, env = "LOGMON_EXCLUDE", value_delimiter = ',')]
    exclude: Vec<String>,

    /// Match --include and --exclude patterns case-insensitively
    #[arg(long, env = "LOGMON_IGNORE_CASE", default_value = "false")]
    ignore_case: bool,

    /// Pattern applied to kept lines to extract the value
    #[arg(long, env = "LOGMON_EXTRACT")]
    extract: Option<String>,

    /// Value template with \0 to \9 back-references into --extract
    #[arg(long, env = "LOGMON_TEMPLATE")]
    template: Option<String>,

    /// File encoding, detected from the byte-order mark when empty
    #[arg(long, env = "LOGMON_ENCODING", default_value = "")]
    encoding: String,

    /// Maximum line length in bytes
    #[arg(long, env = "LOGMON_MAX_LINE_LEN", default_value_t = DEFAULT_MAX_LINE_LEN)]
    max_line_len: usize,

    /// Values sent per second
    #[arg(long, env = "LOGMON_MAX_LINES_PER_SECOND", default_value_t = DEFAULT_MAX_LINES_PER_SECOND)]
    max_lines_per_second: u32,

    /// Seconds between polls
    #[arg(long, env = "LOGMON_REFRESH_SECONDS", default_value_t = 1)]
    refresh_seconds: u64,

    /// Ignore data already present on the first poll
    #[arg(long, env = "LOGMON_SKIP_OLD_DATA", default_value = "false")]
    skip_old_data: bool,

    /// Where to keep read positions between runs
    #[arg(long, env = "LOGMON_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Item key reported with every value
    #[arg(long, env = "LOGMON_KEY")]
    key: Option<String>,

    /// Host name reported with every value
    #[arg(long, env = "LOGMON_HOSTNAME", default_value = "localhost")]
    hostname: String,

    /// Collector address reported with every value
    #[arg(long, env = "LOGMON_SERVER", default_value = "127.0.0.1")]
    server: String,

    #[arg(long, env = "LOGMON_PORT", default_value_t = 10051)]
    port: u16,

    /// Poll once and exit
    #[arg(long, default_value = "false")]
    once: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum PatternSyntaxArg {
    Glob,
    Regex,
}

impl From<PatternSyntaxArg> for PatternSyntax {
    fn from(arg: PatternSyntaxArg) -> Self {
        match arg {
            PatternSyntaxArg::Glob => PatternSyntax::Glob,
            PatternSyntaxArg::Regex => PatternSyntax::Regex,
        }
    }
}

impl Arguments {
    fn source_config(&self) -> LogSourceConfig {
        let case_sensitive = !self.ignore_case;
        let rules = self
            .exclude
            .iter()
            .map(RuleConfig::exclude)
            .chain(self.include.iter().map(RuleConfig::include))
            .map(|rule| RuleConfig {
                case_sensitive,
                ..rule
            })
            .collect();

        LogSourceConfig {
            encoding: self.encoding.clone(),
            rules,
            extract_pattern: self.extract.clone(),
            output_template: self.template.clone(),
            max_line_len: self.max_line_len,
            max_lines_per_second: self.max_lines_per_second,
            refresh_seconds: self.refresh_seconds,
            pattern_syntax: self.pattern_syntax.into(),
            skip_old_data: self.skip_old_data,
        }
    }

    fn item_key(&self) -> String {
        match &self.key {
            Some(key) => key.clone(),
            None if self.rotate => format!("logrt[{}]", self.path),
            None => format!("log[{}]", self.path),
        }
    }
}

/// What is being monitored.
enum Item {
    Log(PathBuf),
    Logrt(FilePattern),
}

/// Writes each value to stdout as one JSON object per line.
struct StdoutEmitter;

impl ValueEmitter for StdoutEmitter {
    fn send(&mut self, value: &LogValue<'_>) -> Result<(), EmitError> {
        let record = serde_json::json!({
            "host": value.target.hostname,
            "key": value.target.key,
            "value": value.value,
            "lastlogsize": value.lastlogsize,
            "mtime": value.mtime,
            "clock": value.timestamp.timestamp(),
            "ns": value.timestamp.timestamp_subsec_nanos(),
            "truncated": value.truncated,
        });
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", record)?;
        Ok(())
    }
}

fn main() -> ExitCode {
    let opt = Arguments::parse();

    let _guard = match setup_logging(&opt.log_format) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ERROR: failed to setup logging: {}", e);
            return ExitCode::from(1);
        }
    };

    match run(opt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = e, "Failed to run monitor.");
            ExitCode::from(1)
        }
    }
}

#[tokio::main]
async fn run(opt: Arguments) -> Result<(), BoxError> {
    let config = opt.source_config();
    let source = Arc::new(config.build()?);
    let budget = config.budget();
    let key = Arc::new(opt.item_key());
    let target = Arc::new(EmitterTarget::new(
        opt.server.clone(),
        opt.port,
        opt.hostname.clone(),
        key.as_str(),
    ));
    let item = Arc::new(if opt.rotate {
        Item::Logrt(FilePattern::parse(&opt.path, config.pattern_syntax)?)
    } else {
        Item::Log(PathBuf::from(&opt.path))
    });
    let store = match &opt.state_file {
        Some(path) => CursorStore::open(path)?,
        None => CursorStore::open_memory(),
    };

    let cancel_token = CancellationToken::new();
    {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received.");
                token.cancel();
            }
        });
    }

    info!(
        path = %opt.path,
        key = key.as_str(),
        rotate = opt.rotate,
        refresh_seconds = config.refresh_seconds,
        "Starting log monitor."
    );

    let mut interval = tokio::time::interval(config.refresh_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        select! {
            _ = cancel_token.cancelled() => break,
            _ = interval.tick() => {},
        }

        let (item, key, source, target, store) = (
            item.clone(),
            key.clone(),
            source.clone(),
            target.clone(),
            store.clone(),
        );
        let skip_old_data = config.skip_old_data;
        let result = tokio::task::spawn_blocking(move || {
            poll(&item, &key, skip_old_data, &source, budget, &target, &store)
        })
        .await?;

        match result {
            Ok(status) => debug!(status = ?status, "Poll finished."),
            Err(e) if e.is_access() => warn!(error = %e, "Monitored file unavailable."),
            Err(e) => return Err(e.into()),
        }

        if opt.once {
            break;
        }
    }

    store.flush()?;
    Ok(())
}

/// One poll of the item, with its state loaded from and saved to the store.
fn poll(
    item: &Item,
    key: &str,
    skip_old_data: bool,
    source: &LogSource,
    budget: Budget,
    target: &EmitterTarget,
    store: &CursorStore,
) -> logmon::Result<ProcessStatus> {
    let mut emitter = StdoutEmitter;
    let saved = store.get(key)?;

    let status = match item {
        Item::Log(path) => {
            let cursor = saved
                .as_ref()
                .and_then(ItemState::as_log)
                .cloned()
                .unwrap_or_else(|| FileCursor::new(skip_old_data));
            let outcome = process_log(path, &cursor, source, budget, target, &mut emitter)?;
            debug!(
                parsed = outcome.parsed,
                sent = outcome.sent,
                offset = outcome.cursor.size_processed,
                "Read file."
            );
            store.set(key, ItemState::Log(outcome.cursor))?;
            outcome.status
        }
        Item::Logrt(pattern) => {
            let state = saved
                .as_ref()
                .and_then(ItemState::as_logrt)
                .cloned()
                .unwrap_or_else(|| RotationState::new(skip_old_data));
            let outcome = process_logrt(pattern, &state, source, budget, target, &mut emitter)?;
            debug!(
                parsed = outcome.parsed,
                sent = outcome.sent,
                pending = outcome.state.pending_drain.len(),
                "Read rotating files."
            );
            store.set(key, ItemState::Logrt(outcome.state))?;
            outcome.status
        }
    };

    store.flush()?;
    Ok(status)
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

// Logs go to stderr, values to stdout.
fn setup_logging(log_format: &LogFormatArg) -> Result<LoggerGuard, BoxError> {
    LogTracer::init()?;

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    if *log_format == LogFormatArg::Json {
        let app_name = format!("{}-{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);

        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(bunyan_formatting_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        use std::io::IsTerminal;

        let use_ansi = std::io::stderr().is_terminal();

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_target(false)
            .with_level(true)
            .with_ansi(use_ansi)
            .compact();

        let subscriber = Registry::default().with(filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(guard)
}
