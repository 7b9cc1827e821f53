/// log4rs setup for applications embedding the cache
///
use anyhow::Result;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Handle;

pub const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {l:<5} {T} {t} - {m}{n}";

/// build a console-only config; the crate's own target is logged at `level`
pub fn console_config(level: LevelFilter) -> Result<Config> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .logger(Logger::builder().build("cache_shield", level))
        .build(Root::builder().appender("stdout").build(LevelFilter::Warn))?;

    Ok(config)
}

/// install the console logger; fails if a logger is already set
pub fn init(level: LevelFilter) -> Result<Handle> {
    let handle = log4rs::init_config(console_config(level)?)?;

    Ok(handle)
}

/// install a logger from a log4rs yaml file
pub fn init_file(path: &str) -> Result<()> {
    log4rs::init_file(path, Default::default())?;

    Ok(())
}
