/// the console logger installs once per process
///
use cache_shield::logging;
use log::LevelFilter;

#[test]
fn init_once() {
    assert!(logging::init(LevelFilter::Debug).is_ok());
    log::info!("logger installed");

    // a second global logger is refused
    assert!(logging::init(LevelFilter::Info).is_err());
}
