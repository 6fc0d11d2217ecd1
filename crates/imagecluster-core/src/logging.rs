use log::{error, info, LevelFilter};
use std::fmt;
use std::path::{Path, PathBuf};

use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} - {M} - {l} - {m}{n}";

/// Initialize console and file logging.
///
/// The file is `<log_dir>/<YYYY-MM-DD>_<name>_log.log`. With `overwrite` the
/// file is truncated, otherwise appended to. `IMAGECLUSTER_LOG` overrides
/// `level` when it parses as a level filter.
pub fn init_logger(
    log_dir: &Path,
    name: &str,
    overwrite: bool,
    level: LevelFilter,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;

    let log_file_path = log_file_path(log_dir, name, chrono::Local::now().date_naive());

    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .append(!overwrite)
        .build(&log_file_path)
        .map_err(|e| format!("Failed to create log appender: {}", e))?;

    let level = std::env::var("IMAGECLUSTER_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(level);

    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(
            Root::builder()
                .appender("console")
                .appender("file")
                .build(level),
        )
        .map_err(|e| format!("Failed to build log config: {}", e))?;

    log4rs::init_config(config).map_err(|e| format!("Failed to initialize log4rs: {}", e))?;

    info!("Logging to file: {}", log_file_path.display());
    Ok(log_file_path)
}

fn log_file_path(log_dir: &Path, name: &str, date: chrono::NaiveDate) -> PathBuf {
    log_dir.join(format!("{}_{}_log.log", date.format("%Y-%m-%d"), name))
}

/// Pipeline stage, used to attribute failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadFingerprints,
    BuildExtractor,
    LoadImages,
    DecodeImages,
    SaveImages,
    ExtractFingerprints,
    SaveFingerprints,
    Reduce,
    Cluster,
    Links,
    Mosaic,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadFingerprints => "load-fingerprints",
            Stage::BuildExtractor => "build-extractor",
            Stage::LoadImages => "load-images",
            Stage::DecodeImages => "decode-images",
            Stage::SaveImages => "save-images",
            Stage::ExtractFingerprints => "extract-fingerprints",
            Stage::SaveFingerprints => "save-fingerprints",
            Stage::Reduce => "reduce",
            Stage::Cluster => "cluster",
            Stage::Links => "links",
            Stage::Mosaic => "mosaic",
        };
        f.write_str(name)
    }
}

/// Log a failed pipeline stage
pub fn log_stage_error(imagedir: &Path, stage: Stage, error: &dyn std::error::Error) {
    error!(
        "Stage failed - Stage: {}, Imagedir: {}, Error: {}",
        stage,
        imagedir.display(),
        error
    );
}

/// Log file system modification
pub fn log_fs_modification(operation: &str, path: &Path, details: Option<&str>) {
    let details_str = details.unwrap_or("");
    info!(
        "FS CHANGE - Operation: {}, Path: {}{}",
        operation,
        path.display(),
        if details_str.is_empty() {
            "".to_string()
        } else {
            format!(", Details: {}", details_str)
        }
    );
}
