// SPDX-License-Identifier: GPL-2.0-or-later

use common::{ArcMsgLogger, LogLevel, MsgLogger};
use env::{EnvConf, EnvConfigNewError};
use init_segment::{build_init_segment, AtomWriters, BuildError, HeapAllocator, InitSegment};
use std::{io::Write, path::PathBuf, sync::Arc};
use thiserror::Error;

pub struct BuildArgs {
    pub config: PathBuf,
    pub output: Option<PathBuf>,
    pub size_only: bool,
}

#[derive(Debug, Error)]
pub enum RunBuildError {
    #[error("{0}")]
    Env(#[from] EnvConfigNewError),

    #[error("build init segment: {0}")]
    Build(#[from] BuildError),

    #[error("write output: {0:?} {1}")]
    WriteFile(PathBuf, std::io::Error),

    #[error("write stdout: {0}")]
    WriteStdout(std::io::Error),
}

// Prints messages at or above `min_level` to stderr.
struct StderrLogger {
    min_level: LogLevel,
}

impl StderrLogger {
    fn enabled(&self, level: LogLevel) -> bool {
        level <= self.min_level
    }
}

impl MsgLogger for StderrLogger {
    fn log(&self, level: LogLevel, msg: &str) {
        if self.enabled(level) {
            eprintln!("[{}] {msg}", level.as_str().to_uppercase());
        }
    }
}

/// Builds the init segment described by `args.config`. The segment, or
/// its size in size-only mode, goes to `stdout` unless an output path
/// is set.
pub fn run_build(args: &BuildArgs, stdout: &mut dyn Write) -> Result<(), RunBuildError> {
    use RunBuildError::*;
    let env = EnvConf::new(&args.config)?;
    let logger: ArcMsgLogger = Arc::new(StderrLogger {
        min_level: env.log_level,
    });

    let segment = build_init_segment(
        &logger,
        &HeapAllocator,
        &env.media_set,
        AtomWriters::default(),
        args.size_only,
    )?;

    match segment {
        InitSegment::Size(size) => writeln!(stdout, "{size}").map_err(WriteStdout),
        InitSegment::Data(data) => {
            logger.log(
                LogLevel::Info,
                &format!("built init segment, {} bytes", data.len()),
            );
            match &args.output {
                Some(path) => std::fs::write(path, &data).map_err(|e| WriteFile(path.clone(), e)),
                None => stdout.write_all(&data).map_err(WriteStdout),
            }
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tempfile::TempDir;
    use test_case::test_case;

    const CONFIG: &str = "
        log_level = \"error\"
        type = \"vod\"
        duration_ms = 60000

        [[track]]
        kind = \"video\"
        timescale = 90000
        width = 1920
        height = 1080
        extra_data = [1, 100, 0, 40, 255, 225]

        [[track]]
        kind = \"audio\"
        timescale = 90000
        channels = 2
        bits_per_sample = 16
        sample_rate = 48000
        extra_data = [17, 144]
    ";

    fn write_config(dir: &Path, config: &str) -> PathBuf {
        let path = dir.join("init.toml");
        std::fs::write(&path, config).unwrap();
        path
    }

    #[test]
    fn test_run_build_output_file() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("init.mp4");
        let args = BuildArgs {
            config: write_config(temp_dir.path(), CONFIG),
            output: Some(output.clone()),
            size_only: false,
        };

        let mut stdout: Vec<u8> = Vec::new();
        run_build(&args, &mut stdout).unwrap();
        assert!(stdout.is_empty());

        let data = std::fs::read(output).unwrap();
        assert_eq!(b"ftyp", &data[4..8]);
        assert_eq!(b"moov", &data[28..32]);
    }

    #[test]
    fn test_run_build_size_only_matches_stdout() {
        let temp_dir = TempDir::new().unwrap();
        let config = write_config(temp_dir.path(), CONFIG);

        let mut data: Vec<u8> = Vec::new();
        let args = BuildArgs {
            config: config.clone(),
            output: None,
            size_only: false,
        };
        run_build(&args, &mut data).unwrap();

        let mut size: Vec<u8> = Vec::new();
        let args = BuildArgs {
            config,
            output: None,
            size_only: true,
        };
        run_build(&args, &mut size).unwrap();

        assert_eq!(format!("{}\n", data.len()), String::from_utf8(size).unwrap());
    }

    #[test]
    fn test_run_build_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let args = BuildArgs {
            config: temp_dir.path().join("nil.toml"),
            output: None,
            size_only: false,
        };
        assert!(matches!(
            run_build(&args, &mut Vec::<u8>::new()),
            Err(RunBuildError::Env(EnvConfigNewError::ReadFile(..)))
        ));
    }

    #[test]
    fn test_run_build_duration_overflow() {
        let temp_dir = TempDir::new().unwrap();
        let config = "
            log_level = \"error\"
            type = \"vod\"
            duration_ms = 9223372036854775807

            [[track]]
            kind = \"video\"
            timescale = 90000
            width = 640
            height = 480
        ";
        let args = BuildArgs {
            config: write_config(temp_dir.path(), config),
            output: None,
            size_only: true,
        };
        assert!(matches!(
            run_build(&args, &mut Vec::<u8>::new()),
            Err(RunBuildError::Build(BuildError::Duration { .. }))
        ));
    }

    #[test]
    fn test_run_build_96khz_audio() {
        let temp_dir = TempDir::new().unwrap();
        let config = "
            log_level = \"error\"
            type = \"live\"

            [[track]]
            kind = \"audio\"
            timescale = 96000
            channels = 2
            bits_per_sample = 16
            sample_rate = 96000
            extra_data = [17, 128]
        ";
        let output = temp_dir.path().join("init.mp4");
        let args = BuildArgs {
            config: write_config(temp_dir.path(), config),
            output: Some(output.clone()),
            size_only: false,
        };
        run_build(&args, &mut Vec::<u8>::new()).unwrap();
        assert!(!std::fs::read(output).unwrap().is_empty());
    }

    #[test_case(LogLevel::Error, LogLevel::Error, true; "error at error")]
    #[test_case(LogLevel::Error, LogLevel::Debug, false; "debug at error")]
    #[test_case(LogLevel::Info, LogLevel::Warning, true; "warning at info")]
    #[test_case(LogLevel::Info, LogLevel::Debug, false; "debug at info")]
    #[test_case(LogLevel::Debug, LogLevel::Debug, true; "debug at debug")]
    fn test_stderr_logger_enabled(min_level: LogLevel, level: LogLevel, want: bool) {
        assert_eq!(want, StderrLogger { min_level }.enabled(level));
    }
}
