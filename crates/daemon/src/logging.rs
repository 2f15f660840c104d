// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup: env-filtered stderr, optionally tee'd to a log file.

use std::path::Path;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global subscriber. With a log file configured, output
/// goes to a non-blocking file writer; otherwise to stderr.
///
/// Returns the appender guard — hold it for the process lifetime so
/// buffered lines flush on shutdown.
pub fn init(log_file: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path.file_name().unwrap_or_else(|| "ralph.log".as_ref());
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
            None
        }
    }
}
