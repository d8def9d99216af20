//! Process-wide tracing setup, adapted from the teacher's `startup::configure_tracing`
//! down to what this core actually needs: an `EnvFilter`-driven compact formatter,
//! optionally also writing to a rolling log file.

use std::path::PathBuf;

use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

pub struct TracingOptions {
    pub config: LogConfig,
    /// Directory to additionally write rolling daily log files into.
    pub disk_logging: Option<PathBuf>,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            config: LogConfig::default(),
            disk_logging: None,
        }
    }
}

/// Installs the global `tracing` subscriber. Call exactly once per process.
pub fn configure_tracing(opts: TracingOptions) {
    let format = tracing_subscriber::fmt::format::Format::default()
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .compact();

    let write_to = if let Some(logs_dir) = opts.disk_logging {
        let roller = tracing_appender::rolling::daily(logs_dir, "vkv-core.log");
        BoxMakeWriter::new(std::io::stdout.and(roller))
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    let fmt_layer = tracing_subscriber::fmt::Layer::default()
        .with_writer(write_to)
        .event_format(format);

    let env_filter = conf_to_filter(&opts.config);

    tracing_subscriber::Registry::default()
        .with(fmt_layer)
        .with(env_filter)
        .init();
}

fn conf_to_filter(conf: &LogConfig) -> EnvFilter {
    let mut builder = EnvFilter::builder().with_default_directive(conf.level.into());
    if !conf.directives.is_empty() {
        builder = builder;
        return builder.parse_lossy(conf.directives.join(","));
    }
    builder.from_env_lossy()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_have_no_disk_logging() {
        let opts = TracingOptions::default();
        assert!(opts.disk_logging.is_none());
    }
}
