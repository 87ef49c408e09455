use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::{MakeWriter, fmt};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;

/// Returns the default `RUST_LOG` filter for the given level.
///
/// Noisy dependencies are capped below the requested level.
pub fn default_filter(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::OFF => "",
        LevelFilter::ERROR => "ERROR",
        LevelFilter::WARN => "WARN",
        LevelFilter::INFO => {
            "INFO,\
             hyper=WARN,\
             reqwest=WARN"
        }
        LevelFilter::DEBUG => {
            "INFO,\
             remote_loader=DEBUG,\
             rloader=DEBUG"
        }
        LevelFilter::TRACE => {
            "INFO,\
             hyper=DEBUG,\
             remote_loader=TRACE,\
             rloader=TRACE"
        }
    }
}

/// Installs a global subscriber writing one JSON object per event.
pub fn init_json_logging<W>(env_filter: &str, make_writer: W)
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    fmt()
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .with_env_filter(env_filter)
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(make_writer)
        .finish()
        .with(sentry::integrations::tracing::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(LevelFilter::OFF), "");
        assert!(default_filter(LevelFilter::DEBUG).contains("remote_loader=DEBUG"));
        assert!(default_filter(LevelFilter::TRACE).contains("remote_loader=TRACE"));
    }
}
