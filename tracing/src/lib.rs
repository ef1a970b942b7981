use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid RUST_LOG: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::FromEnvError),
}

/// How log lines are rendered on stderr.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

pub struct TracingBuilder {
    level: Level,
    format: LogFormat,
}

impl Default for TracingBuilder {
    fn default() -> Self {
        TracingBuilder {
            level: Level::INFO,
            format: LogFormat::default(),
        }
    }
}

impl TracingBuilder {
    /// Set the log level. RUST_LOG still has a higher priority over this value.
    pub fn level(mut self, level: Level) -> TracingBuilder {
        self.level = level;
        self
    }

    /// Set the output format, default is compact.
    pub fn format(mut self, format: LogFormat) -> TracingBuilder {
        self.format = format;
        self
    }

    /// This will setup tracing based on the configuration passed in.
    /// It will setup a stderr writer output layer and a EnvFilter based on the provided log
    /// level (RUST_LOG still has a higher priority over the configured value).
    ///
    /// Fails if a global subscriber is already installed.
    pub fn build(self) -> Result<(), Error> {
        let fmt_layer = tracing_subscriber::fmt::Layer::new().with_writer(std::io::stderr);
        let fmt_layer = match self.format {
            LogFormat::Compact => fmt_layer.compact().boxed(),
            LogFormat::Json => fmt_layer.json().boxed(),
        };

        tracing_subscriber::registry()
            .with(
                EnvFilter::builder()
                    .with_default_directive(self.level.into())
                    .from_env()?,
            )
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, LogFormat, TracingBuilder};
    use tracing::Level;

    #[test]
    fn builder() {
        let builder = TracingBuilder::default();
        assert_eq!(Level::INFO, builder.level);
        assert_eq!(LogFormat::Compact, builder.format);

        let builder = builder.level(Level::DEBUG).format(LogFormat::Json);
        assert_eq!(Level::DEBUG, builder.level);
        assert_eq!(LogFormat::Json, builder.format);
    }

    /// Only one global subscriber can be installed.
    #[test]
    fn build_twice() {
        TracingBuilder::default().build().expect("must succeed");
        assert!(matches!(
            TracingBuilder::default().build(),
            Err(Error::Init(_))
        ));
    }
}
