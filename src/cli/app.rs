// ABOUTME: Main application orchestration for metricfeed CLI
// ABOUTME: Coordinates between CLI arguments, configuration, and command execution

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands;
use super::{Args, Commands, Config};

pub struct App {
    config: Config,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration. Logs go to stderr, stdout
    /// carries command output only.
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        match self.config.logging.format.as_str() {
            "compact" => {
                tracing_subscriber::fmt()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_env_filter(env_filter)
                    .with_ansi(!no_color)
                    .with_target(false)
                    .init();
            }
            _ => {
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_env_filter(env_filter)
                    .with_ansi(!no_color)
                    .with_target(false)
                    .init();
            }
        }

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub async fn run(&self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting metricfeed v{}", env!("CARGO_PKG_VERSION"));
        debug!("Configuration loaded from: {:?}", args.config);

        match args.command {
            Commands::Run {
                templates,
                settings,
            } => commands::run(templates, settings, &self.config).await,

            Commands::Once {
                templates,
                settings,
                format,
            } => commands::once(templates, settings, format, &self.config).await,

            Commands::Validate { dir } => commands::validate(dir).await,

            Commands::Templates { templates } => {
                commands::list_templates(templates, &self.config).await
            }
        }
    }

    /// Create application and parse arguments from the command line
    pub fn from_args() -> Result<(Self, Args)> {
        let args = Args::parse_args();
        let config = Config::load(args.config.clone())?;
        Ok((Self::new(config), args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_app_creation() {
        let app = App::new(Config::default());
        assert_eq!(app.config().scheduler.min_interval_ms, 1000);
    }

    #[test]
    fn test_config_file_feeds_app() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("metricfeed.yaml");

        let config_content = r#"
settings_path: /var/lib/metricfeed/settings.json
logging:
  level: debug
  format: compact
"#;

        fs::write(&config_path, config_content).unwrap();

        let app = App::new(Config::load(Some(config_path)).unwrap());
        assert_eq!(app.config().logging.level, "debug");
        assert_eq!(app.config().logging.format, "compact");
        assert_eq!(
            app.config().settings_path,
            std::path::PathBuf::from("/var/lib/metricfeed/settings.json")
        );
    }
}
