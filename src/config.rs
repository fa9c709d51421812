//! Command-line configuration.

use crate::bot::BotConfig;
use crate::poller::PollerConfig;
use crate::storage::compression::CompressionAlgorithm;
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("port must be non-zero")]
    ZeroPort,
    #[error("prefix length must be at least 1")]
    ZeroPrefix,
    #[error("response chance {0} is above 100 percent")]
    ResponseChance(u32),
    #[error(
        "--twitter-consumer-key, --twitter-consumer-secret and --twitter-source-user \
         must be given together"
    )]
    PartialTwitter,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "markov-chatter", version, about = "Markov chain chat bot")]
pub struct Config {
    /// The HTTP port on which to listen
    #[arg(long, default_value_t = 8000)]
    pub port: u16,

    /// Maximum number of words in the output
    #[arg(long, default_value_t = 100)]
    pub words: usize,

    /// Prefix length in words
    #[arg(long, default_value_t = 2)]
    pub prefix: usize,

    /// Percent chance to generate a response on each request
    #[arg(long, default_value_t = 10)]
    pub response_chance: u32,

    /// Response delay in seconds (to prevent flooding)
    #[arg(long, default_value_t = 2)]
    pub response_timeout: u64,

    /// Keyword used to enable/disable the bot
    #[arg(long, default_value = "markovctl")]
    pub bot_control_word: String,

    /// The name of the bot as received in the API
    #[arg(long, default_value = "slackbot")]
    pub bot_api_name: String,

    /// The name of the bot when it speaks
    #[arg(long, default_value = "markov-bot")]
    pub bot_username: String,

    /// Reply whenever the bot sees its name anywhere
    #[arg(long)]
    pub always_reply: bool,

    /// Allow the bot to reply to itself
    #[arg(long)]
    pub chatty: bool,

    /// File to use for maintaining our markov chain state
    #[arg(long, default_value = "state")]
    pub state_file: PathBuf,

    /// LZ4-compress the state file when saving
    #[arg(long)]
    pub compress_state: bool,

    /// The directory of a chat export to train from instead of loading state
    #[arg(long)]
    pub import_dir: Option<PathBuf>,

    /// Optional channel to limit the import to
    #[arg(long, requires = "import_dir")]
    pub import_chan: Option<String>,

    /// Twitter API key
    #[arg(long)]
    pub twitter_consumer_key: Option<String>,

    /// Twitter API key secret
    #[arg(long)]
    pub twitter_consumer_secret: Option<String>,

    /// Account whose timeline is learned
    #[arg(long)]
    pub twitter_source_user: Option<String>,

    /// Seconds between timeline polls
    #[arg(long, default_value_t = 300)]
    pub twitter_poll_secs: u64,
}

/// Credentials and target for the timeline poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitterSettings {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub source_user: String,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.prefix == 0 {
            return Err(ConfigError::ZeroPrefix);
        }
        if self.response_chance > 100 {
            return Err(ConfigError::ResponseChance(self.response_chance));
        }
        self.twitter()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn compression(&self) -> CompressionAlgorithm {
        if self.compress_state {
            CompressionAlgorithm::Lz4
        } else {
            CompressionAlgorithm::None
        }
    }

    pub fn bot_config(&self) -> BotConfig {
        BotConfig {
            username: self.bot_username.clone(),
            api_name: self.bot_api_name.clone(),
            control_word: self.bot_control_word.clone(),
            always_reply: self.always_reply,
            chatty: self.chatty,
            response_chance: self.response_chance,
            reply_words: self.words,
            response_delay: Duration::from_secs(self.response_timeout),
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(self.twitter_poll_secs),
            state_file: self.state_file.clone(),
            ..PollerConfig::default()
        }
    }

    /// Twitter settings when all three flags are present, `None` when none are.
    pub fn twitter(&self) -> Result<Option<TwitterSettings>, ConfigError> {
        match (
            &self.twitter_consumer_key,
            &self.twitter_consumer_secret,
            &self.twitter_source_user,
        ) {
            (Some(key), Some(secret), Some(user)) => Ok(Some(TwitterSettings {
                consumer_key: key.clone(),
                consumer_secret: secret.clone(),
                source_user: user.clone(),
            })),
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::PartialTwitter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let argv = std::iter::once("markov-chatter").chain(args.iter().copied());
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.words, 100);
        assert_eq!(config.prefix, 2);
        assert_eq!(config.state_file, PathBuf::from("state"));
        assert_eq!(config.compression(), CompressionAlgorithm::None);
        assert_eq!(config.validate(), Ok(()));

        let bot = config.bot_config();
        assert_eq!(bot.username, "markov-bot");
        assert_eq!(bot.control_word, "markovctl");
        assert_eq!(bot.response_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--port", "9000", "--prefix", "3", "--always-reply", "--compress-state",
            "--bot-username", "parrot",
        ]);
        assert_eq!(config.listen_addr().port(), 9000);
        assert_eq!(config.prefix, 3);
        assert!(config.always_reply);
        assert_eq!(config.compression(), CompressionAlgorithm::Lz4);
        assert_eq!(config.bot_config().username, "parrot");
    }

    #[test]
    fn test_validation() {
        assert_eq!(parse(&["--port", "0"]).validate(), Err(ConfigError::ZeroPort));
        assert_eq!(parse(&["--prefix", "0"]).validate(), Err(ConfigError::ZeroPrefix));
        assert_eq!(
            parse(&["--response-chance", "101"]).validate(),
            Err(ConfigError::ResponseChance(101))
        );
        assert_eq!(
            parse(&["--twitter-consumer-key", "k"]).validate(),
            Err(ConfigError::PartialTwitter)
        );
    }

    #[test]
    fn test_twitter_settings() {
        let config = parse(&[
            "--twitter-consumer-key", "k", "--twitter-consumer-secret", "s",
            "--twitter-source-user", "someone", "--twitter-poll-secs", "60",
        ]);
        let twitter = config.twitter().unwrap().unwrap();
        assert_eq!(twitter.source_user, "someone");
        assert_eq!(config.poller_config().interval, Duration::from_secs(60));
    }

    #[test]
    fn test_import_chan_requires_dir() {
        let result = Config::try_parse_from(["markov-chatter", "--import-chan", "general"]);
        assert!(result.is_err());
    }
}
