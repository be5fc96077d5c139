//! Runtime configuration, loaded from a TOML file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gateway::{ChannelId, RoleId};

/// Errors raised while loading or validating configuration. All of these are
/// fatal: the process should refuse to start rather than run misconfigured.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything the machine needs to know about the guild it runs in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BouncerConfig {
    /// Role granted when a member accepts the onboarding offer.
    pub player_role: RoleId,
    /// Role mirroring live voice presence.
    pub voice_role: RoleId,
    /// Channel where waiting notices and role offers are posted.
    pub gate_channel: ChannelId,
    /// Channel where the welcome message lands after a successful accept.
    pub welcome_channel: ChannelId,
    /// Channel where voice arrival notices are posted.
    pub voice_notice_channel: ChannelId,
    /// Voice channel excluded from presence tracking (the AFK pen).
    pub afk_channel: ChannelId,
    /// Decision window for a first offer, in seconds. Later offers scale
    /// this by the attempt count.
    pub base_kick_secs: u64,
    /// Lapsed offers tolerated before the punishment becomes a ban.
    pub max_attempts: u32,
    /// Waiting period per prior attempt, in seconds. Attempts beyond the
    /// last entry reuse it.
    pub wait_secs: Vec<u64>,
    /// Minimum gap between voice arrival notices for one member, in seconds.
    pub voice_cooldown_secs: u64,
    /// How long a voice arrival notice stays up before deleting itself,
    /// in seconds.
    pub voice_notice_lifetime_secs: u64,
}

impl Default for BouncerConfig {
    fn default() -> Self {
        Self {
            player_role: RoleId(0),
            voice_role: RoleId(0),
            gate_channel: ChannelId(0),
            welcome_channel: ChannelId(0),
            voice_notice_channel: ChannelId(0),
            afk_channel: ChannelId(0),
            base_kick_secs: 20,
            max_attempts: 3,
            wait_secs: vec![600, 1200, 2400],
            voice_cooldown_secs: 600,
            voice_notice_lifetime_secs: 60,
        }
    }
}

impl BouncerConfig {
    /// Load and validate a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot drive the machine. Ids default to
    /// zero, which no real guild uses, so an unset id is caught here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.player_role.0 == 0 {
            return Err(ConfigError::Invalid("player_role is not set".into()));
        }
        if self.voice_role.0 == 0 {
            return Err(ConfigError::Invalid("voice_role is not set".into()));
        }
        if self.gate_channel.0 == 0 {
            return Err(ConfigError::Invalid("gate_channel is not set".into()));
        }
        if self.welcome_channel.0 == 0 {
            return Err(ConfigError::Invalid("welcome_channel is not set".into()));
        }
        if self.voice_notice_channel.0 == 0 {
            return Err(ConfigError::Invalid(
                "voice_notice_channel is not set".into(),
            ));
        }
        if self.afk_channel.0 == 0 {
            return Err(ConfigError::Invalid("afk_channel is not set".into()));
        }
        if self.base_kick_secs == 0 {
            return Err(ConfigError::Invalid("base_kick_secs must be nonzero".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be nonzero".into()));
        }
        if self.wait_secs.is_empty() {
            return Err(ConfigError::Invalid("wait_secs must not be empty".into()));
        }
        if self.wait_secs.contains(&0) {
            return Err(ConfigError::Invalid(
                "wait_secs entries must be nonzero".into(),
            ));
        }
        Ok(())
    }

    pub fn base_kick(&self) -> Duration {
        Duration::from_secs(self.base_kick_secs)
    }

    pub fn voice_cooldown(&self) -> Duration {
        Duration::from_secs(self.voice_cooldown_secs)
    }

    pub fn voice_notice_lifetime(&self) -> Duration {
        Duration::from_secs(self.voice_notice_lifetime_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> BouncerConfig {
        BouncerConfig {
            player_role: RoleId(10),
            voice_role: RoleId(11),
            gate_channel: ChannelId(100),
            welcome_channel: ChannelId(101),
            voice_notice_channel: ChannelId(102),
            afk_channel: ChannelId(103),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_timings() {
        let config = BouncerConfig::default();
        assert_eq!(config.base_kick(), Duration::from_secs(20));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.wait_secs, vec![600, 1200, 2400]);
        assert_eq!(config.voice_cooldown(), Duration::from_secs(600));
        assert_eq!(config.voice_notice_lifetime(), Duration::from_secs(60));
    }

    #[test]
    fn test_validate_accepts_populated_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unset_ids() {
        let config = BouncerConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("player_role"), "got: {err}");

        let mut config = valid_config();
        config.afk_channel = ChannelId(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("afk_channel"), "got: {err}");
    }

    #[test]
    fn test_validate_rejects_zero_timings() {
        let mut config = valid_config();
        config.base_kick_secs = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.wait_secs = vec![];
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.wait_secs = vec![600, 0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_round_trip() {
        let config = valid_config();
        let toml_text = toml::to_string(&config).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml_text.as_bytes()).unwrap();

        let loaded = BouncerConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.player_role, RoleId(10));
        assert_eq!(loaded.wait_secs, config.wait_secs);
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"max_attempts = 0\n").unwrap();

        let err = BouncerConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got: {err}");
    }

    #[test]
    fn test_from_file_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not toml [[[").unwrap();

        let err = BouncerConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "got: {err}");
    }
}
