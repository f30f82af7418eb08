use crate::error::{Result, SessionError};

/// Per-session knobs. Analysis stages can be toggled independently; the
/// mixed recording is always written.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub enable_transcription: bool,
    pub enable_diarization: bool,
    pub enable_system_audio: bool,
    /// Nominal analysis chunk length, seconds.
    pub chunk_duration_secs: f64,
    /// Shortest chunk the diarizer can embed reliably; final remainders
    /// below this are zero-padded up to it when diarization is on.
    pub min_chunk_duration_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enable_transcription: true,
            enable_diarization: true,
            enable_system_audio: true,
            chunk_duration_secs: 5.0,
            min_chunk_duration_secs: 3.0,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.chunk_duration_secs.is_finite() || self.chunk_duration_secs <= 0.0 {
            return Err(SessionError::InvalidConfig(format!(
                "chunk_duration_secs must be positive, got {}",
                self.chunk_duration_secs
            )));
        }
        if !self.min_chunk_duration_secs.is_finite() || self.min_chunk_duration_secs <= 0.0 {
            return Err(SessionError::InvalidConfig(format!(
                "min_chunk_duration_secs must be positive, got {}",
                self.min_chunk_duration_secs
            )));
        }
        if self.min_chunk_duration_secs > self.chunk_duration_secs {
            return Err(SessionError::InvalidConfig(format!(
                "min_chunk_duration_secs ({}) exceeds chunk_duration_secs ({})",
                self.min_chunk_duration_secs, self.chunk_duration_secs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_chunk_duration_rejected() {
        let config = SessionConfig {
            chunk_duration_secs: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SessionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_min_above_chunk_rejected() {
        let config = SessionConfig {
            chunk_duration_secs: 2.0,
            min_chunk_duration_secs: 3.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serde_defaults_fill_missing_fields() {
        let config: SessionConfig = serde_json::from_str("{\"enable_diarization\":false}").unwrap();
        assert!(!config.enable_diarization);
        assert!(config.enable_transcription);
        assert_eq!(config.chunk_duration_secs, 5.0);
    }
}
