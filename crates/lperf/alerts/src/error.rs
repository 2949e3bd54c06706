use thiserror::Error;

/// Errors from rule management and alert dispatch.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert rule not found: {0}")]
    RuleNotFound(String),

    #[error("alert channel not found: {0}")]
    ChannelNotFound(String),

    #[error("rule template not found: {0}")]
    TemplateNotFound(String),

    #[error("invalid alert rule: {0}")]
    InvalidRule(String),

    #[error("channel {channel} failed: {reason}")]
    ChannelFailed { channel: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for alert results.
pub type AlertResult<T> = Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = AlertError::RuleNotFound("cpu_gt_80".into());
        assert_eq!(err.to_string(), "alert rule not found: cpu_gt_80");

        let err = AlertError::ChannelFailed {
            channel: "file_2".into(),
            reason: "disk full".into(),
        };
        assert_eq!(err.to_string(), "channel file_2 failed: disk full");
    }
}
