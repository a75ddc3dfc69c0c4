use std::fmt;

#[derive(Debug)]
pub enum CoreError {
    InvalidMessage(MessageError),
    Config(ConfigError),
    Engine(EngineError),
}

/// Why an inbound control message was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageError {
    /// The message was not valid JSON or did not match any known shape.
    Malformed { reason: String },
    /// The `type` tag named a message kind this core does not handle.
    UnknownKind { kind: String },
    /// A message kind that requires `data` arrived without it.
    MissingPayload { kind: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Malformed { reason: String },
    InvalidSampleRate { value: u32 },
    InvalidRootFrequency { value: f64 },
    InvalidInitGain { value: f64 },
}

/// A failure reported by the audio-rendering engine collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        EngineError {
            message: message.into(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidMessage(e) => write!(f, "Invalid message: {e}"),
            CoreError::Config(e) => write!(f, "Config error: {e}"),
            CoreError::Engine(e) => write!(f, "Engine error: {e}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageError::Malformed { reason } => write!(f, "malformed message: {reason}"),
            MessageError::UnknownKind { kind } => write!(f, "unknown message type '{kind}'"),
            MessageError::MissingPayload { kind } => {
                write!(f, "message type '{kind}' requires a 'data' payload")
            }
        }
    }
}

impl std::error::Error for MessageError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Malformed { reason } => write!(f, "malformed config: {reason}"),
            ConfigError::InvalidSampleRate { value } => {
                write!(f, "sample rate must be between 3000 and 768000 Hz, got {value}")
            }
            ConfigError::InvalidRootFrequency { value } => {
                write!(f, "root frequency must be a positive number, got {value}")
            }
            ConfigError::InvalidInitGain { value } => {
                write!(f, "init gain must be finite, got {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EngineError {}

impl From<MessageError> for CoreError {
    fn from(e: MessageError) -> Self {
        CoreError::InvalidMessage(e)
    }
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

impl From<EngineError> for CoreError {
    fn from(e: EngineError) -> Self {
        CoreError::Engine(e)
    }
}
