use protocol::{Anchoring, Catalog, DEFAULT_PROMPT};
use std::time::Duration;

/// Default keepalive period, just under the server's one hour idle limit
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(59 * 60);
pub const DEFAULT_KEEPALIVE_COMMAND: &str = "uptime";
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Commands sent once the session reaches the idle prompt
pub const DEFAULT_SETUP_COMMANDS: [&str; 3] = ["set prompt", "set seek 0", "set style 12"];

/// Tunables for one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub prompt: String,
    pub anchoring: Anchoring,
    pub keepalive_interval: Duration,
    pub keepalive_command: String,
    pub setup_commands: Vec<String>,
    pub read_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            anchoring: Anchoring::default(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            keepalive_command: DEFAULT_KEEPALIVE_COMMAND.to_string(),
            setup_commands: DEFAULT_SETUP_COMMANDS.iter().map(|c| c.to_string()).collect(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn with_anchoring(mut self, anchoring: Anchoring) -> Self {
        self.anchoring = anchoring;
        self
    }

    #[must_use]
    pub fn with_keepalive(mut self, interval: Duration, command: impl Into<String>) -> Self {
        self.keepalive_interval = interval;
        self.keepalive_command = command.into();
        self
    }

    #[must_use]
    pub fn with_setup_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.setup_commands = commands.into_iter().map(Into::into).collect();
        self
    }

    /// Zero is bumped to one byte
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.anchoring)
    }
}
