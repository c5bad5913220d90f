//! Environment facts that salt the linker checksum.

/// What the host knows about the browsing environment. None of it is ever
/// transmitted; it only feeds the checksum so that a linker value is tied to
/// the agent that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Environment {
    pub user_agent: String,
    /// Offset from UTC in minutes, with the sign convention of the host's
    /// date facility (e.g. `-540` for UTC+9).
    pub timezone_offset: i32,
    pub language: String,
}

impl Environment {
    pub fn new(
        user_agent: impl Into<String>,
        timezone_offset: i32,
        language: impl Into<String>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            timezone_offset,
            language: language.into(),
        }
    }

    /// `user_agent*timezone_offset*language`
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let delimiter = crate::constants::DELIMITER;
        format!(
            "{}{delimiter}{}{delimiter}{}",
            self.user_agent, self.timezone_offset, self.language
        )
    }
}
