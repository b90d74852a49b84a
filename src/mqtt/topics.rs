//! Topic layout under the configured prefix.

/// Builds every topic the bridge publishes or subscribes to.
///
/// All topics live under `{prefix}/intellichem`.
///
/// # Examples
///
/// ```
/// use intellichem::mqtt::Topics;
///
/// let topics = Topics::new("pool");
/// assert_eq!(topics.state("ph/level"), "pool/intellichem/ph/level");
/// assert_eq!(topics.command_name("pool/intellichem/set/ph_setpoint"), Some("ph_setpoint"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topics {
    root: String,
}

impl Topics {
    /// Topics under `{prefix}/intellichem`.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            root: format!("{}/intellichem", prefix.trim_end_matches('/')),
        }
    }

    /// Common root of every topic.
    #[must_use]
    pub fn root(&self) -> &str { &self.root }

    /// State topic at `path` below the root.
    #[must_use]
    pub fn state(&self, path: &str) -> String { format!("{}/{path}", self.root) }

    /// Aggregate JSON status.
    #[must_use]
    pub fn status(&self) -> String { self.state("status") }

    /// Bridge availability, also the last will.
    #[must_use]
    pub fn availability(&self) -> String { self.state("availability") }

    /// Command results.
    #[must_use]
    pub fn command_result(&self) -> String { self.state("command_result") }

    /// Command topic for `name`.
    #[must_use]
    pub fn command(&self, name: &str) -> String { format!("{}/set/{name}", self.root) }

    /// Subscription filter matching every command topic.
    #[must_use]
    pub fn command_filter(&self) -> String { self.command("+") }

    /// Command name carried by `topic`, if it is a command topic.
    #[must_use]
    pub fn command_name<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let name = topic
            .strip_prefix(self.root.as_str())?
            .strip_prefix("/set/")?;
        (!name.is_empty() && !name.contains('/')).then_some(name)
    }
}
