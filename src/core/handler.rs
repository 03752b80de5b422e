//! Interrupt request handling
//!
//! When the host raises an interrupt request the session asks its handler
//! what to type. Handlers see the screen text and either return a key
//! sequence to submit or decline.

use regex::{Regex, RegexBuilder};

use crate::core::error::{Error, Result};

/// Capability consulted on host interrupt requests
#[cfg_attr(test, mockall::automock)]
pub trait RequestHandler: Send + Sync {
    /// Key sequence to submit for this screen, or `None` to leave it alone
    fn handle_request(&self, screen_text: &str) -> Option<String>;
}

/// Handler that never answers
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclineHandler;

impl RequestHandler for DeclineHandler {
    fn handle_request(&self, _screen_text: &str) -> Option<String> {
        None
    }
}

impl<F> RequestHandler for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn handle_request(&self, screen_text: &str) -> Option<String> {
        self(screen_text)
    }
}

/// What a screen trigger looks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenCondition {
    /// Text appears (case-sensitive)
    Text(String),
    /// Text appears (case-insensitive)
    TextIgnoreCase(String),
    /// Regular expression matches
    Regex(String),
}

#[derive(Debug)]
enum Matcher {
    Text(String),
    Lower(String),
    Regex(Regex),
}

impl Matcher {
    fn compile(condition: &ScreenCondition) -> Result<Self> {
        Ok(match condition {
            ScreenCondition::Text(t) => Self::Text(t.clone()),
            ScreenCondition::TextIgnoreCase(t) => Self::Lower(t.to_lowercase()),
            ScreenCondition::Regex(p) => Self::Regex(
                RegexBuilder::new(p)
                    .multi_line(true)
                    .build()
                    .map_err(|e| Error::Configuration(format!("Invalid trigger pattern '{p}': {e}")))?,
            ),
        })
    }

    fn matches(&self, screen: &str, lowered: &str) -> bool {
        match self {
            Self::Text(t) => screen.contains(t.as_str()),
            Self::Lower(t) => lowered.contains(t.as_str()),
            Self::Regex(re) => re.is_match(screen),
        }
    }
}

/// One trigger: a condition and the keys to type when it matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenTrigger {
    /// Trigger name for logs
    pub name: String,
    /// Condition to match
    pub condition: ScreenCondition,
    /// Key sequence to submit
    pub response: String,
}

impl ScreenTrigger {
    /// Create a trigger
    pub fn new(name: impl Into<String>, condition: ScreenCondition, response: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition,
            response: response.into(),
        }
    }
}

/// Answers interrupt requests from an ordered list of screen triggers.
/// The first matching trigger wins; with no match the handler declines.
#[derive(Debug, Default)]
pub struct ScreenTriggerHandler {
    triggers: Vec<(ScreenTrigger, Matcher)>,
}

impl ScreenTriggerHandler {
    /// Empty handler (declines everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from trigger definitions, compiling patterns up front
    pub fn from_triggers(triggers: impl IntoIterator<Item = ScreenTrigger>) -> Result<Self> {
        let mut handler = Self::new();
        for trigger in triggers {
            handler.add(trigger)?;
        }
        Ok(handler)
    }

    /// Append a trigger. Invalid regular expressions are a configuration error.
    pub fn add(&mut self, trigger: ScreenTrigger) -> Result<()> {
        let matcher = Matcher::compile(&trigger.condition)?;
        self.triggers.push((trigger, matcher));
        Ok(())
    }

    /// Append a trigger, builder style
    pub fn with(mut self, trigger: ScreenTrigger) -> Result<Self> {
        self.add(trigger)?;
        Ok(self)
    }

    /// Triggers in match order
    pub fn triggers(&self) -> impl Iterator<Item = &ScreenTrigger> {
        self.triggers.iter().map(|(t, _)| t)
    }

    /// Number of triggers
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    /// No triggers configured
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

impl RequestHandler for ScreenTriggerHandler {
    fn handle_request(&self, screen_text: &str) -> Option<String> {
        let lowered = screen_text.to_lowercase();
        self.triggers
            .iter()
            .find(|(_, m)| m.matches(screen_text, &lowered))
            .map(|(trigger, _)| {
                tracing::debug!("Screen trigger '{}' matched", trigger.name);
                trigger.response.clone()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: &str = "Sign On\nSystem . . . . : PUB400\nPress Enter to continue.";

    #[test]
    fn test_decline_handler() {
        assert_eq!(DeclineHandler.handle_request(SCREEN), None);
    }

    #[test]
    fn test_closure_handler() {
        let handler = |screen: &str| screen.contains("PUB400").then(|| "[enter]".to_string());
        assert_eq!(handler.handle_request(SCREEN).as_deref(), Some("[enter]"));
        assert_eq!(handler.handle_request("other"), None);
    }

    #[test]
    fn test_first_matching_trigger_wins() {
        let handler = ScreenTriggerHandler::from_triggers([
            ScreenTrigger::new("missing", ScreenCondition::Text("Main Menu".into()), "[pf3]"),
            ScreenTrigger::new("press", ScreenCondition::TextIgnoreCase("press ENTER".into()), "[enter]"),
            ScreenTrigger::new("system", ScreenCondition::Regex(r"^System .*PUB\d+$".into()), "[pf12]"),
        ])
        .unwrap();
        assert_eq!(handler.len(), 3);
        assert_eq!(handler.handle_request(SCREEN).as_deref(), Some("[enter]"));
    }

    #[test]
    fn test_regex_is_multiline() {
        let handler = ScreenTriggerHandler::new()
            .with(ScreenTrigger::new("sys", ScreenCondition::Regex(r"^System .*PUB\d+$".into()), "x"))
            .unwrap();
        assert_eq!(handler.handle_request(SCREEN).as_deref(), Some("x"));
        assert_eq!(handler.handle_request("nothing here"), None);
    }

    #[test]
    fn test_invalid_regex_is_configuration_error() {
        let err = ScreenTriggerHandler::new()
            .with(ScreenTrigger::new("bad", ScreenCondition::Regex("(".into()), "x"))
            .unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_mock_handler() {
        let mut mock = MockRequestHandler::new();
        mock.expect_handle_request()
            .withf(|s: &str| s.contains("Sign On"))
            .times(1)
            .returning(|_| Some("[pf3]".to_string()));
        assert_eq!(mock.handle_request(SCREEN).as_deref(), Some("[pf3]"));
    }
}
