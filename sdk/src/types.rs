//! Action and observation types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of action the surface driver can perform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    OpenUrl,
    ClickText,
    FillInput,
    PressKey,
    AcceptCookies,
    Wait,
    Noop,
    Stop,
    UploadFile,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::OpenUrl => "openUrl",
            ActionKind::ClickText => "clickText",
            ActionKind::FillInput => "fillInput",
            ActionKind::PressKey => "pressKey",
            ActionKind::AcceptCookies => "acceptCookies",
            ActionKind::Wait => "wait",
            ActionKind::Noop => "noop",
            ActionKind::Stop => "stop",
            ActionKind::UploadFile => "uploadFile",
        }
    }

    /// Arguments a driver needs to perform this kind
    pub fn required_args(&self) -> &'static [&'static str] {
        match self {
            ActionKind::OpenUrl => &["url"],
            ActionKind::ClickText => &["text"],
            ActionKind::FillInput => &["hint", "value"],
            ActionKind::PressKey => &["key"],
            ActionKind::UploadFile => &["hint", "path"],
            _ => &[],
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ActionError;

    /// Accepts the camelCase wire names as well as snake_case spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "openurl" | "goto" | "navigate" => Ok(ActionKind::OpenUrl),
            "clicktext" | "click" => Ok(ActionKind::ClickText),
            "fillinput" | "fill" | "type" => Ok(ActionKind::FillInput),
            "presskey" | "press" => Ok(ActionKind::PressKey),
            "acceptcookies" => Ok(ActionKind::AcceptCookies),
            "wait" => Ok(ActionKind::Wait),
            "noop" => Ok(ActionKind::Noop),
            "stop" | "done" | "finish" => Ok(ActionKind::Stop),
            "uploadfile" | "upload" => Ok(ActionKind::UploadFile),
            _ => Err(ActionError::UnknownKind(s.to_string())),
        }
    }
}

/// One instruction for the surface driver
///
/// Arguments are a string-keyed map so drivers can evolve without breaking
/// the wire format. A `BTreeMap` keeps serialization order stable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

impl Action {
    /// Create an action without arguments
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            args: BTreeMap::new(),
        }
    }

    /// Add an argument
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn open_url(url: impl Into<String>) -> Self {
        Self::new(ActionKind::OpenUrl).with_arg("url", url)
    }

    pub fn click_text(text: impl Into<String>) -> Self {
        Self::new(ActionKind::ClickText).with_arg("text", text)
    }

    pub fn fill_input(hint: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ActionKind::FillInput)
            .with_arg("hint", hint)
            .with_arg("value", value)
    }

    pub fn press_key(key: impl Into<String>) -> Self {
        Self::new(ActionKind::PressKey).with_arg("key", key)
    }

    pub fn accept_cookies() -> Self {
        Self::new(ActionKind::AcceptCookies)
    }

    pub fn wait(millis: u64) -> Self {
        Self::new(ActionKind::Wait).with_arg("ms", millis.to_string())
    }

    pub fn noop() -> Self {
        Self::new(ActionKind::Noop)
    }

    /// Terminal action; `reason` is kept for provenance only
    pub fn stop(reason: impl Into<String>) -> Self {
        Self::new(ActionKind::Stop).with_arg("reason", reason)
    }

    pub fn upload_file(hint: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(ActionKind::UploadFile)
            .with_arg("hint", hint)
            .with_arg("path", path)
    }

    pub fn is_stop(&self) -> bool {
        self.kind == ActionKind::Stop
    }

    /// Get an optional argument
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }

    /// Get a required argument
    pub fn require_arg(&self, key: &str) -> Result<&str, ActionError> {
        self.arg(key)
            .ok_or_else(|| ActionError::MissingArgument(self.kind, key.to_string()))
    }

    /// Check that every argument the kind needs is present
    pub fn validate(&self) -> Result<(), ActionError> {
        for key in self.kind.required_args() {
            self.require_arg(key)?;
        }
        Ok(())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.args.is_empty() {
            let rendered: Vec<String> = self
                .args
                .iter()
                .map(|(k, v)| format!("{}={:?}", k, v))
                .collect();
            write!(f, "({})", rendered.join(", "))?;
        }
        Ok(())
    }
}

/// Action-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Unknown action kind: {0}")]
    UnknownKind(String),

    #[error("{0} requires '{1}' argument")]
    MissingArgument(ActionKind, String),
}

/// Snapshot of the surface at one instant
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub visible_text: String,
    #[serde(default)]
    pub clickable_labels: Vec<String>,
    #[serde(default)]
    pub input_hints: Vec<String>,
}

impl Observation {
    /// An observation with nothing known about the surface.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.url.is_empty() && self.title.is_empty() && self.visible_text.is_empty()
    }

    /// Lowercased host of `url`, without port or credentials.
    pub fn host(&self) -> Option<String> {
        let rest = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let host = authority.rsplit('@').next().unwrap_or_default();
        let host = host.split(':').next().unwrap_or_default();
        if host.is_empty() {
            None
        } else {
            Some(host.to_ascii_lowercase())
        }
    }

    /// Path component of `url` (always starts with `/` when present).
    pub fn path(&self) -> &str {
        let rest = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        match rest.find('/') {
            Some(idx) => {
                let path = &rest[idx..];
                let end = path.find(['?', '#']).unwrap_or(path.len());
                &path[..end]
            }
            None => "",
        }
    }

    /// Case-insensitive check against the title and visible text.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        self.title.to_lowercase().contains(&needle)
            || self.visible_text.to_lowercase().contains(&needle)
    }
}
