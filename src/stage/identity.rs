//! The `Stage` token.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A named point in a lifecycle sequence.
///
/// Two stages are the same stage when their names match ignoring case, so
/// `Stage::new("START") == Stage::START`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stage {
    name: Cow<'static, str>,
}

impl Stage {
    /// Configuration stage, runs before anything is started.
    pub const CONFIGURE: Stage = Stage::from_static("configure");
    /// Start stage.
    pub const START: Stage = Stage::from_static("start");
    /// Announce stage, used by the service discovery profile.
    pub const ANNOUNCE: Stage = Stage::from_static("announce");
    /// Unannounce stage, used by the service discovery profile.
    pub const UNANNOUNCE: Stage = Stage::from_static("unannounce");
    /// Stop stage. Listeners on this stage run in reverse registration order.
    pub const STOP: Stage = Stage::from_static("stop");

    /// Create a stage from any name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }

    /// Create a stage from a static name. Usable in `const` context.
    pub const fn from_static(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
        }
    }

    /// The name this stage was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn folded(&self) -> impl Iterator<Item = char> + '_ {
        self.name.chars().flat_map(char::to_lowercase)
    }
}

impl PartialEq for Stage {
    fn eq(&self, other: &Self) -> bool {
        self.folded().eq(other.folded())
    }
}

impl Eq for Stage {}

impl Hash for Stage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.folded() {
            c.hash(state);
        }
        // Terminator keeps the hash prefix-free, like `str`'s own impl.
        state.write_u8(0xff);
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&'static str> for Stage {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for Stage {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}
