//! Route keys: an HTTP method+path or a socket event name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The HTTP methods a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Lower-case name, as used in route keys.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unsupported method: {other}")),
        }
    }
}

/// The key a pipeline is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteKey {
    /// An HTTP endpoint.
    Http {
        /// Request method.
        method: Method,
        /// Path pattern, matched by the HTTP layer.
        path: String,
    },
    /// A named socket event.
    Event {
        /// Event name.
        name: String,
    },
}

impl RouteKey {
    /// Creates an HTTP route key.
    #[must_use]
    pub fn http(method: Method, path: impl Into<String>) -> Self {
        Self::Http {
            method,
            path: path.into(),
        }
    }

    /// Creates a socket event key.
    #[must_use]
    pub fn event(name: impl Into<String>) -> Self {
        Self::Event { name: name.into() }
    }

    /// Returns the method for HTTP routes.
    #[must_use]
    pub fn method(&self) -> Option<Method> {
        match self {
            Self::Http { method, .. } => Some(*method),
            Self::Event { .. } => None,
        }
    }

    /// Returns true for socket events.
    #[must_use]
    pub fn is_event(&self) -> bool {
        matches!(self, Self::Event { .. })
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { method, path } => write!(f, "{method}:{path}"),
            Self::Event { name } => write!(f, "event:{name}"),
        }
    }
}
