use serde::{Deserialize, Serialize};

// -- Auth --

/// Credentials for both signup (`POST /users`) and login (`PATCH /users`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

/// Opaque session token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "hashedToken")]
    pub hashed_token: String,
}

impl Token {
    pub fn new(hashed_token: impl Into<String>) -> Self {
        Self {
            hashed_token: hashed_token.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hashed_token
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

// -- Chat --

/// Older clients send the token as `{ "hashedToken": ... }`, newer ones as a
/// bare string. Both are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenRef {
    Plain(String),
    Wrapped(Token),
}

impl TokenRef {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain(s) => s,
            Self::Wrapped(t) => t.as_str(),
        }
    }
}

/// A chat post attempt, over HTTP (`POST /chat`) or as a WebSocket text frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContainer {
    pub token: TokenRef,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_wire_shape() {
        let json = serde_json::to_string(&Token::new("abc")).unwrap();
        assert_eq!(json, r#"{"hashedToken":"abc"}"#);
    }

    #[test]
    fn container_accepts_both_token_forms() {
        let plain: MessageContainer =
            serde_json::from_str(r#"{"token":"abc","content":"hi"}"#).unwrap();
        assert_eq!(plain.token.as_str(), "abc");

        let wrapped: MessageContainer =
            serde_json::from_str(r#"{"token":{"hashedToken":"abc"},"content":"hi"}"#).unwrap();
        assert_eq!(wrapped.token.as_str(), "abc");
    }

    #[test]
    fn auth_request_rejects_unknown_fields() {
        let res = serde_json::from_str::<AuthRequest>(
            r#"{"username":"a","password":"b","admin":true}"#,
        );
        assert!(res.is_err());
    }
}
