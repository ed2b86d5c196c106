use crate::types::constants::control_frames;
use crate::types::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol frames the client writes on its own behalf.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// First frame after the socket opens. The token travels here, never in the URL.
    Authenticate { token: String },
    Ping,
    Pong,
}

impl ControlFrame {
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An inbound text frame, classified into transport control vs. application traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Pong,
    Ping,
    Authenticated,
    /// Anything else is passed through verbatim.
    Application(Value),
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;

        let frame = match value.get("type").and_then(Value::as_str) {
            Some(control_frames::PONG) => Self::Pong,
            Some(control_frames::PING) => Self::Ping,
            Some(control_frames::AUTHENTICATED) => Self::Authenticated,
            _ => Self::Application(value),
        };
        Ok(frame)
    }

    pub fn is_control(&self) -> bool {
        !matches!(self, Self::Application(_))
    }
}

/// A STUN/TURN server entry. `urls` may be a single string or a list on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceServer {
    pub urls: IceUrls,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum IceUrls {
    One(String),
    Many(Vec<String>),
}

impl IceServer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: IceUrls::One(url.into()),
            username: None,
            credential: None,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.credential = Some(credential.into());
        self
    }

    pub fn urls(&self) -> Vec<&str> {
        match &self.urls {
            IceUrls::One(url) => vec![url.as_str()],
            IceUrls::Many(urls) => urls.iter().map(String::as_str).collect(),
        }
    }
}

/// A proposed network path for the peer link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
        }
    }
}

/// Frames exchanged on a per-call signaling channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalingFrame {
    /// Sent by the server at connect time; may override the default ICE configuration.
    Connection {
        #[serde(rename = "iceServers", default)]
        ice_servers: Vec<IceServer>,
    },
    Offer {
        sdp: String,
    },
    Answer {
        sdp: String,
    },
    IceCandidate {
        candidate: IceCandidate,
    },
    CallEnd,
    /// Unrecognised `type` values are ignored by the session.
    #[serde(other)]
    Unknown,
}

impl SignalingFrame {
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
