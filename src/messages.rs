//! Outbound notebook messages
//!
//! What the kernel publishes while a cell runs. The host transport decides
//! how these reach the notebook; the kernel only hands them to an
//! [`IopubSink`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::mpsc::UnboundedSender;

/// A message on the IOPub channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg_type", content = "content", rename_all = "snake_case")]
pub enum IopubMessage {
    Stream(StreamContent),
    DisplayData(DisplayData),
    Error(ErrorContent),
}

impl IopubMessage {
    /// Text on stdout
    pub fn stdout(text: impl Into<String>) -> Self {
        IopubMessage::Stream(StreamContent {
            name: StreamName::Stdout,
            text: text.into(),
        })
    }

    pub fn msg_type(&self) -> &'static str {
        match self {
            IopubMessage::Stream(_) => "stream",
            IopubMessage::DisplayData(_) => "display_data",
            IopubMessage::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamContent {
    pub name: StreamName,
    pub text: String,
}

/// Rich output keyed by MIME type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayData {
    pub data: BTreeMap<String, String>,
    pub metadata: Map<String, Value>,
}

impl DisplayData {
    /// A single representation
    pub fn single(mime_type: impl Into<String>, payload: impl Into<String>) -> Self {
        let mut data = BTreeMap::new();
        data.insert(mime_type.into(), payload.into());
        Self {
            data,
            metadata: Map::new(),
        }
    }

    /// The first MIME type carried, if any
    pub fn mime_type(&self) -> Option<&str> {
        self.data.keys().next().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContent {
    pub execution_count: u64,
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

/// Receives everything the kernel publishes, in order
pub trait IopubSink: Send + Sync {
    fn publish(&self, message: IopubMessage);
}

impl IopubSink for UnboundedSender<IopubMessage> {
    fn publish(&self, message: IopubMessage) {
        if self.send(message).is_err() {
            debug!("IOPub receiver dropped, message discarded");
        }
    }
}
