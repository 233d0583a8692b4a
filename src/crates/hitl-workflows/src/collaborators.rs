//! Services the bundled workflows call into
//!
//! Search, text generation, order execution and chat replies are outside the
//! engine's concern. Each is a trait so deployments can plug in real
//! backends; the implementations here are deterministic and offline, which
//! is what the CLI, the server defaults and the tests use.

use crate::error::{CollaboratorError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Looks up background material for a query
#[async_trait]
pub trait Researcher: Send + Sync {
    async fn search(&self, query: &str) -> Result<String>;
}

/// Writes and rewrites posts
#[async_trait]
pub trait PostWriter: Send + Sync {
    async fn draft(&self, topic: &str, research: &str) -> Result<String>;

    /// Rewrite `previous`, taking the reviewer's suggestion into account
    async fn revise(
        &self,
        topic: &str,
        research: &str,
        previous: &str,
        suggestion: Option<&str>,
    ) -> Result<String>;
}

/// A buy order the approver has signed off on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub stock_name: String,
    pub price: f64,
    pub quantity: u64,
}

/// Executes approved orders
#[async_trait]
pub trait Broker: Send + Sync {
    /// Returns a confirmation reference
    async fn buy(&self, order: &Order) -> Result<String>;
}

/// One chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Produces the assistant's next chat message
#[async_trait]
pub trait Responder: Send + Sync {
    async fn reply(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Canned research notes
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineResearcher;

#[async_trait]
impl Researcher for OfflineResearcher {
    async fn search(&self, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            return Err(CollaboratorError::InvalidRequest("empty search query".to_string()));
        }
        Ok(format!("No live search backend configured; notes for \"{}\" are unavailable.", query))
    }
}

/// Assembles posts from fixed templates
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateWriter;

#[async_trait]
impl PostWriter for TemplateWriter {
    async fn draft(&self, topic: &str, research: &str) -> Result<String> {
        let sections = research.split("\n\n").filter(|s| !s.trim().is_empty()).count();
        Ok(format!(
            "Thoughts on {}.\n\nDrawing on {} research notes, here is where things stand and where they are heading.\n\n#{}",
            topic,
            sections,
            hashtag(topic)
        ))
    }

    async fn revise(
        &self,
        topic: &str,
        _research: &str,
        previous: &str,
        suggestion: Option<&str>,
    ) -> Result<String> {
        Ok(match suggestion {
            Some(suggestion) => format!("{}\n\nRevised for {}: {}", previous, topic, suggestion),
            None => format!("{}\n\nRevised for {}.", previous, topic),
        })
    }
}

fn hashtag(topic: &str) -> String {
    topic
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Records orders instead of placing them
#[derive(Debug, Default)]
pub struct PaperBroker {
    orders: Mutex<Vec<Order>>,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().clone()
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().len()
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn buy(&self, order: &Order) -> Result<String> {
        let mut orders = self.orders.lock();
        orders.push(order.clone());
        Ok(format!("paper-{}", orders.len()))
    }
}

/// Answers by echoing the latest user message
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoResponder;

#[async_trait]
impl Responder for EchoResponder {
    async fn reply(&self, messages: &[ChatMessage]) -> Result<String> {
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .ok_or_else(|| CollaboratorError::InvalidRequest("no user message to answer".to_string()))?;
        Ok(format!("You said: {}", last.content))
    }
}

/// The set of services handed to the bundled workflows
#[derive(Clone)]
pub struct Collaborators {
    pub researcher: Arc<dyn Researcher>,
    pub writer: Arc<dyn PostWriter>,
    pub broker: Arc<dyn Broker>,
    pub responder: Arc<dyn Responder>,
}

impl Collaborators {
    /// Deterministic local implementations for every service
    pub fn offline() -> Self {
        Self {
            researcher: Arc::new(OfflineResearcher),
            writer: Arc::new(TemplateWriter),
            broker: Arc::new(PaperBroker::new()),
            responder: Arc::new(EchoResponder),
        }
    }

    pub fn with_researcher(mut self, researcher: Arc<dyn Researcher>) -> Self {
        self.researcher = researcher;
        self
    }

    pub fn with_writer(mut self, writer: Arc<dyn PostWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = broker;
        self
    }

    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = responder;
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::offline()
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
