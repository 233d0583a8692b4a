//! # hitl-workflows - Bundled approval workflows
//!
//! Ready-made workflows for the engine in `hitl-core`, each built around a
//! human decision:
//!
//! | Name | Pattern |
//! |---|---|
//! | [`linkedin_post`](post_review) | draft, review, regenerate until approved or out of iterations |
//! | [`purchase_stock`](purchase) | validate an order, place it only after a yes |
//! | [`deployment_approval`](deployment) | one approve/reject gate |
//! | [`chat_approval`](chat) | multi-turn chat, each reply gated |
//! | [`feedback_review`](feedback) | static breakpoint plus state edits |
//!
//! Anything that would talk to the outside world (search, text generation,
//! order execution, chat replies) goes through the traits in
//! [`collaborators`], passed in when the workflows are built.
//!
//! ```rust
//! use hitl_workflows::{builtin_registry, Collaborators};
//!
//! let registry = builtin_registry(&Collaborators::offline()).unwrap();
//! assert!(registry.get("purchase_stock").is_ok());
//! ```

pub mod chat;
pub mod collaborators;
pub mod deployment;
pub mod error;
pub mod feedback;
pub mod post_review;
pub mod purchase;

pub use collaborators::{
    Broker, ChatMessage, Collaborators, EchoResponder, OfflineResearcher, Order, PaperBroker,
    PostWriter, Researcher, Responder, TemplateWriter,
};
pub use error::{CollaboratorError, Result};

use hitl_core::WorkflowRegistry;

/// Registry holding every bundled workflow
pub fn builtin_registry(collaborators: &Collaborators) -> hitl_core::Result<WorkflowRegistry> {
    WorkflowRegistry::new()
        .with(post_review::workflow(collaborators)?)?
        .with(purchase::workflow(collaborators)?)?
        .with(deployment::workflow()?)?
        .with(chat::workflow(collaborators)?)?
        .with(feedback::workflow()?)
}
