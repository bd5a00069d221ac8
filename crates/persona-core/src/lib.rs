//! persona-core: domain model, persistence, and coordination primitives shared by
//! the dispatch service, worker runtime, and query service.
//!
//! One crate, one submodule per concern, `sled` as the sole persistence engine,
//! `thiserror` leaf errors throughout.

pub mod broker;
pub mod domain;
pub mod error;
pub mod idempotency;
pub mod lock;
pub mod query;
pub mod repository;

pub use domain::{
    characteristics::{ActivitySphere, Characteristics, Gender, IncomeLevel},
    feedback_result::{FeedbackResult, FeedbackResultStatus},
    feedback_session::{AggregatedInsights, FeedbackSession, SessionStatus, ThemeMention},
    persona::{Persona, PersonaStatus},
    product::Product,
    user::User,
};
pub use error::{CoreError, ErrorKind};
