//! Public form submissions.
//!
//! Contact, newsletter and generic form posts are handed to a [`FormSink`] once they have
//! cleared the rate limiter. What happens next (mail, CRM, queue) is the sink's business.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::StoreError;

/// Which public form a submission came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormKind {
    Contact,
    Newsletter,
    /// A generic form, named by its route segment.
    General(String),
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormKind::Contact => f.write_str("contact"),
            FormKind::Newsletter => f.write_str("newsletter"),
            FormKind::General(name) => write!(f, "general/{name}"),
        }
    }
}

/// Receives accepted submissions.
#[async_trait]
pub trait FormSink: Send + Sync {
    async fn submit(&self, kind: FormKind, fields: Map<String, Value>) -> Result<(), StoreError>;
}

/// Sink that only logs. Field values are not logged, only their names.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFormSink;

#[async_trait]
impl FormSink for TracingFormSink {
    async fn submit(&self, kind: FormKind, fields: Map<String, Value>) -> Result<(), StoreError> {
        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        info!(target: "forecourt::forms", form = %kind, fields = ?names, "form submission accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_display_their_route() {
        assert_eq!(FormKind::Contact.to_string(), "contact");
        assert_eq!(FormKind::Newsletter.to_string(), "newsletter");
        assert_eq!(FormKind::General("finance".into()).to_string(), "general/finance");
    }

    #[tokio::test]
    async fn tracing_sink_accepts_everything() {
        let mut fields = Map::new();
        fields.insert("email".into(), Value::from("a@example.com"));
        assert!(TracingFormSink.submit(FormKind::Newsletter, fields).await.is_ok());
    }
}
