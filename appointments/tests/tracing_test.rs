//! Operation spans.
//!
//! Every public service operation opens a span tagged with its `operation`
//! name. A small layer records those tags while the operations run on the
//! test thread.
//!
//! Run with: `cargo test --test tracing_test`

#![allow(clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/panic

mod common;

use appointments::{ListFilter, UserId};
use common::{EXHIBITOR, Harness, REQUESTER, status};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::span;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Collects the `operation` field of every span opened.
#[derive(Clone, Default)]
struct OperationSpans(Arc<Mutex<Vec<String>>>);

struct OperationField(Option<String>);

impl Visit for OperationField {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "operation" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "operation" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for OperationSpans {
    fn on_new_span(&self, attrs: &span::Attributes<'_>, _id: &span::Id, _ctx: Context<'_, S>) {
        let mut operation = OperationField(None);
        attrs.record(&mut operation);
        if let Some(operation) = operation.0 {
            self.0.lock().unwrap().push(operation);
        }
    }
}

#[tokio::test]
async fn test_every_operation_opens_a_span() {
    let spans = OperationSpans::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(spans.clone()));
    let harness = Harness::new();

    let booked = harness.book(REQUESTER, "09:00").await;
    harness
        .service
        .list_appointments(&ListFilter::Exhibitor(UserId::new(EXHIBITOR)))
        .await
        .unwrap();
    harness
        .update(booked.id, EXHIBITOR, status("CONFIRMED"))
        .await
        .unwrap();
    harness.stored(booked.id).await;

    assert_eq!(*spans.0.lock().unwrap(), vec!["create", "list", "update", "get"]);
}
