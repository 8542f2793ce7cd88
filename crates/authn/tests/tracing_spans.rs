//! Integration test verifying that `#[instrument]` annotations on the
//! caching token store produce the expected spans and never record secrets.

#![allow(clippy::expect_used)]

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use svcauth_authn::{CachingTokenStore, TokenCacheConfig};
use svcauth_storage::testutil::{TestBackend, VALID_SECRET, make_account, make_token};
use tracing::{
    Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer — records span names and their field values
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
    fields: Arc<Mutex<Vec<String>>>,
}

struct FieldRecorder<'a>(&'a mut Vec<String>);

impl Visit for FieldRecorder<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.push(format!("{}={value:?}", field.name()));
    }
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
        let mut fields = self.fields.lock().expect("lock poisoned");
        attrs.record(&mut FieldRecorder(&mut fields));
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut fields = self.fields.lock().expect("lock poisoned");
        event.record(&mut FieldRecorder(&mut fields));
    }
}

fn store(backend: &TestBackend) -> CachingTokenStore {
    CachingTokenStore::new(Arc::new(backend.clone()), TokenCacheConfig::default())
        .expect("store")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn authenticate_creates_span_with_qualified_name() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let fields = Arc::clone(&collector.fields);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let account = make_account("svc", "acct");
    let backend = TestBackend::new().with_valid(&account, "token1");
    let store = store(&backend);
    let authenticated = store
        .authenticate(&make_token(&account, "token1", VALID_SECRET))
        .await
        .expect("authenticate should succeed");
    assert!(authenticated);

    let recorded = spans.lock().expect("lock poisoned");
    assert!(
        recorded.iter().any(|s| s == "authenticate"),
        "expected an 'authenticate' span, got: {recorded:?}"
    );

    let fields = fields.lock().expect("lock poisoned");
    assert!(
        fields.iter().any(|f| f.contains("svc/acct/token1")),
        "expected the qualified name to be recorded, got: {fields:?}"
    );
    assert!(
        fields.iter().all(|f| !f.contains(VALID_SECRET)),
        "secret leaked into trace output: {fields:?}"
    );
}

#[tokio::test]
async fn invalidate_emits_audit_event() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let fields = Arc::clone(&collector.fields);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = store(&TestBackend::new());
    store.invalidate(&["svc/acct/"]).await;
    store.invalidate_all().await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(
        recorded.iter().any(|s| s == "invalidate"),
        "expected an 'invalidate' span, got: {recorded:?}"
    );
    assert!(
        recorded.iter().any(|s| s == "invalidate_all"),
        "expected an 'invalidate_all' span, got: {recorded:?}"
    );

    let fields = fields.lock().expect("lock poisoned");
    assert!(
        fields.iter().any(|f| f == "audit.action=\"invalidate_token_cache\""),
        "expected an invalidation audit event, got: {fields:?}"
    );
    assert!(
        fields.iter().any(|f| f == "audit.action=\"clear_token_cache\""),
        "expected a clear audit event, got: {fields:?}"
    );
}
