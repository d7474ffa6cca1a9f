//! In-process stand-in for the normalization services

use kgx_ingest::error::LookupError;
use kgx_ingest::models::{NormalizationRecord, PredicateRecord};
use kgx_ingest::services::{BatchAnswer, LookupService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Resolver<R> = Box<dyn Fn(&str) -> Option<R> + Send + Sync>;
type FailurePredicate = Box<dyn Fn(&[String]) -> bool + Send + Sync>;

/// Fake batch service
///
/// Every batch it receives is recorded. A batch for which the failure
/// predicate holds answers with a 500.
pub struct FakeService<R> {
    resolver: Resolver<R>,
    failure: FailurePredicate,
    delay: Duration,
    batches: Mutex<Vec<Vec<String>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl<R> FakeService<R> {
    pub fn new(resolver: impl Fn(&str) -> Option<R> + Send + Sync + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
            failure: Box::new(|_| false),
            delay: Duration::ZERO,
            batches: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing_when(mut self, predicate: impl Fn(&[String]) -> bool + Send + Sync + 'static) -> Self {
        self.failure = Box::new(predicate);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    /// Every id sent, in request order
    pub fn requested_ids(&self) -> Vec<String> {
        self.batches().into_iter().flatten().collect()
    }

    pub fn request_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl<R: Clone + Send + Sync + 'static> LookupService for FakeService<R> {
    type Record = R;

    fn name(&self) -> &'static str {
        "fake"
    }

    async fn lookup_batch(&self, ids: &[String]) -> Result<BatchAnswer<R>, LookupError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.batches.lock().unwrap().push(ids.to_vec());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if (self.failure)(ids) {
            return Err(LookupError::Status(500, "fake failure".to_string()));
        }

        Ok(ids.iter().map(|id| (id.clone(), (self.resolver)(id))).collect())
    }
}

/// Node service: `UNKNOWN*` ids have no mapping, everything else maps to
/// `CANON:<id>` with a label and one category
pub fn node_service() -> FakeService<NormalizationRecord> {
    FakeService::new(|id| {
        if id.starts_with("UNKNOWN") {
            return None;
        }
        Some(
            NormalizationRecord::new(format!("CANON:{}", id))
                .with_label(format!("label {}", id))
                .with_categories(["biolink:NamedThing"])
                .with_equivalent_identifiers([format!("CANON:{}", id), id.to_string()]),
        )
    })
}

/// Predicate service: `subClassOf` maps to `biolink:subclass_of`, nothing
/// else resolves
pub fn predicate_service() -> FakeService<PredicateRecord> {
    FakeService::new(|relation| {
        (relation == "subClassOf").then(|| PredicateRecord {
            identifier: "biolink:subclass_of".to_string(),
            label: Some("subclass of".to_string()),
        })
    })
}

/// `ID:0001` .. `ID:<n>`, zero-padded so lexical and numeric order agree
pub fn numbered_ids(range: std::ops::RangeInclusive<usize>) -> Vec<String> {
    range.map(|n| format!("ID:{:04}", n)).collect()
}

/// Numeric part of an id built by [`numbered_ids`]
pub fn id_number(id: &str) -> usize {
    id.trim_start_matches("ID:").parse().unwrap_or(0)
}
