use crate::domain::analysis::{AiAnalysis, NewAnalysis};
use crate::domain::event::{Company, Event, Trial};
use crate::error::AnalysisError;
use crate::llm::{AnalysisGenerator, GenerateInput, LlmError};
use std::sync::Arc;

/// Tag stamped onto every persisted analysis.
pub const MODEL_VERSION: &str = "gpt-5-analysis-v1.0";
pub const SOURCES_USED: [&str; 3] = ["clinicaltrials.gov", "fda.gov", "event_metadata"];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The event already has an analysis; raised by the store's uniqueness
    /// constraint, which is the authoritative backstop under concurrency.
    #[error("an analysis already exists for this event")]
    Duplicate,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Read access to the event/company/trial catalog. Absence is `Ok(None)`,
/// never an error.
#[async_trait::async_trait]
pub trait EventDirectory: Send + Sync {
    async fn event(&self, id: &str) -> anyhow::Result<Option<Event>>;
    async fn company(&self, id: &str) -> anyhow::Result<Option<Company>>;
    async fn trial_by_nct_id(&self, nct_id: &str) -> anyhow::Result<Option<Trial>>;
}

/// Write-once analysis persistence, keyed by event id. The store assigns
/// the row id and generation timestamp.
#[async_trait::async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn analysis_for_event(&self, event_id: &str) -> Result<Option<AiAnalysis>, StoreError>;
    async fn insert_analysis(&self, new: NewAnalysis) -> Result<AiAnalysis, StoreError>;
}

/// Orchestrates idempotent analysis generation. All collaborators are
/// injected; a missing generator handle is the not-configured state.
#[derive(Clone)]
pub struct AnalysisService {
    directory: Arc<dyn EventDirectory>,
    store: Arc<dyn AnalysisStore>,
    generator: Option<Arc<dyn AnalysisGenerator>>,
}

impl AnalysisService {
    pub fn new(
        directory: Arc<dyn EventDirectory>,
        store: Arc<dyn AnalysisStore>,
        generator: Option<Arc<dyn AnalysisGenerator>>,
    ) -> Self {
        Self {
            directory,
            store,
            generator,
        }
    }

    pub async fn get(&self, event_id: &str) -> Result<AiAnalysis, AnalysisError> {
        self.store
            .analysis_for_event(event_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| AnalysisError::AnalysisNotFound(event_id.to_string()))
    }

    /// Returns the stored analysis for the event, generating and persisting
    /// one first if none exists. Generation happens at most once per event:
    /// an existing row short-circuits, and a lost insert race resolves to
    /// the winning row.
    pub async fn get_or_generate(&self, event_id: &str) -> Result<AiAnalysis, AnalysisError> {
        if let Some(existing) = self
            .store
            .analysis_for_event(event_id)
            .await
            .map_err(store_err)?
        {
            return Ok(existing);
        }

        let event = self
            .directory
            .event(event_id)
            .await
            .map_err(AnalysisError::Storage)?
            .ok_or_else(|| AnalysisError::EventNotFound(event_id.to_string()))?;

        let Some(generator) = &self.generator else {
            tracing::warn!(event_id, "analysis requested but no generator is configured");
            return Err(AnalysisError::NotConfigured);
        };

        // Company and trial context is best-effort: a miss (or a failed
        // lookup) narrows the prompt instead of failing the request.
        let company = match &event.company_id {
            Some(company_id) => self
                .directory
                .company(company_id)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(event_id, company_id, error = %e, "company lookup failed");
                    None
                }),
            None => None,
        };
        let trial = match &event.nct_id {
            Some(nct_id) => self
                .directory
                .trial_by_nct_id(nct_id)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(event_id, nct_id, error = %e, "trial lookup failed");
                    None
                }),
            None => None,
        };

        let input = GenerateInput {
            event,
            company,
            trial,
        };
        let draft = generator
            .generate_analysis(input)
            .await
            .map_err(|e| match e {
                LlmError::Transport { .. } => {
                    tracing::error!(event_id, error = %e, "generation call failed");
                    AnalysisError::ServiceUnavailable(e.to_string())
                }
                LlmError::InvalidPayload { .. } => {
                    tracing::error!(event_id, error = %e, "generated payload rejected");
                    AnalysisError::GenerationFailure(e.to_string())
                }
            })?;

        let new = NewAnalysis::from_draft(event_id, draft, MODEL_VERSION, &SOURCES_USED);
        match self.store.insert_analysis(new).await {
            Ok(analysis) => Ok(analysis),
            // A concurrent request won the insert race; return its row.
            Err(StoreError::Duplicate) => {
                tracing::info!(event_id, "lost analysis insert race; returning existing row");
                self.store
                    .analysis_for_event(event_id)
                    .await
                    .map_err(store_err)?
                    .ok_or_else(|| {
                        AnalysisError::Storage(anyhow::anyhow!(
                            "analysis for event {event_id} missing after duplicate insert"
                        ))
                    })
            }
            Err(e) => Err(store_err(e)),
        }
    }
}

fn store_err(e: StoreError) -> AnalysisError {
    match e {
        StoreError::Duplicate => {
            AnalysisError::Storage(anyhow::anyhow!("unexpected duplicate analysis"))
        }
        StoreError::Other(e) => AnalysisError::Storage(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::AnalysisDraft;
    use crate::domain::contract::LlmAnalysisPayload;
    use crate::domain::event::{EventStatus, EventType};
    use crate::llm::Provider;
    use crate::pricepath::PATH_POINTS;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn event(id: &str) -> Event {
        Event {
            id: id.to_string(),
            title: "PDUFA Date: Drug X".to_string(),
            event_type: EventType::RegulatoryDecisionDate,
            date_utc: Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap(),
            nct_id: None,
            company_id: Some("c1".to_string()),
            related_tickers: vec!["ACME".to_string()],
            status: EventStatus::Upcoming,
            therapeutic_area: Some("Oncology".to_string()),
            description: None,
            source_links: vec![],
            last_updated: None,
        }
    }

    fn company(id: &str) -> Company {
        Company {
            id: id.to_string(),
            name: "Acme Bio".to_string(),
            tickers: vec!["ACME".to_string()],
            market_cap: None,
            sector: None,
            website: None,
        }
    }

    /// The generator payload from the end-to-end scenario: Bull has no price
    /// path, Base and Bear carry single-point paths that must pass through.
    fn generated_payload() -> serde_json::Value {
        json!({
            "summary": "A pivotal regulatory decision.",
            "keyFactors": ["a", "b", "c"],
            "scenarios": [
                {"name": "Bull", "prob": 0.6, "narrative": "Approval.",
                 "priceTarget": 150, "pricePath": []},
                {"name": "Base", "prob": 0.3, "narrative": "Delay.",
                 "priceTarget": 110, "pricePath": [{"date": "2025-03-15", "price": 100.0}]},
                {"name": "Bear", "prob": 0.1, "narrative": "Rejection.",
                 "priceTarget": 80, "pricePath": [{"date": "2025-03-15", "price": 99.0}]},
            ],
            "confidence": 0.85,
        })
    }

    struct FakeDirectory {
        events: HashMap<String, Event>,
        companies: HashMap<String, Company>,
        trials: HashMap<String, Trial>,
    }

    impl FakeDirectory {
        fn with_event(event: Event) -> Self {
            let mut events = HashMap::new();
            let mut companies = HashMap::new();
            companies.insert("c1".to_string(), company("c1"));
            events.insert(event.id.clone(), event);
            Self {
                events,
                companies,
                trials: HashMap::new(),
            }
        }
    }

    #[async_trait::async_trait]
    impl EventDirectory for FakeDirectory {
        async fn event(&self, id: &str) -> anyhow::Result<Option<Event>> {
            Ok(self.events.get(id).cloned())
        }
        async fn company(&self, id: &str) -> anyhow::Result<Option<Company>> {
            Ok(self.companies.get(id).cloned())
        }
        async fn trial_by_nct_id(&self, nct_id: &str) -> anyhow::Result<Option<Trial>> {
            Ok(self.trials.get(nct_id).cloned())
        }
    }

    /// Enforces the one-row-per-event invariant the way the real unique
    /// index does.
    #[derive(Default)]
    struct InMemoryStore {
        rows: Mutex<HashMap<String, AiAnalysis>>,
    }

    impl InMemoryStore {
        fn row_count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl AnalysisStore for InMemoryStore {
        async fn analysis_for_event(
            &self,
            event_id: &str,
        ) -> Result<Option<AiAnalysis>, StoreError> {
            Ok(self.rows.lock().unwrap().get(event_id).cloned())
        }

        async fn insert_analysis(&self, new: NewAnalysis) -> Result<AiAnalysis, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&new.event_id) {
                return Err(StoreError::Duplicate);
            }
            let analysis = AiAnalysis {
                id: uuid::Uuid::new_v4().to_string(),
                event_id: new.event_id.clone(),
                generated_at: Utc::now(),
                summary: new.summary,
                key_factors: new.key_factors,
                scenarios: new.scenarios,
                confidence: new.confidence,
                model_version: new.model_version,
                sources_used: new.sources_used,
            };
            rows.insert(new.event_id, analysis.clone());
            Ok(analysis)
        }
    }

    /// Runs the real payload contract against the event date, exactly like
    /// the production client does after a successful call.
    struct FakeGenerator {
        payload: serde_json::Value,
        calls: AtomicUsize,
    }

    impl FakeGenerator {
        fn new(payload: serde_json::Value) -> Self {
            Self {
                payload,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl AnalysisGenerator for FakeGenerator {
        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        async fn generate_analysis(
            &self,
            input: GenerateInput,
        ) -> Result<AnalysisDraft, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let payload: LlmAnalysisPayload =
                serde_json::from_value(self.payload.clone()).map_err(|e| {
                    LlmError::InvalidPayload {
                        provider: Provider::OpenAi,
                        detail: e.to_string(),
                        raw_output: None,
                    }
                })?;
            payload
                .validate_and_into_draft(input.event.date_utc.date_naive())
                .map_err(|e| LlmError::InvalidPayload {
                    provider: Provider::OpenAi,
                    detail: format!("{e:#}"),
                    raw_output: None,
                })
        }
    }

    struct TransportFailingGenerator;

    #[async_trait::async_trait]
    impl AnalysisGenerator for TransportFailingGenerator {
        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        async fn generate_analysis(
            &self,
            _input: GenerateInput,
        ) -> Result<AnalysisDraft, LlmError> {
            Err(LlmError::Transport {
                provider: Provider::OpenAi,
                detail: "status=429".to_string(),
            })
        }
    }

    fn service(
        directory: FakeDirectory,
        store: Arc<InMemoryStore>,
        generator: Option<Arc<dyn AnalysisGenerator>>,
    ) -> AnalysisService {
        AnalysisService::new(Arc::new(directory), store, generator)
    }

    #[tokio::test]
    async fn end_to_end_generation_persists_validated_analysis() {
        let store = Arc::new(InMemoryStore::default());
        let svc = service(
            FakeDirectory::with_event(event("e1")),
            store.clone(),
            Some(Arc::new(FakeGenerator::new(generated_payload()))),
        );

        let analysis = svc.get_or_generate("e1").await.unwrap();

        assert_eq!(analysis.event_id, "e1");
        assert_eq!(analysis.confidence, 0.85);
        assert_eq!(analysis.model_version, MODEL_VERSION);
        assert_eq!(analysis.sources_used, SOURCES_USED.map(String::from));

        // Bull's path was synthesized; Base and Bear passed through.
        let bull = &analysis.scenarios[0];
        assert_eq!(bull.price_path.len(), PATH_POINTS);
        assert!((bull.price_path[0].price - 100.0).abs() <= 3.0);
        assert!((bull.price_path.last().unwrap().price - 150.0).abs() <= 150.0 * 0.03);
        assert_eq!(analysis.scenarios[1].price_path.len(), 1);
        assert_eq!(analysis.scenarios[2].price_path.len(), 1);
    }

    #[tokio::test]
    async fn repeated_generation_is_idempotent() {
        let store = Arc::new(InMemoryStore::default());
        let generator = Arc::new(FakeGenerator::new(generated_payload()));
        let svc = service(
            FakeDirectory::with_event(event("e1")),
            store.clone(),
            Some(generator.clone()),
        );

        let first = svc.get_or_generate("e1").await.unwrap();
        let second = svc.get_or_generate("e1").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.row_count(), 1);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_generation_converges_to_one_row() {
        let store = Arc::new(InMemoryStore::default());
        let svc = service(
            FakeDirectory::with_event(event("e1")),
            store.clone(),
            Some(Arc::new(FakeGenerator::new(generated_payload()))),
        );

        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = svc.clone();
            handles.push(tokio::spawn(
                async move { svc.get_or_generate("e1").await },
            ));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }

        assert_eq!(store.row_count(), 1);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn lost_insert_race_returns_winning_row() {
        struct RacingStore {
            winner: Mutex<Option<AiAnalysis>>,
            insert_attempted: AtomicBool,
        }

        #[async_trait::async_trait]
        impl AnalysisStore for RacingStore {
            async fn analysis_for_event(
                &self,
                _event_id: &str,
            ) -> Result<Option<AiAnalysis>, StoreError> {
                if self.insert_attempted.load(Ordering::SeqCst) {
                    Ok(self.winner.lock().unwrap().clone())
                } else {
                    Ok(None)
                }
            }

            async fn insert_analysis(&self, new: NewAnalysis) -> Result<AiAnalysis, StoreError> {
                // Another request committed between our miss and our insert.
                let winner = AiAnalysis {
                    id: "winner".to_string(),
                    event_id: new.event_id,
                    generated_at: Utc::now(),
                    summary: "the other request's analysis".to_string(),
                    key_factors: new.key_factors,
                    scenarios: new.scenarios,
                    confidence: new.confidence,
                    model_version: new.model_version,
                    sources_used: new.sources_used,
                };
                *self.winner.lock().unwrap() = Some(winner);
                self.insert_attempted.store(true, Ordering::SeqCst);
                Err(StoreError::Duplicate)
            }
        }

        let svc = AnalysisService::new(
            Arc::new(FakeDirectory::with_event(event("e1"))),
            Arc::new(RacingStore {
                winner: Mutex::new(None),
                insert_attempted: AtomicBool::new(false),
            }),
            Some(Arc::new(FakeGenerator::new(generated_payload()))),
        );

        let analysis = svc.get_or_generate("e1").await.unwrap();
        assert_eq!(analysis.id, "winner");
    }

    #[tokio::test]
    async fn missing_generator_short_circuits_as_not_configured() {
        let store = Arc::new(InMemoryStore::default());
        let svc = service(FakeDirectory::with_event(event("e1")), store.clone(), None);

        let err = svc.get_or_generate("e1").await.unwrap_err();
        assert!(matches!(err, AnalysisError::NotConfigured));
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn existing_analysis_is_returned_even_when_not_configured() {
        let store = Arc::new(InMemoryStore::default());
        let configured = service(
            FakeDirectory::with_event(event("e1")),
            store.clone(),
            Some(Arc::new(FakeGenerator::new(generated_payload()))),
        );
        let first = configured.get_or_generate("e1").await.unwrap();

        let unconfigured = service(FakeDirectory::with_event(event("e1")), store.clone(), None);
        let second = unconfigured.get_or_generate("e1").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn unknown_event_fails_with_event_not_found() {
        let store = Arc::new(InMemoryStore::default());
        let svc = service(
            FakeDirectory::with_event(event("e1")),
            store,
            Some(Arc::new(FakeGenerator::new(generated_payload()))),
        );

        let err = svc.get_or_generate("missing").await.unwrap_err();
        assert!(matches!(err, AnalysisError::EventNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn transport_failure_maps_to_service_unavailable_and_persists_nothing() {
        let store = Arc::new(InMemoryStore::default());
        let svc = service(
            FakeDirectory::with_event(event("e1")),
            store.clone(),
            Some(Arc::new(TransportFailingGenerator)),
        );

        let err = svc.get_or_generate("e1").await.unwrap_err();
        assert!(matches!(err, AnalysisError::ServiceUnavailable(_)));
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn renamed_scenario_fails_generation_and_persists_nothing() {
        let mut payload = generated_payload();
        payload["scenarios"][2]["name"] = json!("Neutral");

        let store = Arc::new(InMemoryStore::default());
        let svc = service(
            FakeDirectory::with_event(event("e1")),
            store.clone(),
            Some(Arc::new(FakeGenerator::new(payload))),
        );

        let err = svc.get_or_generate("e1").await.unwrap_err();
        assert!(matches!(err, AnalysisError::GenerationFailure(_)));
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn get_reports_analysis_not_found_on_miss() {
        let store = Arc::new(InMemoryStore::default());
        let svc = service(FakeDirectory::with_event(event("e1")), store, None);

        let err = svc.get("e1").await.unwrap_err();
        assert!(matches!(err, AnalysisError::AnalysisNotFound(id) if id == "e1"));
    }
}
