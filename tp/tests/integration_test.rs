//! Integration tests for the trip planner
//!
//! These drive the public orchestrator API end to end with scripted providers.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use tripplanner::budget::BudgetCategory;
use tripplanner::categorize::{CategorizeOptions, categorize_flights};
use tripplanner::domain::{
    FlightOffer, FlightQuery, HotelOffer, HotelQuery, Itinerary, OfferPage, PlanningRequest, TripDraft,
};
use tripplanner::provider::generative_llm::parse_itinerary;
use tripplanner::provider::template::build_itinerary;
use tripplanner::{
    Capability, ChangeClass, DraftField, FallbackError, GenerativeProvider, InventoryProvider, Orchestrator,
    OrchestratorOptions, PlanningError, ProviderDescriptor, ProviderError, ProviderRegistry, SessionError,
    SessionId, SessionSnapshot, SessionState, SpecialistKind, StateManager,
};

// =============================================================================
// Scripted providers
// =============================================================================

enum Script {
    Succeed,
    Fail(ProviderError),
    /// Return an itinerary with no days
    Invalid,
    /// Succeed after a delay
    Slow(Duration),
    /// Parse a raw model reply
    Reply(String),
}

struct ScriptedGenerative {
    id: &'static str,
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedGenerative {
    fn new(id: &'static str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            id,
            script,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GenerativeProvider for ScriptedGenerative {
    async fn generate_itinerary(&self, request: &PlanningRequest) -> Result<Itinerary, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Succeed => {
                let mut itinerary = build_itinerary(request);
                itinerary.notes.push(format!("generated by {}", self.id));
                Ok(itinerary)
            }
            Script::Fail(e) => Err(e.clone()),
            Script::Invalid => Ok(Itinerary {
                days: vec![],
                notes: vec![format!("generated by {}", self.id)],
            }),
            Script::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(build_itinerary(request))
            }
            Script::Reply(text) => parse_itinerary(text, request),
        }
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn confidence_estimate(&self) -> f64 {
        0.8
    }
}

struct ScriptedInventory {
    flights: Vec<FlightOffer>,
    hotels: Vec<HotelOffer>,
}

#[async_trait]
impl InventoryProvider for ScriptedInventory {
    async fn search_flights(&self, _query: &FlightQuery) -> Result<OfferPage<FlightOffer>, ProviderError> {
        Ok(OfferPage {
            offers: self.flights.clone(),
            total_found: self.flights.len(),
        })
    }

    async fn search_hotels(&self, _query: &HotelQuery) -> Result<OfferPage<HotelOffer>, ProviderError> {
        Ok(OfferPage {
            offers: self.hotels.clone(),
            total_found: self.hotels.len(),
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn confidence_estimate(&self) -> f64 {
        0.9
    }
}

fn flight(id: &str, price: f64, duration_minutes: u32) -> FlightOffer {
    FlightOffer {
        id: id.to_string(),
        price,
        currency: "USD".to_string(),
        duration_minutes,
        layover_minutes: 0,
        stops: 0,
        airline: "Test Air".to_string(),
        booking_reference: format!("BK-{}", id),
    }
}

fn hotel(id: &str, price_per_night: f64, rating: f64) -> HotelOffer {
    HotelOffer {
        id: id.to_string(),
        name: format!("Hotel {}", id),
        price_per_night,
        currency: "USD".to_string(),
        rating,
        amenities: vec!["wifi".to_string()],
        booking_reference: format!("BK-{}", id),
    }
}

fn orchestrator(generative: Vec<Arc<ScriptedGenerative>>, inventory: Option<ScriptedInventory>) -> Orchestrator {
    let registry = Arc::new(ProviderRegistry::new(Duration::from_millis(500)));
    for (n, provider) in generative.into_iter().enumerate() {
        registry
            .register_generative(
                ProviderDescriptor::new(provider.id, vec![Capability::GenerateItinerary], n as u32, 0.8),
                provider,
            )
            .expect("register generative");
    }
    if let Some(inventory) = inventory {
        registry
            .register_inventory(
                ProviderDescriptor::new(
                    "inventory",
                    vec![Capability::SearchFlights, Capability::SearchHotels],
                    0,
                    0.9,
                ),
                Arc::new(inventory),
            )
            .expect("register inventory");
    }
    let options = OrchestratorOptions {
        provider_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    Orchestrator::new(registry, StateManager::in_memory(), options)
}

fn swap_generative(orch: &Orchestrator, id: &'static str, script: Script) {
    orch.registry()
        .register_generative(
            ProviderDescriptor::new(id, vec![Capability::GenerateItinerary], 0, 0.8),
            ScriptedGenerative::new(id, script),
        )
        .unwrap();
}

/// Poll until the session reaches `state`; restoring an abandoned pass is async
async fn wait_for_state(orch: &Orchestrator, id: &SessionId, state: SessionState) -> SessionSnapshot {
    for _ in 0..100 {
        let status = orch.get_status(id).await.unwrap();
        if status.state == state {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session never reached {state:?}");
}

fn rome_draft() -> TripDraft {
    TripDraft {
        origin: Some("New York".to_string()),
        destination: Some("Rome".to_string()),
        dates: Some("2025-06-01..2025-06-06".parse().expect("dates")),
        travelers: Some(2),
        budget_total: Some(3000.0),
        ..Default::default()
    }
}

// =============================================================================
// Budget
// =============================================================================

#[tokio::test]
async fn test_hotel_allocation_for_3000_budget() {
    let orch = orchestrator(vec![ScriptedGenerative::new("gen-0", Script::Succeed)], None);
    let snapshot = orch.start_planning(rome_draft()).await.unwrap();
    let plan = snapshot.plan.unwrap();

    let hotels = plan.budget.amount(BudgetCategory::Hotels);
    assert!((900.0..=1050.0).contains(&hotels), "hotel allocation {hotels}");
    let sum: f64 = plan.budget.categories.iter().map(|c| c.percentage).sum();
    assert!((sum - 100.0).abs() <= 0.1);
    // No inventory: booking and logistics fell back to estimates
    assert!(plan.selected_hotel.is_none());
    assert!(!plan.aspect_failures.is_empty());
}

#[tokio::test]
async fn test_real_hotel_cost_reported_as_is() {
    let inventory = ScriptedInventory {
        flights: vec![flight("f1", 1500.0, 540), flight("f2", 1300.0, 700), flight("f3", 1800.0, 500)],
        hotels: vec![hotel("h1", 150.0, 4.1), hotel("h2", 320.0, 4.6), hotel("h3", 90.0, 3.8)],
    };
    let orch = orchestrator(vec![ScriptedGenerative::new("gen-0", Script::Succeed)], Some(inventory));
    let plan = orch.start_planning(rome_draft()).await.unwrap().plan.unwrap();

    let selected = plan.selected_hotel.clone().expect("hotel selected");
    let hotels = plan.budget.get(BudgetCategory::Hotels).unwrap();
    assert!(hotels.actual);
    assert_eq!(hotels.amount, selected.price_per_night * 5.0);
    assert!(plan.selected_flight.is_some());
}

#[tokio::test]
async fn test_offers_in_another_currency_fall_through_the_chain() {
    let mut euro_flight = flight("eur-f1", 300.0, 480);
    euro_flight.currency = "EUR".to_string();
    let mut euro_hotel = hotel("eur-h1", 60.0, 4.5);
    euro_hotel.currency = "EUR".to_string();
    let mixed = ScriptedInventory {
        flights: vec![flight("mixed-f1", 1400.0, 520), euro_flight],
        hotels: vec![hotel("mixed-h1", 150.0, 4.0), euro_hotel],
    };
    let orch = orchestrator(vec![ScriptedGenerative::new("gen-0", Script::Succeed)], Some(mixed));
    orch.registry()
        .register_inventory(
            ProviderDescriptor::new(
                "usd-inventory",
                vec![Capability::SearchFlights, Capability::SearchHotels],
                1,
                0.9,
            ),
            Arc::new(ScriptedInventory {
                flights: vec![flight("usd-f1", 1500.0, 540), flight("usd-f2", 1300.0, 700)],
                hotels: vec![hotel("usd-h1", 150.0, 4.1), hotel("usd-h2", 320.0, 4.6), hotel("usd-h3", 90.0, 3.8)],
            }),
        )
        .unwrap();

    let plan = orch.start_planning(rome_draft()).await.unwrap().plan.unwrap();
    let flights = plan.flights.expect("flight buckets");
    for bucket in [&flights.cheapest, &flights.fastest, &flights.best_value] {
        assert!(bucket.iter().all(|f| f.id.starts_with("usd-")), "{bucket:?}");
    }
    let selected = plan.selected_hotel.expect("hotel selected");
    assert!(selected.id.starts_with("usd-"));
    assert_eq!(
        plan.budget.amount(BudgetCategory::Hotels),
        selected.price_per_night * 5.0
    );
}

// =============================================================================
// Refinement classification
// =============================================================================

#[tokio::test]
async fn test_duration_change_reruns_every_specialist() {
    let orch = orchestrator(vec![ScriptedGenerative::new("gen-0", Script::Succeed)], None);
    let id = orch.start_planning(rome_draft()).await.unwrap().id;

    let snapshot = orch.refine(&id, "change Rome to 4 nights").await.unwrap();
    let record = &snapshot.history[0];
    assert_eq!(record.class, ChangeClass::Duration);
    let expected: Vec<SpecialistKind> = SpecialistKind::ALL.to_vec();
    assert_eq!(record.specialists, expected);
    assert_eq!(snapshot.request.unwrap().dates.nights(), 4);
    assert_eq!(snapshot.plan.unwrap().itinerary.days.len(), 5);
}

#[tokio::test]
async fn test_route_change_reruns_route_specialists() {
    let orch = orchestrator(vec![ScriptedGenerative::new("gen-0", Script::Succeed)], None);
    let id = orch.start_planning(rome_draft()).await.unwrap().id;

    let snapshot = orch.refine(&id, "add Florence").await.unwrap();
    assert_eq!(snapshot.history[0].class, ChangeClass::Destination);

    let snapshot = orch.refine(&id, "change Rome to 4 nights").await.unwrap();
    let record = &snapshot.history[1];
    assert_eq!(record.class, ChangeClass::Route);
    let specialists: BTreeSet<SpecialistKind> = record.specialists.iter().copied().collect();
    let expected: BTreeSet<SpecialistKind> = [
        SpecialistKind::Logistics,
        SpecialistKind::Coordinator,
        SpecialistKind::Destination,
    ]
    .into_iter()
    .collect();
    assert_eq!(specialists, expected);

    let request = snapshot.request.unwrap();
    assert_eq!(request.dates.nights(), 5);
    let rome = request.effective_route().into_iter().find(|s| s.city == "Rome").unwrap();
    assert_eq!(rome.nights, 4);
    assert_eq!(snapshot.refinement_count, 2);
}

// =============================================================================
// Categorization
// =============================================================================

#[tokio::test]
async fn test_two_flight_offers_fill_every_bucket() {
    let inventory = ScriptedInventory {
        flights: vec![flight("f1", 900.0, 600), flight("f2", 1100.0, 480)],
        hotels: vec![],
    };
    let orch = orchestrator(vec![ScriptedGenerative::new("gen-0", Script::Succeed)], Some(inventory));
    let plan = orch.start_planning(rome_draft()).await.unwrap().plan.unwrap();

    let flights = plan.flights.expect("flight buckets");
    assert!(flights.is_sparse());
    assert!(!flights.is_disjoint());
    for bucket in [&flights.cheapest, &flights.fastest, &flights.best_value] {
        let ids: BTreeSet<&str> = bucket.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["f1", "f2"].into_iter().collect());
    }
}

#[test]
fn test_categorization_is_idempotent() {
    let offers: Vec<FlightOffer> = (0..7)
        .map(|n| flight(&format!("f{n}"), 400.0 + (n * 37 % 5) as f64 * 90.0, 300 + (n * 53 % 7) * 40))
        .collect();
    let options = CategorizeOptions::default();
    let first = categorize_flights(&offers, offers.len(), &options);
    let second = categorize_flights(&offers, offers.len(), &options);
    assert_eq!(first, second);
}

// =============================================================================
// Fallback provenance
// =============================================================================

#[tokio::test]
async fn test_fallback_result_comes_only_from_second_provider() {
    let first = ScriptedGenerative::new("gen-a", Script::Invalid);
    let second = ScriptedGenerative::new("gen-b", Script::Succeed);
    let orch = orchestrator(vec![first.clone(), second.clone()], None);

    let plan = orch.start_planning(rome_draft()).await.unwrap().plan.unwrap();
    assert!(plan.quality.fallback_used);
    assert_eq!(plan.quality.provider, "gen-b");
    assert!(plan.itinerary.notes.iter().any(|n| n == "generated by gen-b"));
    assert!(!plan.itinerary.notes.iter().any(|n| n == "generated by gen-a"));
    assert_eq!(plan.itinerary.days.len(), 6);
    assert_eq!(first.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reply_with_out_of_range_day_falls_back() {
    let mut days: Vec<String> = (1..=5)
        .map(|n| format!(r#"{{"day":{n},"city":"Rome","theme":"Sights"}}"#))
        .collect();
    days.push(r#"{"day":4000000000,"city":"Rome","theme":"Farewell"}"#.to_string());
    let reply = format!(r#"{{"days":[{}]}}"#, days.join(","));

    let request = rome_draft().to_request().unwrap();
    assert!(matches!(
        parse_itinerary(&reply, &request),
        Err(ProviderError::DataInvalid(_))
    ));

    let orch = orchestrator(
        vec![
            ScriptedGenerative::new("gen-a", Script::Reply(reply)),
            ScriptedGenerative::new("gen-b", Script::Succeed),
        ],
        None,
    );
    let plan = orch.start_planning(rome_draft()).await.unwrap().plan.unwrap();
    assert!(plan.quality.fallback_used);
    assert_eq!(plan.quality.provider, "gen-b");
    assert_eq!(plan.itinerary.days.len(), 6);
}

#[tokio::test]
async fn test_both_generative_providers_fail() {
    let orch = orchestrator(
        vec![
            ScriptedGenerative::new("gen-a", Script::Fail(ProviderError::Unavailable("down".to_string()))),
            ScriptedGenerative::new("gen-b", Script::Invalid),
        ],
        None,
    );

    let err = orch.start_planning(rome_draft()).await.unwrap_err();
    let PlanningError::AllProvidersFailed { session_id, source } = err else {
        panic!("expected AllProvidersFailed, got {err:?}");
    };
    let FallbackError::AllProvidersFailed { failures, .. } = source else {
        panic!("expected chain exhaustion");
    };
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].provider_id, "gen-a");
    assert_eq!(failures[1].provider_id, "gen-b");
    assert!(matches!(failures[1].error, ProviderError::DataInvalid(_)));

    let status = orch.get_status(&session_id).await.unwrap();
    assert_eq!(status.state, SessionState::GenerationFailed);
    assert!(status.plan.is_none());
}

#[tokio::test]
async fn test_failed_refinement_keeps_previous_plan() {
    let flaky = ScriptedGenerative::new("gen-0", Script::Succeed);
    let orch = orchestrator(vec![flaky], None);
    let id = orch.start_planning(rome_draft()).await.unwrap().id;
    let before = orch.get_status(&id).await.unwrap().plan.unwrap();

    // Swap to a registry entry that always fails under the same id
    orch.registry()
        .register_generative(
            ProviderDescriptor::new("gen-0", vec![Capability::GenerateItinerary], 0, 0.8),
            ScriptedGenerative::new("gen-0", Script::Fail(ProviderError::Call("boom".to_string()))),
        )
        .unwrap();

    let err = orch.refine(&id, "add Florence").await.unwrap_err();
    assert_eq!(err.kind(), "all_providers_failed");

    let status = orch.get_status(&id).await.unwrap();
    assert_eq!(status.state, SessionState::Ready);
    assert_eq!(status.refinement_count, 0);
    let after = status.plan.unwrap();
    assert_eq!(after.itinerary, before.itinerary);
    assert!(after.warnings.iter().any(|w| w.contains("showing the previous plan")));
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_overlong_trip_length_is_not_applied() {
    let orch = orchestrator(vec![ScriptedGenerative::new("gen-0", Script::Succeed)], None);
    let id = orch.start_planning(rome_draft()).await.unwrap().id;

    for change in ["make it a 4000000000-day trip", "let's do 900000000 weeks"] {
        let snapshot = orch.refine(&id, change).await.unwrap();
        assert_eq!(snapshot.state, SessionState::Ready);
        assert_eq!(snapshot.history.last().unwrap().class, ChangeClass::Unclassified);
        assert_eq!(snapshot.request.unwrap().dates.nights(), 5);
    }

    let snapshot = orch.refine(&id, "add Florence").await.unwrap();
    assert_eq!(snapshot.refinement_count, 3);
    assert_eq!(orch.finalize(&id).await.unwrap().refinements, 3);
}

#[tokio::test]
async fn test_abandoned_refinement_restores_session() {
    let orch = orchestrator(vec![ScriptedGenerative::new("gen-0", Script::Succeed)], None);
    let id = orch.start_planning(rome_draft()).await.unwrap().id;
    let before = orch.get_status(&id).await.unwrap().plan.unwrap();

    swap_generative(&orch, "gen-0", Script::Slow(Duration::from_secs(10)));
    let abandoned = tokio::time::timeout(Duration::from_millis(100), orch.refine(&id, "add Florence")).await;
    assert!(abandoned.is_err());

    let status = wait_for_state(&orch, &id, SessionState::Ready).await;
    assert_eq!(status.refinement_count, 0);
    assert_eq!(status.plan.unwrap().itinerary, before.itinerary);
    assert!(status.last_error.unwrap().contains("interrupted"));

    swap_generative(&orch, "gen-0", Script::Succeed);
    let snapshot = orch.refine(&id, "add Florence").await.unwrap();
    assert_eq!(snapshot.refinement_count, 1);
    assert!(orch.finalize(&id).await.is_ok());
}

#[tokio::test]
async fn test_abandoned_generation_can_be_retried() {
    let orch = orchestrator(
        vec![ScriptedGenerative::new("gen-0", Script::Slow(Duration::from_secs(10)))],
        None,
    );
    let abandoned = tokio::time::timeout(Duration::from_millis(100), orch.start_planning(rome_draft())).await;
    assert!(abandoned.is_err());

    let sessions = orch.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    let id = sessions[0].id.clone();
    let status = wait_for_state(&orch, &id, SessionState::GenerationFailed).await;
    assert!(status.plan.is_none());

    swap_generative(&orch, "gen-0", Script::Succeed);
    let snapshot = orch.answer_followup(&id, DraftField::Travelers, "2").await.unwrap();
    assert_eq!(snapshot.state, SessionState::Ready);
}

#[tokio::test]
async fn test_refine_after_finalize_is_rejected() {
    let orch = orchestrator(vec![ScriptedGenerative::new("gen-0", Script::Succeed)], None);
    let id = orch.start_planning(rome_draft()).await.unwrap().id;
    orch.refine(&id, "make it cheaper").await.unwrap();
    let final_plan = orch.finalize(&id).await.unwrap();
    assert_eq!(final_plan.refinements, 1);

    let err = orch.refine(&id, "add Florence").await.unwrap_err();
    assert_eq!(
        err,
        PlanningError::Session {
            session_id: id.clone(),
            source: SessionError::Finalized,
        }
    );
    let status = orch.get_status(&id).await.unwrap();
    assert_eq!(status.state, SessionState::Finalized);
    assert_eq!(status.refinement_count, 1);
}

#[tokio::test]
async fn test_sixth_refinement_is_rejected() {
    let orch = orchestrator(vec![ScriptedGenerative::new("gen-0", Script::Succeed)], None);
    let id = orch.start_planning(rome_draft()).await.unwrap().id;
    for n in 0..5 {
        orch.refine(&id, &format!("make it {} nights", 3 + n)).await.unwrap();
    }
    let err = orch.refine(&id, "make it cheaper").await.unwrap_err();
    assert!(matches!(err, PlanningError::RefinementLimitExceeded { limit: 5, .. }));
    let status = orch.get_status(&id).await.unwrap();
    assert_eq!(status.refinement_count, 5);
    assert_eq!(status.state, SessionState::Ready);
}

#[tokio::test]
async fn test_concurrent_refinements_stay_capped() {
    let orch = Arc::new(orchestrator(vec![ScriptedGenerative::new("gen-0", Script::Succeed)], None));
    let id = orch.start_planning(rome_draft()).await.unwrap().id;

    let changes = ["make it cheaper", "add Florence", "make it 7 nights", "go by train", "remove Florence"];
    let handles: Vec<_> = (0..8)
        .map(|n| {
            let orch = orch.clone();
            let id = id.clone();
            let change = changes[n % changes.len()];
            tokio::spawn(async move { orch.refine(&id, change).await })
        })
        .collect();

    let mut ok = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(PlanningError::RefinementLimitExceeded { .. }) => limited += 1,
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
    assert_eq!(ok, 5);
    assert_eq!(limited, 3);

    let status = orch.get_status(&id).await.unwrap();
    assert_eq!(status.refinement_count, 5);
    let numbers: Vec<u32> = status.history.iter().map(|r| r.number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_followup_flow_to_ready() {
    let orch = orchestrator(vec![ScriptedGenerative::new("gen-0", Script::Succeed)], None);
    let snapshot = orch.start_planning(TripDraft::default()).await.unwrap();
    assert_eq!(snapshot.state, SessionState::CollectingInfo);
    let id = snapshot.id;

    let answers = [
        (DraftField::Origin, "Boston"),
        (DraftField::Destination, "Lisbon"),
        (DraftField::Dates, "2025-09-10 to 2025-09-14"),
    ];
    for (field, value) in answers {
        let snapshot = orch.answer_followup(&id, field, value).await.unwrap();
        assert_eq!(snapshot.state, SessionState::CollectingInfo);
    }
    let status = orch.get_status(&id).await.unwrap();
    let followup = status.followup.unwrap();
    assert_eq!(followup.field, Some(DraftField::Travelers));
    assert!(followup.question.contains("Lisbon"));

    let snapshot = orch
        .answer_followup(&id, DraftField::Travelers, &followup.quick_replies[1])
        .await
        .unwrap();
    assert_eq!(snapshot.state, SessionState::Ready);
    let request = snapshot.request.unwrap();
    assert_eq!(request.travelers, 2);
    assert_eq!(request.dates.days(), 5);
}

#[tokio::test]
async fn test_invalid_answer_keeps_collecting() {
    let orch = orchestrator(vec![ScriptedGenerative::new("gen-0", Script::Succeed)], None);
    let id = orch.start_planning(TripDraft::default()).await.unwrap().id;
    let err = orch
        .answer_followup(&id, DraftField::Dates, "sometime soon")
        .await
        .unwrap_err();
    assert!(err.user_message().contains("dates"));
    let status = orch.get_status(&id).await.unwrap();
    assert_eq!(status.state, SessionState::CollectingInfo);
    assert_eq!(status.followup.unwrap().field, Some(DraftField::Origin));
}
