//! End-to-end scenarios
//!
//! Each test drives one subsystem through a short, fully specified story:
//! - a contested tile that must not flip back
//! - a neglected settlement breaking away
//! - treaties accepted and rejected on trust
//! - the knowledge cost curve
//! - a 500-event journal on disk
//! - rivers draining to the sea

use std::collections::HashSet;

use civ_sim::core::config::JournalParams;
use civ_sim::core::types::{GridPos, Vec2, REBELS_REGION};
use civ_sim::diplomacy::{DiplomacyManager, DiplomacyParams, TreatyKind};
use civ_sim::governance::{GovernanceManager, GovernanceParams, NationalIdentity};
use civ_sim::journal::{EVENT_SIZE, HEADER_SIZE};
use civ_sim::knowledge::{knowledge_cost, Domain, KnowledgeParams, ResearchState};
use civ_sim::population::{PopulationManager, PopulationParams};
use civ_sim::settlement::{influence_at, Settlement, SettlementContext, SettlementManager, SettlementParams};
use civ_sim::world::{generate, WorldGenParams};
use civ_sim::{ErrorCode, EventKind, Journal};

// ============================================================================
// 1. Flip
// ============================================================================

#[test]
fn test_contested_tile_does_not_flip_back() {
    let mut world = generate(40, 40, 42, &WorldGenParams::default()).unwrap();
    let mut settlements = SettlementManager::new(42, SettlementParams::default());

    let mut a = Settlement::new("A", "A", Vec2::new(10.0, 10.0), "N1");
    a.culture_yield = 5;
    a.territory_radius = 6;
    let mut b = Settlement::new("B", "B", Vec2::new(15.0, 10.0), "N2");
    b.culture_yield = 1;
    b.territory_radius = 6;
    settlements.add_settlement(a).unwrap();
    settlements.add_settlement(b).unwrap();

    settlements.run_influence_pass(&mut world);
    let tile = world.tile(12, 10).unwrap();
    let resistance = tile.terrain_resistance();
    let expected = influence_at(5, 2.0, resistance);
    assert_eq!(tile.owner_id, "A");
    assert!((tile.cultural_influence - expected).abs() < 1e-6);
    assert!((expected - 5.0 / (2.0 * resistance + 1.0)).abs() < 1e-6);

    let challenger = influence_at(1, 3.0, resistance);
    assert!(challenger < 1.5 * expected);

    for _ in 0..10 {
        settlements.run_influence_pass(&mut world);
        assert_eq!(world.tile(12, 10).unwrap().owner_id, "A");
    }
}

// ============================================================================
// 2. Revolt
// ============================================================================

#[test]
fn test_neglected_settlement_revolts() {
    let mut world = generate(32, 32, 8, &WorldGenParams::default()).unwrap();
    let identity = NationalIdentity {
        ethnicity: "folk".into(),
        language: "tongue".into(),
        faith: "faith".into(),
    };
    let mut governance = GovernanceManager::new(8, GovernanceParams::default());
    governance.create_government("N1", "Avar", identity).unwrap();
    governance.government_mut("N1").unwrap().traits.stability = 0.3;
    let population = PopulationManager::new(8, PopulationParams::default());

    let mut settlements = SettlementManager::new(8, SettlementParams::default());
    let mut s = Settlement::new("R", "Rest", Vec2::new(16.5, 16.5), "N1").with_identity("folk", "tongue", "faith");
    s.loyalty = 0.2;
    s.unrest = 0.8;
    s.infrastructure.sanitation = 0.0;
    s.infrastructure.roads = 0.0;
    settlements.add_settlement(s).unwrap();

    let ctx = SettlementContext {
        governance: &governance,
        population: &population,
    };
    let mut revolted_at = None;
    for tick in 1..=10 {
        let outcome = settlements.update(1.0, &ctx, &mut world);
        if !outcome.revolts.is_empty() {
            assert_eq!(outcome.revolts[0].former_region, "N1");
            revolted_at = Some(tick);
            break;
        }
    }

    assert!(revolted_at.is_some());
    let s = settlements.get("R").unwrap();
    assert_eq!(s.region_id, REBELS_REGION);
    assert!(s.revolting);
}

// ============================================================================
// 3. Treaty accept/reject
// ============================================================================

#[test]
fn test_treaty_accepted_then_rejected_on_trust() {
    let mut d = DiplomacyManager::new(1, DiplomacyParams::default());
    d.set_trust("P", "Q", 0.5).unwrap();

    let id = d.propose_treaty(TreatyKind::Trade, &["P", "Q"], 0.0, None).unwrap();
    let treaty = d.treaty(&id).unwrap();
    assert_eq!(treaty.signatory_count(), 2);
    assert_eq!(d.treaties().len(), 1);

    d.set_trust("P", "Q", 0.2).unwrap();
    let err = d.propose_treaty(TreatyKind::Trade, &["P", "Q"], 1.0, None).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidState);
    assert_eq!(err.message(), "Treaty rejected due to low trust");
    assert_eq!(d.treaties().len(), 1);
}

// ============================================================================
// 4. Knowledge cost
// ============================================================================

#[test]
fn test_knowledge_cost_curve() {
    assert_eq!(knowledge_cost(0.0, 100.0, 1.8), 100.0);
    assert!((knowledge_cost(1.0, 100.0, 1.8) - 348.22).abs() < 0.01);

    let mut state = ResearchState::default();
    let gained = state.advance(Domain::Science, 100.0, &KnowledgeParams::default());
    assert_eq!(gained, 1.0);
    assert_eq!(state.level(Domain::Science), 1.0);
}

// ============================================================================
// 5. Journal
// ============================================================================

#[test]
fn test_journal_of_500_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.cj");

    let mut journal = Journal::new(&JournalParams::default());
    journal.attach_file(path.clone());
    let (war, peace) = (EventKind::WarDeclared.tag(), EventKind::PeaceSigned.tag());
    for i in 0..500u32 {
        let kind = if i % 2 == 0 { war } else { peace };
        journal.log(kind, &format!("N{}:N{}", i % 7, i % 5), &i.to_le_bytes()).unwrap();
    }
    journal.flush().unwrap();

    assert_eq!(journal.count_by_type(war), 250);
    assert_eq!(journal.count_by_type(peace), 250);

    let size = std::fs::metadata(&path).unwrap().len() as usize;
    assert_eq!(size, HEADER_SIZE + 500 * EVENT_SIZE);
    assert_eq!(size, 48 + 500 * 408);

    let reloaded = Journal::load(&path, &JournalParams::default()).unwrap();
    assert_eq!(reloaded.count_by_type(war), 250);
    assert_eq!(reloaded.count_by_type(peace), 250);
    assert_eq!(reloaded.last().map(|e| e.seq), Some(500));
}

// ============================================================================
// 6. River
// ============================================================================

#[test]
fn test_rivers_drain_downhill_to_water() {
    let world = generate(100, 100, 1, &WorldGenParams::default()).unwrap();
    assert!(world.river_tile_count() > 0);

    for t in world.tiles().iter().filter(|t| t.has_river) {
        let start = GridPos::new(t.x, t.y);
        let mut seen = HashSet::from([start]);
        let mut stack = vec![start];
        let mut reached = false;

        while let Some(p) = stack.pop() {
            let here = world.tile(p.x, p.y).unwrap();
            if here.is_water() {
                reached = true;
                break;
            }
            for n in world.neighbors4(p.x, p.y) {
                let next = world.tile(n.x, n.y).unwrap();
                if next.elevation <= here.elevation && seen.insert(n) {
                    stack.push(n);
                }
            }
        }
        assert!(reached, "river tile ({}, {}) has no downhill path to water", t.x, t.y);
    }
}
