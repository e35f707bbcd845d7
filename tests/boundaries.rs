//! Edge cases at the limits of map size, settlement count and assimilation

use std::time::{Duration, Instant};

use civ_sim::core::types::Vec2;
use civ_sim::culture::{AssimilationKind, CulturalIdentity, CultureManager, CultureParams, Stage};
use civ_sim::governance::{GovernanceManager, GovernanceParams};
use civ_sim::population::{PopulationManager, PopulationParams};
use civ_sim::settlement::{Settlement, SettlementContext, SettlementManager, SettlementParams};
use civ_sim::world::{generate, Biome, Tile, WorldGenParams, WorldMap, MIN_MAP_HEIGHT, MIN_MAP_WIDTH};
use civ_sim::{ErrorCode, GameConfig, SimulationParams, Simulation};

#[test]
fn test_minimum_map_size_succeeds() {
    let map = generate(MIN_MAP_WIDTH, MIN_MAP_HEIGHT, 7, &WorldGenParams::default()).unwrap();
    assert_eq!(map.tiles().len(), (MIN_MAP_WIDTH * MIN_MAP_HEIGHT) as usize);
    assert!(Simulation::new(
        GameConfig::default(),
        SimulationParams::default(),
        MIN_MAP_WIDTH,
        MIN_MAP_HEIGHT,
        7
    )
    .is_ok());
}

#[test]
fn test_one_below_minimum_fails() {
    for (w, h) in [(MIN_MAP_WIDTH - 1, MIN_MAP_HEIGHT), (MIN_MAP_WIDTH, MIN_MAP_HEIGHT - 1)] {
        let err = generate(w, h, 7, &WorldGenParams::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        let err = Simulation::new(GameConfig::default(), SimulationParams::default(), w, h, 7).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }
}

fn grass_map(w: u32, h: u32) -> WorldMap {
    let mut tiles = Vec::with_capacity((w * h) as usize);
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let mut t = Tile::new(x, y);
            t.elevation = 0.5;
            t.biome = Biome::Grassland;
            t.fertility = 0.8;
            tiles.push(t);
        }
    }
    WorldMap::from_tiles(w, h, 0, WorldGenParams::default(), tiles)
}

#[test]
fn test_ten_thousand_settlements_tick_in_bounded_time() {
    let mut world = grass_map(200, 200);
    let mut settlements = SettlementManager::new(3, SettlementParams::default());
    for i in 0..10_000u32 {
        let x = (i % 100) * 2;
        let y = (i / 100) * 2;
        let s = Settlement::new(&format!("S{}", i), "Hold", Vec2::new(x as f32 + 0.5, y as f32 + 0.5), "N")
            .with_identity("folk", "tongue", "faith")
            .with_population(500);
        settlements.add_settlement(s).unwrap();
    }

    let governance = GovernanceManager::new(3, GovernanceParams::default());
    let population = PopulationManager::new(3, PopulationParams::default());
    let ctx = SettlementContext {
        governance: &governance,
        population: &population,
    };

    let started = Instant::now();
    let outcome = settlements.update(1.0, &ctx, &mut world);
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(settlements.len(), 10_000);
    assert!(outcome.influence.claimed > 0);
}

#[test]
fn test_zero_tool_assimilation_reaches_unification() {
    let mut culture = CultureManager::new(5, CultureParams::default());
    culture
        .add_identity(CulturalIdentity::new("coast", "Coast").with_trait("seafaring", 0.8))
        .unwrap();
    culture
        .add_identity(CulturalIdentity::new("hill", "Hill").with_trait("herding", 0.6))
        .unwrap();
    let id = culture
        .start_assimilation("coast", "hill", "R1", AssimilationKind::Voluntary, 0.0)
        .unwrap();
    assert!(culture.event(&id).unwrap().tools().is_empty());

    let mut finished = None;
    for tick in 1..=10_000 {
        let outcome = culture.update(1.0, tick as f64);
        if let Some(done) = outcome.completed.into_iter().next() {
            finished = Some((tick, done));
            break;
        }
    }

    let (tick, event) = finished.expect("assimilation should finish");
    assert_eq!(event.stage(), Stage::Unification);
    assert!(tick < 10_000);
    assert!(culture.identity("hill").unwrap().trait_strength("seafaring").is_some());
}
