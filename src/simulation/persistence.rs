//! Binary save files
//!
//! Layout (little-endian):
//! - 120-byte [`SaveHeader`]: magic, version, game options, map geometry
//! - `width * height` 64-byte [`TileRecord`]s in row-major order
//! - optional trailer: `u64` length followed by JSON of every manager's state
//!
//! A file without a trailer still loads: the map comes back exactly and the
//! managers start empty.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ai::AiManager;
use crate::core::clock::SimClock;
use crate::core::config::SimulationParams;
use crate::core::error::{CivError, Result};
use crate::core::game_config::GameConfig;
use crate::culture::CultureManager;
use crate::diplomacy::DiplomacyManager;
use crate::economy::EconomyManager;
use crate::governance::GovernanceManager;
use crate::journal::EventKind;
use crate::knowledge::KnowledgeManager;
use crate::language::LanguageManager;
use crate::military::MilitaryManager;
use crate::population::PopulationManager;
use crate::settlement::SettlementManager;
use crate::simulation::{NationSpec, SimState, Simulation};
use crate::world::{Biome, Terrain, Tile, WorldMap, WorldState};

/// 'CIVS'
pub const SAVE_MAGIC: u32 = 0x4349_5653;
pub const SAVE_VERSION: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SaveHeader {
    pub magic: u32,
    pub version: u32,
    pub name: [u8; 64],
    pub game_version: [u8; 16],
    pub start_year: i32,
    pub difficulty: i32,
    pub flags: u32,
    pub autosave_interval: i32,
    pub map_width: u32,
    pub map_height: u32,
    pub map_seed: u32,
    pub sea_level: f32,
}

pub const SAVE_HEADER_SIZE: usize = std::mem::size_of::<SaveHeader>();

/// On-disk tile; `owner_id` is NUL-terminated
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TileRecord {
    pub x: i32,
    pub y: i32,
    pub elevation: f32,
    pub moisture: f32,
    pub temperature: f32,
    pub terrain: u8,
    pub biome: u8,
    pub has_river: u8,
    pub has_resource: u8,
    pub vegetation_density: f32,
    pub fertility: f32,
    pub resources: f32,
    pub owner_id: [u8; 16],
    pub cultural_influence: f32,
    pub population_density: f32,
    pub political_influence: f32,
}

pub const TILE_RECORD_SIZE: usize = std::mem::size_of::<TileRecord>();

impl TileRecord {
    pub fn from_tile(t: &Tile) -> Self {
        let mut r = TileRecord::zeroed();
        r.x = t.x;
        r.y = t.y;
        r.elevation = t.elevation;
        r.moisture = t.moisture;
        r.temperature = t.temperature;
        r.terrain = t.terrain as u8;
        r.biome = t.biome as u8;
        r.has_river = u8::from(t.has_river);
        r.has_resource = u8::from(t.has_resource);
        r.vegetation_density = t.vegetation_density;
        r.fertility = t.fertility;
        r.resources = t.resources;
        write_cstr(&mut r.owner_id, &t.owner_id);
        r.cultural_influence = t.cultural_influence;
        r.population_density = t.population_density;
        r.political_influence = t.political_influence;
        r
    }

    pub fn to_tile(&self) -> Result<Tile> {
        let terrain = Terrain::from_u8(self.terrain)
            .ok_or_else(|| CivError::InvalidArgument(format!("bad terrain byte {}", self.terrain)))?;
        let biome = Biome::from_u8(self.biome)
            .ok_or_else(|| CivError::InvalidArgument(format!("bad biome byte {}", self.biome)))?;
        Ok(Tile {
            x: self.x,
            y: self.y,
            elevation: self.elevation,
            moisture: self.moisture,
            temperature: self.temperature,
            terrain,
            biome,
            vegetation_density: self.vegetation_density,
            fertility: self.fertility,
            resources: self.resources,
            has_river: self.has_river != 0,
            has_resource: self.has_resource != 0,
            owner_id: read_cstr(&self.owner_id),
            cultural_influence: self.cultural_influence,
            population_density: self.population_density,
            political_influence: self.political_influence,
        })
    }
}

/// Copy `s` into `dst`, truncating on a char boundary and keeping a NUL
fn write_cstr(dst: &mut [u8], s: &str) {
    let mut end = s.len().min(dst.len().saturating_sub(1));
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    dst[..end].copy_from_slice(&s.as_bytes()[..end]);
}

fn read_cstr(src: &[u8]) -> String {
    let end = src.iter().position(|b| *b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}

/// Manager state carried after the tile array
#[derive(Serialize, Deserialize)]
struct SaveTrailer {
    seed: u64,
    config: GameConfig,
    params: SimulationParams,
    clock: SimClock,
    nations: BTreeMap<String, NationSpec>,
    last_autosave: f64,
    world: WorldState,
    population: PopulationManager,
    economy: EconomyManager,
    settlements: SettlementManager,
    culture: CultureManager,
    language: LanguageManager,
    governance: GovernanceManager,
    diplomacy: DiplomacyManager,
    knowledge: KnowledgeManager,
    ai: AiManager,
    military: MilitaryManager,
}

pub(super) fn save(sim: &mut Simulation, path: &Path) -> Result<()> {
    let previous = match sim.state {
        SimState::Running | SimState::Paused | SimState::Initializing => sim.state,
        other => return Err(CivError::InvalidState(format!("cannot save while {:?}", other))),
    };
    sim.state = SimState::Saving;
    let result = write_save(sim, path);
    sim.state = previous;

    match &result {
        Ok(bytes) => {
            info!("[Save] Wrote {} ({} bytes)", path.display(), bytes);
            sim.record(EventKind::SimulationSaved, &path.display().to_string(), &bytes.to_le_bytes());
        }
        Err(e) => warn!("[Save] Writing {} failed: {}", path.display(), e),
    }
    result.map(|_| ())
}

fn write_save(sim: &Simulation, path: &Path) -> Result<u64> {
    let world = &sim.world;
    let mut header = SaveHeader::zeroed();
    header.magic = SAVE_MAGIC;
    header.version = SAVE_VERSION;
    write_cstr(&mut header.name, &sim.config.name);
    write_cstr(&mut header.game_version, &sim.config.version);
    header.start_year = sim.config.start_year;
    header.difficulty = sim.config.difficulty;
    header.flags = sim.config.flags();
    header.autosave_interval = sim.config.autosave_interval;
    header.map_width = world.width();
    header.map_height = world.height();
    header.map_seed = (world.seed() & 0xFFFF_FFFF) as u32;
    header.sea_level = world.sea_level();

    let records: Vec<TileRecord> = world.tiles().iter().map(TileRecord::from_tile).collect();

    let trailer = SaveTrailer {
        seed: sim.seed,
        config: sim.config.clone(),
        params: sim.params.clone(),
        clock: sim.clock.clone(),
        nations: sim.nations.clone(),
        last_autosave: sim.last_autosave,
        world: world.state(),
        population: sim.population.clone(),
        economy: sim.economy.clone(),
        settlements: sim.settlements.clone(),
        culture: sim.culture.clone(),
        language: sim.language.clone(),
        governance: sim.governance.clone(),
        diplomacy: sim.diplomacy.clone(),
        knowledge: sim.knowledge.clone(),
        ai: sim.ai.clone(),
        military: sim.military.clone(),
    };
    let json = serde_json::to_vec(&trailer)?;

    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(bytemuck::bytes_of(&header))?;
    out.write_all(bytemuck::cast_slice(&records))?;
    out.write_all(&(json.len() as u64).to_le_bytes())?;
    out.write_all(&json)?;
    out.flush()?;

    Ok((SAVE_HEADER_SIZE + records.len() * TILE_RECORD_SIZE + 8 + json.len()) as u64)
}

pub(super) fn load(path: &Path) -> Result<Simulation> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;

    if bytes.len() < SAVE_HEADER_SIZE {
        return Err(CivError::InvalidArgument(format!(
            "save {} is shorter than its header ({} bytes)",
            path.display(),
            bytes.len()
        )));
    }
    let header: SaveHeader = bytemuck::pod_read_unaligned(&bytes[..SAVE_HEADER_SIZE]);
    if header.magic != SAVE_MAGIC {
        return Err(CivError::InvalidArgument(format!(
            "{} is not a save file (magic {:#010x})",
            path.display(),
            header.magic
        )));
    }
    if header.version != SAVE_VERSION {
        return Err(CivError::InvalidArgument(format!(
            "save version {} is not supported",
            header.version
        )));
    }

    let (width, height) = (header.map_width, header.map_height);
    crate::world::generator::validate_dimensions(width, height)?;
    let count = width as usize * height as usize;
    let tiles_end = SAVE_HEADER_SIZE + count * TILE_RECORD_SIZE;
    if bytes.len() < tiles_end {
        return Err(CivError::InvalidArgument(format!(
            "save {} is truncated: {} tiles expected",
            path.display(),
            count
        )));
    }

    let mut tiles = Vec::new();
    tiles
        .try_reserve_exact(count)
        .map_err(|e| CivError::OutOfMemory(format!("{} tiles: {}", count, e)))?;
    for chunk in bytes[SAVE_HEADER_SIZE..tiles_end].chunks_exact(TILE_RECORD_SIZE) {
        let record: TileRecord = bytemuck::pod_read_unaligned(chunk);
        tiles.push(record.to_tile()?);
    }

    let mut config = GameConfig {
        name: read_cstr(&header.name),
        version: read_cstr(&header.game_version),
        start_year: header.start_year,
        difficulty: header.difficulty,
        autosave_interval: header.autosave_interval,
        ..GameConfig::default()
    };
    config.apply_flags(header.flags);

    let rest = &bytes[tiles_end..];
    let mut sim = if rest.len() >= 8 {
        let mut len = [0u8; 8];
        len.copy_from_slice(&rest[..8]);
        let json = usize::try_from(u64::from_le_bytes(len))
            .ok()
            .and_then(|len| 8usize.checked_add(len))
            .and_then(|end| rest.get(8..end))
            .ok_or_else(|| CivError::InvalidArgument(format!("save {} has a truncated trailer", path.display())))?;
        let trailer: SaveTrailer = serde_json::from_slice(json)?;
        config.max_event_log = trailer.config.max_event_log;
        restore(config, tiles, width, height, trailer)?
    } else {
        let mut params = SimulationParams::default();
        params.world.sea_level = header.sea_level;
        let seed = header.map_seed as u64;
        let world = WorldMap::from_tiles(width, height, seed, params.world.clone(), tiles);
        Simulation::assemble(config, params, seed, world)
    };

    sim.state = SimState::Loading;
    info!(
        "[Save] Loaded {} ({}x{}, {} nations, tick {})",
        path.display(),
        width,
        height,
        sim.nations.len(),
        sim.clock.current_tick()
    );
    sim.record(EventKind::SimulationLoaded, &path.display().to_string(), &[]);
    sim.state = SimState::Running;
    Ok(sim)
}

fn restore(config: GameConfig, tiles: Vec<Tile>, width: u32, height: u32, t: SaveTrailer) -> Result<Simulation> {
    t.params.validate()?;
    let world = WorldMap::from_state(width, height, tiles, t.world)?;
    let mut sim = Simulation::assemble(config, t.params, t.seed, world);
    sim.clock = t.clock;
    sim.nations = t.nations;
    sim.last_autosave = t.last_autosave;
    sim.population = t.population;
    sim.economy = t.economy;
    sim.settlements = t.settlements;
    sim.culture = t.culture;
    sim.language = t.language;
    sim.governance = t.governance;
    sim.diplomacy = t.diplomacy;
    sim.knowledge = t.knowledge;
    sim.ai = t.ai;
    sim.military = t.military;
    sim.journal.set_clock(sim.clock.current_tick().min(u32::MAX as u64) as u32);
    Ok(sim)
}
