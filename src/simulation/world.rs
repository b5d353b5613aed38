//! Main simulation world that ties everything together
//!
//! The world owns the network being edited and, while a run is going, the
//! simulation state built from it. Editing the network ends the run.

use anyhow::{Context, Result};
use log::info;

use super::game_state::{GameState, SimulationConfig, SimulationSnapshot};
use super::network::Network;
use super::segment::TrackSegment;
use super::types::{Alignment, Point};

/// Track units per map character
const MAP_SCALE: f64 = 5.0;

/// The main simulation world
pub struct SimWorld {
    /// Track layout, stations and start positions
    pub network: Network,

    /// Running simulation, if started
    pub game_state: Option<GameState>,

    /// Settings used for the next run
    pub config: SimulationConfig,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl SimWorld {
    pub fn new(config: SimulationConfig) -> Self {
        Self::from_network(Network::new(), config)
    }

    pub fn from_network(network: Network, config: SimulationConfig) -> Self {
        Self {
            network,
            game_state: None,
            config,
        }
    }

    /// Builds trains from the network's start positions and begins a run
    pub fn start_simulation(&mut self) -> Result<()> {
        let mut state = GameState::new(self.config.clone());
        state
            .initialize_trains(&self.network)
            .context("Failed to start the simulation")?;
        info!("Simulation started with {} trains", state.trains.len());
        self.game_state = Some(state);
        Ok(())
    }

    pub fn stop_simulation(&mut self) {
        if self.game_state.take().is_some() {
            info!("Simulation stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.game_state.is_some()
    }

    pub fn game_state_mut(&mut self) -> Option<&mut GameState> {
        self.game_state.as_mut()
    }

    /// Advances the running simulation. Does nothing while stopped.
    pub fn tick(&mut self, delta_ms: f64) {
        if let Some(state) = &mut self.game_state {
            state.update(&self.network, delta_ms);
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Network for editing. A running simulation is stopped first, since its
    /// trains refer to segments that may change.
    pub fn network_mut(&mut self) -> &mut Network {
        if self.is_running() {
            info!("Network edited, stopping the running simulation");
            self.stop_simulation();
        }
        &mut self.network
    }

    pub fn snapshot(&self) -> Option<SimulationSnapshot> {
        self.game_state
            .as_ref()
            .map(|state| state.snapshot(&self.network))
    }

    /// A stadium loop with a wider loop sharing its bottom straight, three
    /// stations and two trains
    pub fn create_demo_world(seed: Option<u64>) -> Result<Self> {
        let mut network = Network::new();

        let bottom = network.add_segment(TrackSegment::linear(
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
        ))?;
        network.add_segment(TrackSegment::circular(
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(100.0, 50.0),
            true,
        )?)?;
        let top = network.add_segment(TrackSegment::linear(
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ))?;
        network.add_segment(TrackSegment::circular(
            Point::new(0.0, 100.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 50.0),
            true,
        )?)?;

        network.add_segment(TrackSegment::circular(
            Point::new(100.0, 0.0),
            Point::new(100.0, 200.0),
            Point::new(100.0, 100.0),
            true,
        )?)?;
        let outer_top = network.add_segment(TrackSegment::linear(
            Point::new(100.0, 200.0),
            Point::new(0.0, 200.0),
        ))?;
        network.add_segment(TrackSegment::circular(
            Point::new(0.0, 200.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 100.0),
            true,
        )?)?;

        network.auto_connect(false);

        network.add_station(bottom, 50.0, Alignment::Right, "Central")?;
        network.add_station(top, 50.0, Alignment::Right, "Hillside")?;
        network.add_station(outer_top, 50.0, Alignment::Right, "Lakeside")?;

        network.add_train_start_position(top, 10.0, false)?;
        network.add_train_start_position(outer_top, 10.0, false)?;

        let config = SimulationConfig {
            seed,
            ..SimulationConfig::default()
        };
        Ok(Self::from_network(network, config))
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        println!("=== Rail Simulation Summary ===");
        println!(
            "Segments: {}, Stations: {}",
            self.network.segment_count(),
            self.network.station_count()
        );

        let Some(state) = &self.game_state else {
            println!("Simulation: stopped");
            println!();
            return;
        };

        println!("Time: {:.2}s", state.time_ms / 1000.0);
        println!(
            "Delivered: {}, Lost: {}, Waiting: {}",
            state.delivered_passengers,
            state.lost_passengers,
            state.total_waiting()
        );
        if state.collision {
            println!("COLLISION");
        }
        println!();

        println!("--- Stations ---");
        for station in self.network.stations() {
            println!(
                "  {}: waiting={}",
                station.name,
                state.waiting_count(station.id)
            );
        }

        println!("--- Trains ---");
        for (index, train) in state.trains.iter().enumerate() {
            let marker = if state.selected_train == Some(index) {
                "*"
            } else {
                " "
            };
            println!(
                " {}Train {:?}: position=({:.1}, {:.1}), passengers={}/{}, strategy={:?}, {}",
                marker,
                train.id.0 .0,
                train.position.x,
                train.position.y,
                train.passengers.len(),
                train.config.capacity,
                train.strategy,
                if train.is_dwelling() {
                    "dwelling"
                } else if train.is_at_dead_end() {
                    "stuck"
                } else {
                    "moving"
                }
            );
        }
    }

    /// Draw a visual map of the world in the terminal
    pub fn draw_map(&self) {
        let Some(bounds) = self.network.get_bounds() else {
            println!("(empty network)");
            return;
        };

        let min_x = bounds.min.x - 2.0 * MAP_SCALE;
        let max_y = bounds.max.y + 2.0 * MAP_SCALE;
        let width = (bounds.width() / MAP_SCALE) as usize + 5;
        let height = (bounds.height() / MAP_SCALE) as usize + 5;
        let mut grid = vec![vec![' '; width]; height];

        // y points up in the world, rows go down on screen
        let to_grid = |point: &Point| -> (usize, usize) {
            let col = ((point.x - min_x) / MAP_SCALE).round().max(0.0) as usize;
            let row = ((max_y - point.y) / MAP_SCALE).round().max(0.0) as usize;
            (row.min(height - 1), col.min(width - 1))
        };

        // Sample every segment densely enough to leave no gaps
        for segment in self.network.segments() {
            let steps = (segment.length() / (MAP_SCALE / 2.0)).ceil().max(1.0) as usize;
            for step in 0..=steps {
                let distance = segment.length() * step as f64 / steps as f64;
                let (row, col) = to_grid(&segment.position_along(distance, false).point);
                grid[row][col] = '#';
            }
        }

        for station in self.network.stations() {
            if let Some(position) = self.network.station_position(station.id) {
                let (row, col) = to_grid(&position);
                grid[row][col] = 'S';
            }
        }

        if let Some(state) = &self.game_state {
            for train in &state.trains {
                for car in train.car_positions() {
                    let (row, col) = to_grid(&car);
                    grid[row][col] = 'c';
                }
                let (row, col) = to_grid(&train.position);
                grid[row][col] = 'T';
            }
        }

        println!("\n=== Track Map ===");
        println!("Legend: #=Track, S=Station, T=Train, c=Car");
        println!();
        for row in &grid {
            let line: String = row.iter().collect();
            println!("{}", line.trim_end());
        }
        println!();
    }
}
