//! Standalone rail simulation module
//!
//! Track geometry, the connection graph between segments and the train
//! simulation that runs on top of it. Nothing in here depends on a renderer;
//! a UI reads snapshots and feeds control events.

mod circular;
mod controller;
mod events;
mod game_state;
mod history;
mod linear;
mod navigation;
mod network;
mod segment;
mod serialization;
mod station;
mod train;
mod types;
mod world;

// Re-export public types for external use
pub use circular::CircularSegment;
pub use controller::{ControlEvent, ControlQueue, Controller};
pub use events::{EventDispatcher, EventKind, ListenerId, SimEvent};
pub use game_state::{
    GameState, SimulationConfig, SimulationSnapshot, StationSnapshot, TrainSnapshot,
};
pub use history::{EditCommand, EditHistory};
pub use linear::LinearSegment;
pub use navigation::{
    easy_navigate, entry_reversing, exit_endpoint, exit_neighbors, is_network_coherent,
    TrackLocation,
};
pub use network::{Adjacency, Network};
pub use segment::{
    Bounds, ClosestPoint, PositionAlong, SegmentGeometry, TrackSegment, TrainStartPosition,
};
pub use serialization::{
    insert_record, load_network_from_file, load_network_from_json, network_to_json,
    network_to_records, records_to_network, save_network_to_file, segment_to_record,
    SegmentRecord, StationRecord,
};
pub use station::{Passenger, Station};
pub use train::{FollowingCar, Strategy, TickContext, Train, TrainConfig, TrainState};
pub use types::{
    angles_equal, normalize_angle, Alignment, Endpoint, PassengerId, Point, SegmentId, SimId,
    StationId, TrainId, ANGLE_TOLERANCE, CAR_SPACING, COLLISION_DISTANCE, JUNCTION_LOOKAHEAD,
    POSITION_TOLERANCE, STATION_OFFSET,
};
pub use world::SimWorld;
