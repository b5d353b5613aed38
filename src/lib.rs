//! Rail Simulation Library
//!
//! Track networks made of straight and curved segments, and trains that run
//! on them carrying passengers between stations.

pub mod simulation;
