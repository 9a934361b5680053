//! tiledphys: tile-bucketed 2D integrator (motion, pairwise collision response, spatial queries)

pub mod types;
pub mod error;
pub mod api;
pub mod narrowphase;
pub mod shape;
pub mod mover;
pub mod context;
pub mod body;
pub mod response;
pub mod tile;
pub mod integrator;
pub mod tiled;
pub mod layer;

pub use crate::types::*;
pub use crate::api::*;
pub use crate::error::{Error, Result};
pub use crate::shape::{Polygon, Pose, Shape, SubShape};
pub use crate::mover::Mover;
pub use crate::context::SimContext;
pub use crate::body::Body;
pub use crate::tile::{Tile, TileGrid, TilePosition};
pub use crate::integrator::BruteForceIntegrator;
pub use crate::tiled::TiledIntegrator;
pub use crate::layer::Layer;
