//! The provisionable graph and its registration engine.
//!
//! Concrete service configurations become [`Provisionable`] nodes, the
//! association resolver in [`edges`] precomputes requirement and
//! side-effect edges between them, and [`Operation`] walks the graph with
//! the two-phase recursive registration algorithm.

pub mod edges;
pub mod operation;
pub mod provisionable;

pub use edges::ResolvedEdge;
pub use operation::Operation;
pub use provisionable::{NodeId, Provisionable, RegistrationState};
