mod quadtree;
mod simulation;

pub use simulation::ForceSimulation;
