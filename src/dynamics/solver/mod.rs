//! The per-step data shared by joints and the reference stepping context driving them.

pub use self::island_solver::IslandSolver;
pub use self::solver_data::{SolverData, SolverPosition, SolverVelocity, TimeStep};

mod island_solver;
mod solver_data;
