//! Cyclic routing oracle for the hard instance generator. Elements are the
//! arcs of a complete directed graph, so `num_elements = nodes²` with arc
//! `i -> j` at index `i * nodes + j`.

pub mod cycles;
pub mod oracle;

pub use cycles::{
    decompose_cycles, subtour_cuts, tour_from_solution, ArcAssignment, Cycle, CycleError, SubtourCut,
};
pub use oracle::{num_nodes, RoutingOracle, RoutingSolution, SubtourCallback};
