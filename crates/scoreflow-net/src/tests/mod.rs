//! End-to-end scenario suites exercising whole topologies through the
//! session façade.

mod invariants;
mod scenarios;
mod session;
