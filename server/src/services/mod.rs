pub mod fleet_simulator;
