pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod finance_subsystem;
pub mod flow_subsystem;
pub mod law_enforcement_subsystem;
pub mod member;
pub mod network;
pub mod network_stats;
pub mod record;
pub mod rng;
pub mod seed_network;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod subsystem;
pub mod types;
