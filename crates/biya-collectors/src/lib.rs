pub mod explorer;
pub mod hourly_chain;
pub mod job;
pub mod lcd;
pub mod minute_chain;
pub mod realtime_chain;
pub mod realtime_explorer;
pub mod realtime_stake;
pub mod scheduler;
pub mod stake;
pub mod tendermint;

mod upstream;

#[cfg(test)]
mod test_support;

pub use explorer::ExplorerClient;
pub use hourly_chain::HourlyChainCollector;
pub use job::{Collector, Job};
pub use lcd::LcdClient;
pub use minute_chain::MinuteChainCollector;
pub use realtime_chain::RealtimeChainCollector;
pub use realtime_explorer::RealtimeExplorerCollector;
pub use realtime_stake::RealtimeStakeCollector;
pub use scheduler::Scheduler;
pub use stake::StakeClient;
pub use tendermint::TendermintClient;
pub use upstream::http_client;
