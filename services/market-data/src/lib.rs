pub mod types;
pub mod sources {
    pub mod memory;
    pub mod yahoo;
}

pub use sources::memory::{Fixture, InMemorySource};
pub use sources::yahoo::{YahooFinanceClient, YahooSettings};
pub use types::*;
