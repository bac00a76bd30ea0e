pub mod connectivity;
pub mod match_scraper;
pub mod matcher;
pub mod normalizer;
pub mod profile_cache;
pub mod ranking;
pub mod roster_scraper;

pub use match_scraper::MatchScraper;
pub use profile_cache::ProfileCache;
pub use ranking::RankingEngine;
pub use roster_scraper::RosterScraper;
