use std::sync::OnceLock;

use crate::error::{PipelineError, Result};
use crate::models::{Division, Gender};

/// Base URL of the tournament platform's public API.
pub const PLATFORM_BASE: &str = "https://api.ysrankings.com/v1";

struct DivisionInfo {
    key: &'static str,
    display_name: &'static str,
    age: u8,
    gender: Gender,
    state: &'static str,
    active: bool,
}

/// All divisions this deployment ranks. Adjacent age groups must be listed so
/// cross-age opponent lookup has rosters to consult.
const DIVISIONS: &[DivisionInfo] = &[
    DivisionInfo {
        key: "az_boys_u10",
        display_name: "Arizona Boys U10",
        age: 10,
        gender: Gender::Male,
        state: "az",
        active: true,
    },
    DivisionInfo {
        key: "az_boys_u11",
        display_name: "Arizona Boys U11",
        age: 11,
        gender: Gender::Male,
        state: "az",
        active: true,
    },
    DivisionInfo {
        key: "az_boys_u12",
        display_name: "Arizona Boys U12",
        age: 12,
        gender: Gender::Male,
        state: "az",
        active: true,
    },
    DivisionInfo {
        key: "az_boys_u13",
        display_name: "Arizona Boys U13",
        age: 13,
        gender: Gender::Male,
        state: "az",
        active: true,
    },
    DivisionInfo {
        key: "az_boys_u14",
        display_name: "Arizona Boys U14",
        age: 14,
        gender: Gender::Male,
        state: "az",
        active: true,
    },
    DivisionInfo {
        key: "az_girls_u10",
        display_name: "Arizona Girls U10",
        age: 10,
        gender: Gender::Female,
        state: "az",
        active: true,
    },
    DivisionInfo {
        key: "az_girls_u11",
        display_name: "Arizona Girls U11",
        age: 11,
        gender: Gender::Female,
        state: "az",
        active: true,
    },
    DivisionInfo {
        key: "az_girls_u12",
        display_name: "Arizona Girls U12",
        age: 12,
        gender: Gender::Female,
        state: "az",
        active: true,
    },
    DivisionInfo {
        key: "az_girls_u13",
        display_name: "Arizona Girls U13",
        age: 13,
        gender: Gender::Female,
        state: "az",
        active: false,
    },
];

fn divisions() -> &'static Vec<Division> {
    static CELL: OnceLock<Vec<Division>> = OnceLock::new();
    CELL.get_or_init(|| {
        DIVISIONS
            .iter()
            .map(|info| Division {
                key: info.key.to_string(),
                display_name: info.display_name.to_string(),
                age: info.age,
                gender: info.gender,
                state: info.state.to_string(),
                roster_url: format!(
                    "{}/divisions/{}/{}/u{}/teams",
                    PLATFORM_BASE,
                    info.state,
                    info.gender.as_str(),
                    info.age
                ),
                active: info.active,
            })
            .collect()
    })
}

/// Look up a division by key; fails the run for unregistered keys.
pub fn get(key: &str) -> Result<&'static Division> {
    divisions()
        .iter()
        .find(|d| d.key == key)
        .ok_or_else(|| PipelineError::UnknownDivision(key.to_string()))
}

pub fn all() -> &'static [Division] {
    divisions()
}

/// The one-age-up division in the same state and gender, if registered.
pub fn older(division: &Division) -> Option<&'static Division> {
    divisions()
        .iter()
        .find(|d| d.state == division.state && d.gender == division.gender && d.age == division.age + 1)
}

/// The one-age-down division in the same state and gender, if registered.
pub fn younger(division: &Division) -> Option<&'static Division> {
    division.age.checked_sub(1).and_then(|age| {
        divisions()
            .iter()
            .find(|d| d.state == division.state && d.gender == division.gender && d.age == age)
    })
}

/// Per-team match-history endpoint.
pub fn history_url(external_id: &str) -> String {
    format!("{}/teams/{}/matches", PLATFORM_BASE, external_id)
}

/// Platform-wide team search endpoint; the query string is attached by the
/// caller so it gets URL-encoded.
pub fn search_url() -> String {
    format!("{}/teams/search", PLATFORM_BASE)
}
