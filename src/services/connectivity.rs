use std::collections::{HashMap, HashSet};

use crate::models::{ConnectivityRow, MatchRow, RosterTeam};

/// Components smaller than this are flagged: their teams share too few
/// opponents with the rest of the division for ratings to be comparable.
const SMALL_COMPONENT: u32 = 3;

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // smaller index wins so component roots are deterministic
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// Build the opponent graph of the division and label every roster team with
/// its connected component and degree. Opponents outside the roster do not
/// create vertices or edges.
pub fn report(roster: &[RosterTeam], matches: &[MatchRow]) -> Vec<ConnectivityRow> {
    let mut keys: Vec<&str> = roster.iter().map(|t| t.team_key.as_str()).collect();
    keys.sort();
    keys.dedup();
    let index: HashMap<&str, usize> = keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();

    let mut edges: HashSet<(usize, usize)> = HashSet::new();
    for row in matches {
        let (Some(&a), Some(&b)) = (
            index.get(row.team_a_key.as_str()),
            index.get(row.team_b_key.as_str()),
        ) else {
            continue;
        };
        if a == b {
            continue;
        }
        edges.insert((a.min(b), a.max(b)));
    }

    let mut sets = DisjointSet::new(keys.len());
    let mut degree = vec![0u32; keys.len()];
    for &(a, b) in &edges {
        sets.union(a, b);
        degree[a] += 1;
        degree[b] += 1;
    }

    // number components 0..N in order of their smallest member key
    let roots: Vec<usize> = (0..keys.len()).map(|i| sets.find(i)).collect();
    let mut component_ids: HashMap<usize, u32> = HashMap::new();
    let mut component_sizes: HashMap<usize, u32> = HashMap::new();
    for &root in &roots {
        *component_sizes.entry(root).or_insert(0) += 1;
    }
    for &root in &roots {
        let next_id = component_ids.len() as u32;
        component_ids.entry(root).or_insert(next_id);
    }

    let rows: Vec<ConnectivityRow> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| ConnectivityRow {
            team_key: key.to_string(),
            component_id: component_ids[&roots[i]],
            component_size: component_sizes[&roots[i]],
            degree: degree[i],
        })
        .collect();

    for row in &rows {
        if row.component_size < SMALL_COMPONENT {
            tracing::warn!(
                "Team '{}' sits in a component of size {} (degree {})",
                row.team_key,
                row.component_size,
                row.degree
            );
        }
    }
    rows
}
