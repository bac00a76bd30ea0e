/// Format a record as "W-L-T".
pub fn format_record(wins: u32, losses: u32, ties: u32) -> String {
    format!("{}-{}-{}", wins, losses, ties)
}

/// Win percentage with ties worth half a win, in [0, 100].
pub fn win_percentage(wins: u32, losses: u32, ties: u32) -> f64 {
    let games = wins + losses + ties;
    if games == 0 {
        return 0.0;
    }
    (wins as f64 + 0.5 * ties as f64) / games as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_record() {
        assert_eq!(format_record(8, 2, 1), "8-2-1");
    }

    #[test]
    fn test_win_percentage() {
        assert_eq!(win_percentage(0, 0, 0), 0.0);
        assert_eq!(win_percentage(3, 1, 0), 75.0);
        assert_eq!(win_percentage(1, 1, 2), 50.0);
    }
}
