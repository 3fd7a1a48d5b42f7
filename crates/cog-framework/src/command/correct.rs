//! Typo correction for command names.

/// Optimal string alignment distance: insertions, deletions, substitutions
/// and transpositions of adjacent characters each cost one.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    let mut table = vec![vec![0usize; m + 1]; n + 1];
    for (i, row) in table.iter_mut().enumerate() {
        row[0] = i;
    }
    table[0] = (0..=m).collect();

    for i in 1..=n {
        for j in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (table[i - 1][j] + 1)
                .min(table[i][j - 1] + 1)
                .min(table[i - 1][j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(table[i - 2][j - 2] + 1);
            }
            table[i][j] = best;
        }
    }

    table[n][m]
}

/// Returns the candidate closest to `input` within `max_distance`.
///
/// Ties go to the lexicographically smallest candidate. An exact match is
/// returned as is.
pub fn nearest<'a, I>(input: &str, candidates: I, max_distance: usize) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, &str)> = None;
    for candidate in candidates {
        let distance = edit_distance(input, candidate);
        if distance > max_distance {
            continue;
        }
        let better = match best {
            None => true,
            Some((d, name)) => distance < d || (distance == d && candidate < name),
        };
        if better {
            best = Some((distance, candidate));
        }
    }
    best.map(|(_, name)| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance_basics() {
        assert_eq!(edit_distance("ping", "ping"), 0);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_transposition_costs_one() {
        assert_eq!(edit_distance("pnig", "ping"), 1);
    }

    #[test]
    fn test_nearest_within_threshold() {
        let names = ["ping", "help", "ban"];
        assert_eq!(nearest("pnig", names, 2).as_deref(), Some("ping"));
        assert_eq!(nearest("zzz", names, 2), None);
    }

    #[test]
    fn test_nearest_tie_break_is_stable() {
        assert_eq!(nearest("bat", ["cat", "bar"], 1).as_deref(), Some("bar"));
        assert_eq!(nearest("bat", ["bar", "cat"], 1).as_deref(), Some("bar"));
    }
}
