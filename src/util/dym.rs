//! "Did you mean ...?" suggestions based on edit distance.

/// Compute the Levenshtein distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[b.len()]
}

/// Pick the candidate closest to `given`, if any.
pub fn did_you_mean<I, S>(given: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .map(|c| (edit_distance(given, c.as_ref()), c.as_ref().to_string()))
        .min_by_key(|(dist, _)| *dist)
        .map(|(_, best)| best)
}

/// Render a trailing sentence fragment for an error message, e.g.
/// `" (Did you mean 'catch'?)"`. Empty when there is no suggestion.
pub fn dym_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (Did you mean '{}'?)", s),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("abc", "abc"), 0);
        assert_eq!(edit_distance("abc", "abd"), 1);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_did_you_mean_picks_closest() {
        let got = did_you_mean("catchh", ["Catch", "Catch-Main"]);
        assert_eq!(got.as_deref(), Some("Catch"));
    }

    #[test]
    fn test_did_you_mean_empty_candidates() {
        let got = did_you_mean("anything", Vec::<String>::new());
        assert!(got.is_none());
    }

    #[test]
    fn test_dym_suffix() {
        assert_eq!(dym_suffix(&None), "");
        assert_eq!(
            dym_suffix(&Some("spdlog".to_string())),
            " (Did you mean 'spdlog'?)"
        );
    }
}
