use std::collections::HashMap;

/// Collapse a display name to the "Initial. Surname" join key used to match
/// players across the point-by-point and rank datasets ("Rafael Nadal" ->
/// "R. Nadal"). Splits on the first space; names without one ("J.Wolf")
/// split on the first period instead. Anything that yields no surname is
/// returned unchanged so placeholder values survive the pass.
pub fn canonical_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let (first, rest) = match trimmed.split_once(' ') {
        Some(pair) => pair,
        None => match trimmed.split_once('.') {
            Some(pair) => pair,
            None => return raw.to_string(),
        },
    };
    let surname = rest.trim();
    let Some(initial) = first.chars().next() else {
        return raw.to_string();
    };
    if surname.is_empty() {
        return raw.to_string();
    }
    format!("{initial}. {surname}")
}

/// Missing values pass through untouched rather than being canonicalized.
pub fn canonical_name_opt(raw: Option<&str>) -> Option<String> {
    raw.map(canonical_name)
}

/// One mapping entry per distinct raw name, the way a whole column gets
/// rewritten before a join.
pub fn canonical_map<'a, I>(names: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = HashMap::new();
    for name in names {
        out.entry(name.to_string())
            .or_insert_with(|| canonical_name(name));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{canonical_name, canonical_name_opt};

    #[test]
    fn canonicalizes_full_names() {
        assert_eq!(canonical_name("Rafael Nadal"), "R. Nadal");
        assert_eq!(canonical_name("Juan Martin Del Potro"), "J. Martin Del Potro");
    }

    #[test]
    fn splits_on_period_when_no_space() {
        assert_eq!(canonical_name("J.Wolf"), "J. Wolf");
    }

    #[test]
    fn idempotent_on_already_canonical_input() {
        let once = canonical_name("Rafael Nadal");
        assert_eq!(canonical_name(&once), once);
        let dotted = canonical_name("J.-J. Wolf");
        assert_eq!(canonical_name(&dotted), dotted);
    }

    #[test]
    fn unsplittable_inputs_pass_through() {
        assert_eq!(canonical_name("Nadal"), "Nadal");
        assert_eq!(canonical_name(""), "");
        assert_eq!(canonical_name_opt(None), None);
    }
}
