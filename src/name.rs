//! Name canonicalization: turns whatever a player typed into a `(cjoin(...))`
//! into the strict `BODY[.SUFFIX]` form the rest of the server assumes, and
//! resolves collisions against already-seated players.

/// Maximum bytes in the body component (before any `.suffix`).
pub const BODY_SIZE: usize = 8;
/// Maximum bytes in the suffix component (after the last `.`).
pub const SUFFIX_SIZE: usize = 3;

const RESERVED: [&str; 3] = ["ALL", "ANY", "SERVER"];

/// Applies the six-step canonicalization pipeline to a raw name token:
/// drop spaces, drop everything that isn't alphanumeric or `.`, strip
/// leading/trailing dots, collapse every dot but the last, uppercase, then
/// truncate body/suffix to their size limits.
pub fn canonicalize(raw: &str) -> String {
    let no_spaces: String = raw.chars().filter(|&c| c != ' ').collect();
    let legal: String =
        no_spaces.chars().filter(|&c| c.is_ascii_alphanumeric() || c == '.').collect();
    let trimmed = legal.trim_matches('.');
    let collapsed = collapse_dots(trimmed);
    let upper = collapsed.to_ascii_uppercase();
    truncate(&upper)
}

/// Drops every `.` except the last one in the string, preserving the
/// relative order of all other characters.
fn collapse_dots(s: &str) -> String {
    let dot_positions: Vec<usize> = s.match_indices('.').map(|(i, _)| i).collect();
    let Some(&last) = dot_positions.last() else {
        return s.to_string();
    };
    if dot_positions.len() == 1 {
        return s.to_string();
    }
    s.char_indices().filter(|&(i, c)| c != '.' || i == last).map(|(_, c)| c).collect()
}

fn truncate(s: &str) -> String {
    match s.find('.') {
        Some(dot) => {
            let body: String = s[..dot].chars().take(BODY_SIZE).collect();
            let suffix: String = s[dot + 1..].chars().take(SUFFIX_SIZE).collect();
            format!("{body}.{suffix}")
        }
        None => s.chars().take(BODY_SIZE).collect(),
    }
}

fn split_body_suffix(s: &str) -> (&str, Option<&str>) {
    match s.find('.') {
        Some(dot) => (&s[..dot], Some(&s[dot + 1..])),
        None => (s, None),
    }
}

fn digit_len(mut n: u32) -> usize {
    if n == 0 {
        return 1;
    }
    let mut len = 0;
    while n > 0 {
        len += 1;
        n /= 10;
    }
    len
}

/// Why a name could not be assigned at all (canonicalizes to nothing
/// usable, or collides with a word the protocol reserves for addressing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameError {
    Empty,
    Reserved,
}

/// Canonicalizes `raw` and, if it collides with an already-seated name,
/// appends a `~N` disambiguator (N = 1..=30) to the body, shrinking the body
/// to make room for the digits as N grows past 9. `is_taken` should report
/// whether a candidate canonical name is already in use by another slot.
pub fn assign_unique(raw: &str, is_taken: impl Fn(&str) -> bool) -> Result<String, NameError> {
    let canon = canonicalize(raw);
    if canon.is_empty() {
        return Err(NameError::Empty);
    }
    if RESERVED.contains(&canon.as_str()) {
        return Err(NameError::Reserved);
    }
    if !is_taken(&canon) {
        return Ok(canon);
    }
    let (body, suffix) = split_body_suffix(&canon);
    let mut last_candidate = canon.clone();
    for n in 1..=30u32 {
        // The disambiguated body always loses a character to the `~`
        // itself (`BODY_SIZE - 1`), then one more per digit of `n`: a
        // single-digit suffix (n=1..9) truncates to 6, two digits (n=10..30)
        // to 5 — matching the original's `snprintf(tentative, BODYSIZE-1, ...)`
        // / `BODYSIZE-2` truncation, not the `8 - digitlen(j)` the prose
        // describes (which is internally inconsistent with invariant 4).
        let room = (BODY_SIZE - 1).saturating_sub(digit_len(n));
        let body_trunc: String = body.chars().take(room).collect();
        let candidate = match suffix {
            Some(suf) => format!("{body_trunc}~{n}.{suf}"),
            None => format!("{body_trunc}~{n}"),
        };
        last_candidate = candidate.clone();
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }
    // MAX_CLIENTS=30 bounds the number of other seated names to <=29, so
    // the loop above always finds a free slot before exhausting n=1..=30.
    Ok(last_candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_spaces_and_illegal_chars() {
        assert_eq!(canonicalize("al ice!!"), "ALICE");
    }

    #[test]
    fn strips_leading_and_trailing_dots() {
        assert_eq!(canonicalize("...bob..."), "BOB");
    }

    #[test]
    fn collapses_all_but_last_dot() {
        assert_eq!(canonicalize("a.b.c"), "AB.C");
    }

    #[test]
    fn truncates_body_and_suffix() {
        assert_eq!(canonicalize("abcdefghij.wxyz"), "ABCDEFGH.WXY");
    }

    #[test]
    fn empty_after_canonicalization_is_rejected() {
        assert_eq!(assign_unique("....", |_| false), Err(NameError::Empty));
        assert_eq!(assign_unique("!!!", |_| false), Err(NameError::Empty));
    }

    #[test]
    fn reserved_words_are_rejected() {
        assert_eq!(assign_unique("all", |_| false), Err(NameError::Reserved));
        assert_eq!(assign_unique("Server", |_| false), Err(NameError::Reserved));
    }

    #[test]
    fn collision_gets_suffix() {
        let taken = ["BOB"];
        let got = assign_unique("bob", |c| taken.contains(&c)).unwrap();
        assert_eq!(got, "BOB~1");
    }

    #[test]
    fn collision_with_suffix_keeps_suffix() {
        let taken = ["BOB.XY"];
        let got = assign_unique("bob.xy", |c| taken.contains(&c)).unwrap();
        assert_eq!(got, "BOB~1.XY");
    }

    #[test]
    fn body_shrinks_as_disambiguator_grows() {
        // Force collisions through n=9 so n=10 is reached. A single-digit
        // suffix shrinks the body to 6 ("LONGNA~1".."LONGNA~9"); at n=10 the
        // second digit shrinks it again, to 5 ("LONGN~10").
        let mut taken: Vec<String> = vec!["LONGNAME".to_string()];
        for n in 1..10 {
            taken.push(format!("LONGNA~{n}"));
        }
        let got = assign_unique("longname", |c| taken.contains(&c.to_string())).unwrap();
        assert_eq!(got, "LONGN~10");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        for raw in ["Alice", "  bo.b  ", "a..b..c", "!!!weird!!!.ext", ""] {
            let once = canonicalize(raw);
            let twice = canonicalize(&once);
            assert_eq!(once, twice);
        }
    }
}
