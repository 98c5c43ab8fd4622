use std::cmp::Ordering;

/// The `<surt> <timestamp>` prefix of a serialized CDX line.
///
/// Lines with fewer than two spaces are their own key.
pub fn sort_key(line: &str) -> &str {
    let mut spaces = line.match_indices(' ').map(|(index, _)| index);
    match (spaces.next(), spaces.next()) {
        (Some(_), Some(second)) => &line[..second],
        _ => line,
    }
}

pub fn compare_lines(a: &str, b: &str) -> Ordering {
    sort_key(a).cmp(sort_key(b))
}
