//! Loading of the known-identity set: the keys a dump recorded as fired.

use std::collections::HashSet;
use std::io::Read;

/// One key per line. Lines are trimmed and blank lines dropped; nothing else
/// is validated.
pub fn parse_known(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a known-identity set from `reader`. An unreadable stream is treated
/// as an empty set, which makes the removal pass a no-op.
pub fn read_known<R: Read>(mut reader: R) -> HashSet<String> {
    let mut text = String::new();
    match reader.read_to_string(&mut text) {
        Ok(_) => parse_known(&text),
        Err(e) => {
            tracing::warn!(error = %e, "could not read known identities, treating as empty");
            HashSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_trimmed_and_blanks_dropped() {
        let known = parse_known("  /src/a.rs::walk  \n\n/src/a.rs::@@anon.1\r\n\n");
        assert_eq!(known.len(), 2);
        assert!(known.contains("/src/a.rs::walk"));
        assert!(known.contains("/src/a.rs::@@anon.1"));
    }

    #[test]
    fn empty_input_is_an_empty_set() {
        assert!(parse_known("").is_empty());
        assert!(read_known(std::io::empty()).is_empty());
    }

    #[test]
    fn unreadable_input_is_an_empty_set() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("gone"))
            }
        }
        assert!(read_known(Broken).is_empty());
    }

    #[test]
    fn invalid_utf8_is_an_empty_set() {
        assert!(read_known(&[0xff, 0xfe, b'\n'][..]).is_empty());
    }

    #[test]
    fn malformed_lines_are_kept_verbatim() {
        let known = read_known("no separator here\n".as_bytes());
        assert!(known.contains("no separator here"));
    }
}
