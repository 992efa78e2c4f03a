//! Total order over decoded transcript paths.
//!
//! Byte-wise, except that the path separator sorts before every other
//! byte at the first difference. That places a directory ahead of all of
//! its descendants and keeps merge order stable regardless of what else
//! lives next to it ("/a/b" before "/a!").

use std::cmp::Ordering;

const SEP: u8 = b'/';

#[inline]
fn weight(b: u8) -> u16 {
    if b == SEP { 0 } else { u16::from(b) + 1 }
}

pub fn pathcmp_case(a: &str, b: &str, case_sensitive: bool) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = if case_sensitive {
            (x, y)
        } else {
            (x.to_ascii_lowercase(), y.to_ascii_lowercase())
        };
        match weight(x).cmp(&weight(y)) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

pub fn pathcmp(a: &str, b: &str) -> Ordering {
    pathcmp_case(a, b, true)
}

pub fn pathcasecmp(a: &str, b: &str) -> Ordering {
    pathcmp_case(a, b, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_paths() {
        assert_eq!(pathcmp("/etc/hosts", "/etc/hosts"), Ordering::Equal);
    }

    #[test]
    fn plain_byte_order() {
        assert_eq!(pathcmp("/etc/a", "/etc/b"), Ordering::Less);
        assert_eq!(pathcmp("/etc/b", "/etc/a"), Ordering::Greater);
    }

    #[test]
    fn prefix_sorts_first() {
        assert_eq!(pathcmp("/etc", "/etc/hosts"), Ordering::Less);
        assert_eq!(pathcmp("/etc/hosts", "/etc"), Ordering::Greater);
    }

    #[test]
    fn separator_sorts_before_ordinary_bytes() {
        // '!' < '/' in raw ASCII, but a directory's children must follow
        // the directory, not interleave with its siblings
        assert_eq!(pathcmp("/a/b", "/a!"), Ordering::Less);
        assert_eq!(pathcmp("/a/b", "/a.b"), Ordering::Less);
        assert_eq!(pathcmp("/a0", "/a/b"), Ordering::Greater);
    }

    #[test]
    fn case_insensitive_variant() {
        assert_eq!(pathcasecmp("/Etc/Hosts", "/etc/hosts"), Ordering::Equal);
        assert_eq!(pathcmp("/Etc", "/etc"), Ordering::Less);
    }

    #[test]
    fn transitive_over_mixed_separators() {
        let mut paths = vec!["/a!", "/a/b", "/a", "/a/b/c", "/a0"];
        paths.sort_by(|x, y| pathcmp(x, y));
        assert_eq!(paths, vec!["/a", "/a/b", "/a/b/c", "/a!", "/a0"]);
    }
}
