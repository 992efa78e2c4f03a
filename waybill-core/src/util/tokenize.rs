/// Split a transcript line into whitespace-separated fields. A blank
/// line yields no fields.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_has_no_fields() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t  \n").is_empty());
    }

    #[test]
    fn fields_split_on_any_whitespace() {
        assert_eq!(
            tokenize("f /etc/hosts\t0644  root wheel\n"),
            vec!["f", "/etc/hosts", "0644", "root", "wheel"]
        );
    }
}
