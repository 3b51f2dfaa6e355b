//! `(listfile)` parsing
//!
//! The listfile is the only source of file names in a classic archive. It
//! holds one name per line; lines may carry extra fields after a `;`, and
//! lines starting with `;` or `#` are comments.

/// Name of the listfile inside an archive
pub const LISTFILE_NAME: &str = "(listfile)";

/// Split listfile content into file names, dropping duplicates
pub fn parse_listfile(data: &[u8]) -> Vec<String> {
    let content = String::from_utf8_lossy(data);
    if matches!(content, std::borrow::Cow::Owned(_)) {
        log::warn!("(listfile) contains invalid UTF-8, using lossy conversion");
    }

    let mut seen = std::collections::HashSet::new();
    let names: Vec<String> = content
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(';') && !line.starts_with('#'))
        .filter_map(|line| {
            let name = line.split(';').next().unwrap_or(line).trim();
            (!name.is_empty()).then_some(name)
        })
        .filter(|name| seen.insert(name.to_ascii_uppercase()))
        .map(str::to_owned)
        .collect();

    log::debug!("Parsed {} names from {}", names.len(), LISTFILE_NAME);
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_crlf_and_comments() {
        let content = b"; header comment\r\nwar3map.j\r\n# other\r\nunits\\footman.mdx;1234\r\n\r\n";
        assert_eq!(
            parse_listfile(content),
            vec!["war3map.j".to_string(), "units\\footman.mdx".to_string()]
        );
    }

    #[test]
    fn test_case_insensitive_duplicates() {
        let content = b"File.txt\nFILE.TXT\nother.txt";
        assert_eq!(parse_listfile(content), vec!["File.txt", "other.txt"]);
    }

    #[test]
    fn test_invalid_utf8() {
        let names = parse_listfile(b"ok.txt\n\xFFbad.txt\n");
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], "ok.txt");
    }
}
