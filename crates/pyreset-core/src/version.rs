use semver::Version;

/// Parses CPython-style version strings (`3.11.7`, `3.12`, `3.13.0rc1`) into a
/// semver `Version`. Anything that does not start with a numeric release is
/// rejected (`pypy3.10-7.3.15`, `system`).
pub fn parse_python_version(raw: &str) -> Option<Version> {
    let raw = raw.trim();
    let release_end = raw
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(raw.len());
    let (release, tag) = raw.split_at(release_end);
    let release = release.trim_end_matches('.');

    let mut parts = release
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    parts.resize(3, 0);

    let tag = tag.trim_start_matches(['-', '.']);
    if !tag.is_empty() && !tag.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return None;
    }
    let text = if tag.is_empty() {
        format!("{}.{}.{}", parts[0], parts[1], parts[2])
    } else {
        format!("{}.{}.{}-{}", parts[0], parts[1], parts[2], tag)
    };
    Version::parse(&text).ok()
}

/// `3.11.7` -> `3.11`.
pub fn python_minor_series(raw: &str) -> Option<String> {
    let version = parse_python_version(raw)?;
    Some(format!("{}.{}", version.major, version.minor))
}
