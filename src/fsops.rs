//! Host filesystem glue: path normalization and `fopen`-style mode parsing.

use std::fs::OpenOptions;

/// Normalize a device-supplied path the way FOPEN does: lowercase, strip a
/// leading 3-character drive prefix (`A:\`-style), normalize `\` to `/`,
/// keep only the last `/`-separated segment, and drop a leading two-byte
/// `X:` drive marker if one remains.
///
/// Guarantees (tested): the result never contains `\`, and never contains
/// a `/`-delimited prefix before its last segment — `stat`/`fopen` always
/// see a bare filename confined to the current directory.
pub fn normalize_fopen_path(raw: &str) -> String {
    let mut s = raw.to_lowercase();
    if s.len() > 3 {
        s = s[3..].to_string();
    }
    let s = s.replace('\\', "/");
    let mut s = match s.rfind('/') {
        Some(idx) => s[idx + 1..].to_string(),
        None => s,
    };
    if s.len() > 1 && s.as_bytes()[1] == b':' {
        s = s[2..].to_string();
    }
    s
}

/// Result of normalizing a FINDFIRST path argument.
pub enum FindMode {
    /// Enumerate the directory at this host-relative path (joined to cwd).
    Listing(String),
    /// Stat this single host-relative path.
    SingleFile(String),
}

/// Normalize a FINDFIRST path: strip a leading 3-character drive prefix,
/// normalize `\` to `/`, and switch to listing mode if `*.*` appears
/// anywhere, truncating the path there. Unlike FOPEN this does *not*
/// reduce to the last `/` segment — a listing request legitimately names
/// a subdirectory.
pub fn normalize_findfirst_path(raw: &str) -> FindMode {
    let mut s = raw.to_string();
    if s.len() > 3 {
        s = s[3..].to_string();
    }
    let s = s.replace('\\', "/");
    match s.find("*.*") {
        Some(idx) => FindMode::Listing(s[..idx].to_string()),
        None => FindMode::SingleFile(s),
    }
}

/// Translate a C-style `fopen` mode string (`"r"`, `"w"`, `"r+"`, `"ab"`, ...)
/// into `OpenOptions`. Unrecognized leading characters default to
/// read-only, matching `fopen`'s own behavior of failing open() rather
/// than guessing.
pub fn open_options_for_mode(mode: &str) -> OpenOptions {
    let mut opts = OpenOptions::new();
    let plus = mode.contains('+');
    if mode.contains('a') || mode.contains('A') {
        opts.append(true).create(true);
        if plus {
            opts.read(true);
        }
    } else if mode.contains('w') || mode.contains('W') {
        opts.write(true).create(true).truncate(true);
        if plus {
            opts.read(true);
        }
    } else {
        opts.read(true);
        if plus {
            opts.write(true);
        }
    }
    opts
}

/// Whether an fopen-style mode string requests write access for a
/// not-yet-existing file (governs FOPEN's refuse-if-exists rule).
pub fn mode_requests_write(mode: &str) -> bool {
    mode.contains('w') || mode.contains('W')
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fopen_normalization_strips_drive_and_flattens_slashes() {
        assert_eq!(normalize_fopen_path("A:\\TEST.BIN"), "test.bin");
    }

    #[test]
    fn fopen_normalization_keeps_only_last_segment() {
        let out = normalize_fopen_path("A:\\sub\\dir\\FILE.BIN");
        assert!(!out.contains('\\'));
        assert!(!out.contains('/'));
        assert_eq!(out, "file.bin");
    }

    #[test]
    fn fopen_normalization_strips_residual_drive_marker() {
        assert_eq!(normalize_fopen_path("c:test.bin"), "test.bin");
    }

    #[test]
    fn fopen_normalization_never_leaves_a_path_prefix() {
        for raw in ["A:\\foo\\bar\\baz.bin", "short", "A:\\x"] {
            let out = normalize_fopen_path(raw);
            assert!(!out.contains('\\'));
            assert!(!out.contains('/'));
        }
    }

    #[test]
    fn findfirst_detects_listing_mode() {
        match normalize_findfirst_path("A:\\*.*") {
            FindMode::Listing(dir) => assert_eq!(dir, ""),
            FindMode::SingleFile(_) => panic!("expected listing mode"),
        }
    }

    #[test]
    fn findfirst_subdir_listing_keeps_directory() {
        match normalize_findfirst_path("A:\\sub\\*.*") {
            FindMode::Listing(dir) => assert_eq!(dir, "sub/"),
            FindMode::SingleFile(_) => panic!("expected listing mode"),
        }
    }

    #[test]
    fn findfirst_without_wildcard_is_single_file() {
        match normalize_findfirst_path("A:\\file.bin") {
            FindMode::SingleFile(s) => assert_eq!(s, "file.bin"),
            FindMode::Listing(_) => panic!("expected single file mode"),
        }
    }

    #[test]
    fn mode_write_detection_is_case_insensitive() {
        assert!(mode_requests_write("w"));
        assert!(mode_requests_write("W"));
        assert!(!mode_requests_write("r"));
    }
}
