//! Program link parsing.
//!
//! A program link is a small text file standing in for a packaged binary.
//! Its first meaningful line holds the absolute path of the real executable
//! inside the package root:
//!
//! ```text
//! #!/System/Binaries/runner
//! # generated by packer
//! /usr/bin/app
//! ```
//!
//! ## Rules
//!
//! - `#` starts a comment that runs to the end of the line, newline included.
//!   This also skips the shebang.
//! - The path line must end with a newline and hold at least 2 bytes.
//! - A path needs `len + 1` bytes of capacity; the extra byte is the NUL
//!   handed to `execv`.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to open program link \"{}\"", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("program link \"{}\" does not contain an embedded path", .path.display())]
    NoEmbeddedPath { path: PathBuf },

    #[error("embedded path in program link \"{}\" exceeds the path capacity ({capacity})", .path.display())]
    Overrun { path: PathBuf, capacity: usize },
}

/// Read the embedded target path out of the program link at `path`.
pub fn parse_link(path: &Path, capacity: usize) -> Result<PathBuf, LinkError> {
    let file = File::open(path).map_err(|source| LinkError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    match scan(BufReader::new(file), capacity) {
        Ok(Scan::Found(bytes)) => Ok(PathBuf::from(OsString::from_vec(bytes))),
        Ok(Scan::Missing) => Err(LinkError::NoEmbeddedPath {
            path: path.to_path_buf(),
        }),
        Ok(Scan::Overrun) => Err(LinkError::Overrun {
            path: path.to_path_buf(),
            capacity,
        }),
        Err(source) => Err(LinkError::Open {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Scan {
    Found(Vec<u8>),
    Missing,
    Overrun,
}

fn scan(reader: impl Read, capacity: usize) -> io::Result<Scan> {
    let mut out = Vec::with_capacity(capacity.min(256));
    let mut in_comment = false;

    for byte in reader.bytes() {
        let byte = byte?;

        if byte == b'#' {
            in_comment = true;
        }

        if in_comment {
            if byte == b'\n' {
                in_comment = false;
            }
            continue;
        }

        if out.len() + 1 > capacity {
            return Ok(Scan::Overrun);
        }

        match byte {
            b'\n' if out.len() > 1 => return Ok(Scan::Found(out)),
            b'\n' | b'\0' => return Ok(Scan::Missing),
            _ => out.push(byte),
        }
    }

    // A path line cut off by EOF is malformed.
    Ok(Scan::Missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_str(input: &str, capacity: usize) -> Scan {
        scan(input.as_bytes(), capacity).unwrap()
    }

    fn found(path: &str) -> Scan {
        Scan::Found(path.as_bytes().to_vec())
    }

    #[test]
    fn plain_path() {
        assert_eq!(scan_str("/usr/bin/app\n", 1024), found("/usr/bin/app"));
    }

    #[test]
    fn skips_shebang_and_comments() {
        let link = "#!/System/Binaries/runner\n# packer link\n#\n/usr/bin/app\n";
        assert_eq!(scan_str(link, 1024), found("/usr/bin/app"));
    }

    #[test]
    fn stops_at_first_path_line() {
        assert_eq!(scan_str("/bin/a\n/bin/b\n", 1024), found("/bin/a"));
    }

    #[test]
    fn empty_line_is_no_path() {
        assert_eq!(scan_str("#!/runner\n\n/usr/bin/app\n", 1024), Scan::Missing);
    }

    #[test]
    fn single_byte_is_no_path() {
        assert_eq!(scan_str("/\n", 1024), Scan::Missing);
    }

    #[test]
    fn two_bytes_is_a_path() {
        assert_eq!(scan_str("/a\n", 1024), found("/a"));
    }

    #[test]
    fn only_comments_is_no_path() {
        assert_eq!(scan_str("#!/runner\n# nothing\n", 1024), Scan::Missing);
        assert_eq!(scan_str("", 1024), Scan::Missing);
    }

    #[test]
    fn missing_trailing_newline_is_no_path() {
        assert_eq!(scan_str("#!/runner\n/usr/bin/app", 1024), Scan::Missing);
    }

    #[test]
    fn hash_mid_line_drops_rest_of_line() {
        assert_eq!(scan_str("/usr/bin/ap#note\np\n", 1024), found("/usr/bin/app"));
    }

    #[test]
    fn nul_in_path_is_malformed() {
        assert_eq!(scan_str("/usr/\0bin/app\n", 1024), Scan::Missing);
    }

    #[test]
    fn capacity_keeps_room_for_nul() {
        // 8 bytes of path need 9 bytes of capacity.
        assert_eq!(scan_str("/bin/app\n", 9), found("/bin/app"));
        assert_eq!(scan_str("/bin/app\n", 8), Scan::Overrun);
    }

    #[test]
    fn overrun_never_grows_past_capacity() {
        let long = format!("/{}\n", "a".repeat(4096));
        assert_eq!(scan_str(&long, 1024), Scan::Overrun);
    }

    #[test]
    fn comments_do_not_count_against_capacity() {
        let link = format!("#{}\n/bin/sh\n", "x".repeat(100));
        assert_eq!(scan_str(&link, 16), found("/bin/sh"));
    }
}
