//! LIST / MLSD response parser.
//!
//! Supports three formats:
//! 1. **Unix-style** (`ls -l`): `-rwxr-xr-x 1 owner group 1234 Jan  1 12:00 file.txt`
//! 2. **Windows/IIS-style**: `01-01-26  12:00AM       1234 file.txt`
//! 3. **MLSD facts** (RFC 3659): `type=file;size=1234;modify=20260101120000; file.txt`
//!
//! Entries are returned as the server sent them, `.` and `..` included.

use crate::types::{FtpEntry, FtpEntryKind};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref UNIX_RE: Regex = Regex::new(
        r"(?x)
        ^([dlcbps-][rwxsStT-]{9})[+@.]?\s+  # permissions
        (\d+)\s+                          # link count
        (\S+)\s+                          # owner
        (\S+)\s+                          # group
        (\d+)\s+                          # size
        (\w{3}\s+\d{1,2}\s+[\d:]+)\s+    # date
        (.+)$                             # filename (possibly with -> target)
        ",
    )
    .expect("static regex");
    static ref WINDOWS_RE: Regex = Regex::new(
        r"(?x)
        ^(\d{2}-\d{2}-\d{2})\s+          # date
        (\d{1,2}:\d{2}(?:AM|PM)?)\s+     # time
        (<DIR>|\d+)\s+                    # size or <DIR>
        (.+)$                             # filename
        ",
    )
    .expect("static regex");
    static ref TOTAL_RE: Regex = Regex::new(r"^total\s+\d+$").expect("static regex");
}

/// Parse a full multi-line LIST or MLSD response body.
pub fn parse_listing(raw: &str) -> Vec<FtpEntry> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !TOTAL_RE.is_match(l))
        .filter_map(parse_line)
        .collect()
}

/// Parse a single line from a listing.
pub fn parse_line(line: &str) -> Option<FtpEntry> {
    if line.contains(';') && line.contains('=') {
        if let Some(e) = parse_mlsd(line) {
            return Some(e);
        }
    }
    if let Some(e) = parse_unix(line) {
        return Some(e);
    }
    if let Some(e) = parse_windows(line) {
        return Some(e);
    }

    // Fallback: treat the whole line as a filename
    Some(FtpEntry {
        name: line.to_string(),
        kind: FtpEntryKind::Unknown,
        size: 0,
        modified: None,
        permissions: None,
        owner: None,
        group: None,
        link_target: None,
        raw: Some(line.to_string()),
        facts: HashMap::new(),
    })
}

// ─── MLSD parser ─────────────────────────────────────────────────────

/// Parse MLSD fact-line: `fact1=val1;fact2=val2; filename`
fn parse_mlsd(line: &str) -> Option<FtpEntry> {
    let (facts_str, name) = if let Some(pos) = line.find("; ") {
        (&line[..pos + 1], line[pos + 2..].to_string())
    } else if let Some(pos) = line.rfind(' ') {
        (&line[..pos], line[pos + 1..].to_string())
    } else {
        return None;
    };

    if name.is_empty() {
        return None;
    }

    let facts: HashMap<String, String> = facts_str
        .split(';')
        .filter_map(|segment| segment.trim().split_once('='))
        .map(|(k, v)| (k.to_lowercase(), v.to_string()))
        .collect();

    let kind = match facts.get("type").map(|s| s.to_lowercase()).as_deref() {
        Some("dir") | Some("cdir") | Some("pdir") => FtpEntryKind::Directory,
        Some("file") => FtpEntryKind::File,
        Some("os.unix=symlink") | Some("os.unix=slink") => FtpEntryKind::Symlink,
        _ => FtpEntryKind::Unknown,
    };

    let size = facts
        .get("size")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    Some(FtpEntry {
        name,
        kind,
        size,
        modified: facts.get("modify").and_then(|v| parse_mlsd_time(v)),
        permissions: facts.get("unix.mode").cloned(),
        owner: facts.get("unix.owner").cloned(),
        group: facts.get("unix.group").cloned(),
        link_target: None,
        raw: Some(line.to_string()),
        facts,
    })
}

/// Parse an MLSD/MDTM timestamp: `YYYYMMDDHHmmSS[.fraction]`
pub fn parse_mlsd_time(s: &str) -> Option<DateTime<Utc>> {
    let base = s.get(..14).unwrap_or(s);
    NaiveDateTime::parse_from_str(base, "%Y%m%d%H%M%S")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

// ─── Unix-style parser ───────────────────────────────────────────────

/// ```text
/// drwxr-xr-x   2 user group  4096 Jan  1 12:00 dirname
/// -rw-r--r--   1 user group  1234 Jan  1  2025 file.txt
/// lrwxrwxrwx   1 user group    42 Jan  1 12:00 link -> target
/// ```
fn parse_unix(line: &str) -> Option<FtpEntry> {
    let caps = UNIX_RE.captures(line)?;

    let perms = caps.get(1)?.as_str();
    let owner = caps.get(3).map(|m| m.as_str().to_string());
    let group = caps.get(4).map(|m| m.as_str().to_string());
    let size = caps.get(5)?.as_str().parse::<u64>().unwrap_or(0);
    let date_str = caps.get(6)?.as_str();
    let name_raw = caps.get(7)?.as_str();

    let kind = match perms.as_bytes().first() {
        Some(b'd') => FtpEntryKind::Directory,
        Some(b'l') => FtpEntryKind::Symlink,
        Some(b'-') => FtpEntryKind::File,
        _ => FtpEntryKind::Unknown,
    };

    let (name, link_target) = match name_raw.split_once(" -> ") {
        Some((name, target)) if kind == FtpEntryKind::Symlink => {
            (name.to_string(), Some(target.to_string()))
        }
        _ => (name_raw.to_string(), None),
    };

    Some(FtpEntry {
        name,
        kind,
        size,
        modified: parse_unix_date(date_str),
        permissions: Some(perms.to_string()),
        owner,
        group,
        link_target,
        raw: Some(line.to_string()),
        facts: HashMap::new(),
    })
}

/// Parse the date portion: "Jan  1 12:00" or "Jan  1  2025"
fn parse_unix_date(s: &str) -> Option<DateTime<Utc>> {
    let normalised = s.split_whitespace().collect::<Vec<_>>().join(" ");

    // "Jan 1 12:00" (current year implied)
    if let Ok(dt) = NaiveDateTime::parse_from_str(
        &format!("{} {}", Utc::now().format("%Y"), normalised),
        "%Y %b %d %H:%M",
    ) {
        return Some(Utc.from_utc_datetime(&dt));
    }

    // "Jan 1 2025" (no time)
    if let Ok(date) = NaiveDate::parse_from_str(&normalised, "%b %d %Y") {
        let dt = date.and_time(NaiveTime::from_hms_opt(0, 0, 0)?);
        return Some(Utc.from_utc_datetime(&dt));
    }

    None
}

// ─── Windows-style parser ────────────────────────────────────────────

/// ```text
/// 01-01-26  12:00AM       1234 file.txt
/// 01-01-26  12:00PM      <DIR> Directory Name
/// ```
fn parse_windows(line: &str) -> Option<FtpEntry> {
    let caps = WINDOWS_RE.captures(line)?;

    let date_str = caps.get(1)?.as_str();
    let time_str = caps.get(2)?.as_str();
    let size_or_dir = caps.get(3)?.as_str();
    let name = caps.get(4)?.as_str().to_string();

    let (kind, size) = if size_or_dir == "<DIR>" {
        (FtpEntryKind::Directory, 0)
    } else {
        (FtpEntryKind::File, size_or_dir.parse::<u64>().unwrap_or(0))
    };

    Some(FtpEntry {
        name,
        kind,
        size,
        modified: parse_windows_date(date_str, time_str),
        permissions: None,
        owner: None,
        group: None,
        link_target: None,
        raw: Some(line.to_string()),
        facts: HashMap::new(),
    })
}

fn parse_windows_date(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let combined = format!("{} {}", date, time);
    NaiveDateTime::parse_from_str(&combined, "%m-%d-%y %I:%M%p")
        .or_else(|_| NaiveDateTime::parse_from_str(&combined, "%m-%d-%y %H:%M"))
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn unix_file() {
        let entries = parse_listing("-rw-r--r--   1 user group  1234 Jan  1 12:00 readme.txt");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "readme.txt");
        assert_eq!(entries[0].kind, FtpEntryKind::File);
        assert_eq!(entries[0].size, 1234);
        assert_eq!(entries[0].owner.as_deref(), Some("user"));
    }

    #[test]
    fn unix_dir_with_spaces_in_name() {
        let entries = parse_listing("drwxr-xr-x   2 root root  4096 Mar  1 09:30 sub dir");
        assert_eq!(entries[0].kind, FtpEntryKind::Directory);
        assert_eq!(entries[0].name, "sub dir");
    }

    #[test]
    fn unix_symlink() {
        let entries = parse_listing("lrwxrwxrwx   1 root root    22 Jan  5 08:00 link -> /var/target");
        assert_eq!(entries[0].kind, FtpEntryKind::Symlink);
        assert_eq!(entries[0].name, "link");
        assert_eq!(entries[0].link_target.as_deref(), Some("/var/target"));
    }

    #[test]
    fn unix_date_with_year() {
        let entries = parse_listing("-rw-r--r--   1 u g  5 Jan  1  2025 old.txt");
        assert_eq!(entries[0].modified.unwrap().year(), 2025);
    }

    #[test]
    fn skips_total_line_and_keeps_dots() {
        let raw = "total 8\r\n\
                   drwxr-xr-x 2 u g 4096 Jan  1 12:00 .\r\n\
                   drwxr-xr-x 2 u g 4096 Jan  1 12:00 ..\r\n\
                   -rw-r--r-- 1 u g 3 Jan  1 12:00 a.txt\r\n";
        let names: Vec<_> = parse_listing(raw).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec![".", "..", "a.txt"]);
    }

    #[test]
    fn mlsd() {
        let entries = parse_listing("type=file;size=1024;modify=20260101120000; example.bin");
        assert_eq!(entries[0].name, "example.bin");
        assert_eq!(entries[0].kind, FtpEntryKind::File);
        assert_eq!(entries[0].size, 1024);
        assert_eq!(entries[0].modified.unwrap().year(), 2026);
    }

    #[test]
    fn windows_dir() {
        let entries = parse_listing("01-01-26  12:00AM      <DIR> My Documents");
        assert_eq!(entries[0].kind, FtpEntryKind::Directory);
        assert_eq!(entries[0].name, "My Documents");
    }

    #[test]
    fn unknown_line_falls_back_to_name() {
        let entries = parse_listing("weird");
        assert_eq!(entries[0].kind, FtpEntryKind::Unknown);
        assert_eq!(entries[0].name, "weird");
    }
}
