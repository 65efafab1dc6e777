//! Table of address blocks owned by cloud regions.
//!
//! Loaded once at startup from a CSV of `a.b.c.d/prefix,Region` lines and
//! never mutated afterwards.

use std::io;
use std::net::Ipv4Addr;
use std::path::Path;

use thiserror::Error;

/// One `network/prefix -> region` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEntry {
    network: u32,
    mask: u32,
    region: String,
}

impl RegionEntry {
    /// Returns `None` when `prefix_len` is larger than 32.
    pub fn new(network: Ipv4Addr, prefix_len: u8, region: impl Into<String>) -> Option<Self> {
        let mask = match prefix_len {
            0 => 0,
            1..=32 => u32::MAX << (32 - u32::from(prefix_len)),
            _ => return None,
        };

        Some(Self {
            network: u32::from(network),
            mask,
            region: region.into(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn matches(&self, addr: u32) -> bool {
        addr & self.mask == self.network & self.mask
    }
}

/// A CSV line that could not be turned into an entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct LineError {
    pub line: usize,
    pub reason: String,
}

/// Ordered region table.
///
/// Lookups return the first entry in table order whose block contains the
/// address, even when a later entry is more specific.
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    entries: Vec<RegionEntry>,
}

impl RegionTable {
    pub fn new(entries: Vec<RegionEntry>) -> Self {
        Self { entries }
    }

    /// Read and parse a region file.
    ///
    /// Only failing to read the file is an error; bad lines are skipped and
    /// returned alongside the table.
    pub fn load(path: impl AsRef<Path>) -> io::Result<(Self, Vec<LineError>)> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::parse(&contents))
    }

    /// Parse CSV contents, skipping blank lines and `#` comments.
    pub fn parse(contents: &str) -> (Self, Vec<LineError>) {
        let mut entries = Vec::new();
        let mut rejected = Vec::new();

        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Ok(entry) => entries.push(entry),
                Err(reason) => rejected.push(LineError {
                    line: index + 1,
                    reason,
                }),
            }
        }

        (Self { entries }, rejected)
    }

    /// Find the region owning `addr`.
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<&str> {
        let addr = u32::from(addr);
        self.entries
            .iter()
            .find(|entry| entry.matches(addr))
            .map(RegionEntry::region)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_line(line: &str) -> Result<RegionEntry, String> {
    let (cidr, region) = line
        .split_once(',')
        .ok_or_else(|| "expected CIDR,Region".to_string())?;
    let (addr, prefix) = cidr
        .trim()
        .split_once('/')
        .ok_or_else(|| format!("missing prefix length in {:?}", cidr))?;

    let addr: Ipv4Addr = addr
        .parse()
        .map_err(|e| format!("bad address {:?}: {}", addr, e))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|e| format!("bad prefix length {:?}: {}", prefix, e))?;

    let region = region.trim();
    if region.is_empty() {
        return Err("empty region name".to_string());
    }

    RegionEntry::new(addr, prefix, region)
        .ok_or_else(|| format!("prefix length {} is larger than 32", prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reads_entries_in_order() {
        let (table, rejected) = RegionTable::parse("72.44.32.0/19,Virginia\n54.0.0.0/8,Oregon\n");

        assert!(rejected.is_empty());
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup(Ipv4Addr::new(72, 44, 40, 1)), Some("Virginia"));
        assert_eq!(table.lookup(Ipv4Addr::new(54, 1, 2, 3)), Some("Oregon"));
    }

    #[test]
    fn lookup_misses_outside_every_block() {
        let (table, _) = RegionTable::parse("72.44.32.0/19,Virginia");

        assert_eq!(table.lookup(Ipv4Addr::new(72, 44, 64, 1)), None);
        assert_eq!(table.lookup(Ipv4Addr::new(8, 8, 8, 8)), None);
    }

    #[test]
    fn lookup_is_deterministic() {
        let (table, _) = RegionTable::parse("1.2.3.0/24,us-east\n1.2.0.0/16,us-west");
        let addr = Ipv4Addr::new(1, 2, 3, 4);

        let first = table.lookup(addr);
        for _ in 0..10 {
            assert_eq!(table.lookup(addr), first);
        }
    }

    #[test]
    fn first_entry_wins_over_more_specific_later_entry() {
        let (table, _) = RegionTable::parse("1.2.0.0/16,broad\n1.2.3.0/24,specific");

        assert_eq!(table.lookup(Ipv4Addr::new(1, 2, 3, 4)), Some("broad"));
    }

    #[test]
    fn unaligned_base_address_is_masked() {
        let (table, _) = RegionTable::parse("10.1.2.3/8,ten");

        assert_eq!(table.lookup(Ipv4Addr::new(10, 200, 0, 1)), Some("ten"));
    }

    #[test]
    fn prefix_zero_matches_everything() {
        let (table, _) = RegionTable::parse("0.0.0.0/0,anywhere");

        assert_eq!(table.lookup(Ipv4Addr::new(203, 0, 113, 9)), Some("anywhere"));
    }

    #[test]
    fn host_prefix_matches_only_that_address() {
        let (table, _) = RegionTable::parse("192.0.2.7/32,host");

        assert_eq!(table.lookup(Ipv4Addr::new(192, 0, 2, 7)), Some("host"));
        assert_eq!(table.lookup(Ipv4Addr::new(192, 0, 2, 8)), None);
    }

    #[test]
    fn malformed_lines_are_skipped_and_reported() {
        let contents = "\
1.0.0.0/8,one
garbage
2.0.0.0,missing-prefix
# comment

3.0.0.0/33,too-long
4.0.0.0/8,
5.0.0.0/8,five
";
        let (table, rejected) = RegionTable::parse(contents);

        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup(Ipv4Addr::new(5, 5, 5, 5)), Some("five"));
        let lines: Vec<usize> = rejected.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 3, 6, 7]);
    }

    #[test]
    fn load_reads_file() {
        let path = std::env::temp_dir().join(format!("regiondns-table-{}.csv", std::process::id()));
        std::fs::write(&path, "72.44.32.0/19,Virginia\nnot-a-line\n").unwrap();

        let (table, rejected) = RegionTable::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].line, 2);
    }

    #[test]
    fn load_missing_file_is_error() {
        assert!(RegionTable::load("/nonexistent/regions.csv").is_err());
    }

    #[test]
    fn entry_rejects_prefix_over_32() {
        assert!(RegionEntry::new(Ipv4Addr::UNSPECIFIED, 33, "x").is_none());
    }
}
