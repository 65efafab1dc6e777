//! Region tagging for resolved answers.
//!
//! Every A answer whose address falls inside a known region block gets a
//! companion text record naming that region.

mod table;

pub use table::{LineError, RegionEntry, RegionTable};

use std::net::Ipv4Addr;

use crate::dns::ResourceRecord;

/// Content of the synthesized text record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TagFormat {
    /// Just the region, e.g. `us-east`.
    Region,
    /// Region and address, e.g. `us-east-1.2.3.4`.
    #[default]
    #[value(name = "region-address")]
    RegionAndAddress,
}

impl TagFormat {
    pub fn render(self, region: &str, addr: Ipv4Addr) -> String {
        match self {
            TagFormat::Region => region.to_string(),
            TagFormat::RegionAndAddress => format!("{}-{}", region, addr),
        }
    }
}

/// Append a text record for each A answer that maps to a region.
///
/// Synthesized records follow all original answers, in the order of the A
/// records they describe. Returns how many were added.
pub fn annotate_answers(
    table: &RegionTable,
    format: TagFormat,
    answers: &mut Vec<ResourceRecord>,
) -> usize {
    let tags: Vec<ResourceRecord> = answers
        .iter()
        .filter_map(|record| {
            let addr = record.ipv4()?;
            let region = table.lookup(addr)?;
            Some(ResourceRecord::txt(
                record.name.clone(),
                record.ttl,
                format.render(region, addr),
            ))
        })
        .collect();

    let added = tags.len();
    answers.extend(tags);
    added
}

#[cfg(test)]
mod tests {
    use std::net::Ipv6Addr;

    use super::*;
    use crate::dns::{Name, RData, RecordType};

    fn table() -> RegionTable {
        RegionTable::parse("1.2.3.0/24,us-east\n5.6.0.0/16,eu-west").0
    }

    #[test]
    fn appends_region_after_original_answers() {
        let mut answers = vec![
            ResourceRecord::cname("foo.example", 60, "bar.example"),
            ResourceRecord::a("bar.example", 60, Ipv4Addr::new(1, 2, 3, 4)),
        ];

        let added = annotate_answers(&table(), TagFormat::Region, &mut answers);

        assert_eq!(added, 1);
        assert_eq!(answers.len(), 3);
        assert_eq!(answers[2].name, Name::new("bar.example"));
        assert_eq!(answers[2].rtype, RecordType::Txt);
        assert_eq!(answers[2].rdata, RData::Text("us-east".to_string()));
    }

    #[test]
    fn region_and_address_format() {
        let mut answers = vec![ResourceRecord::a("bar.example", 60, Ipv4Addr::new(1, 2, 3, 4))];

        annotate_answers(&table(), TagFormat::RegionAndAddress, &mut answers);

        assert_eq!(answers[1].rdata, RData::Text("us-east-1.2.3.4".to_string()));
    }

    #[test]
    fn tags_keep_source_order() {
        let mut answers = vec![
            ResourceRecord::a("x", 1, Ipv4Addr::new(5, 6, 7, 8)),
            ResourceRecord::a("y", 1, Ipv4Addr::new(9, 9, 9, 9)),
            ResourceRecord::a("z", 1, Ipv4Addr::new(1, 2, 3, 200)),
        ];

        annotate_answers(&table(), TagFormat::Region, &mut answers);

        let tagged: Vec<(String, &RData)> = answers[3..]
            .iter()
            .map(|r| (r.name.to_string(), &r.rdata))
            .collect();
        assert_eq!(
            tagged,
            vec![
                ("x".to_string(), &RData::Text("eu-west".to_string())),
                ("z".to_string(), &RData::Text("us-east".to_string())),
            ]
        );
    }

    #[test]
    fn aaaa_and_unmatched_are_not_tagged() {
        let mut answers = vec![
            ResourceRecord::aaaa("v6", 1, Ipv6Addr::LOCALHOST),
            ResourceRecord::a("miss", 1, Ipv4Addr::new(8, 8, 8, 8)),
            ResourceRecord::ns("example", 1, "ns.example"),
        ];

        let added = annotate_answers(&table(), TagFormat::Region, &mut answers);

        assert_eq!(added, 0);
        assert_eq!(answers.len(), 3);
    }
}
