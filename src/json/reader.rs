//! JSON parser
//!
//! Rebuilds an [`Everything`] from the record array produced by the exporter.
//! Genes are registered on first sight, so the gene order of the result is
//! the order in which genes first appear in the input.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{ReadError, Result};
use crate::model::Everything;
use crate::types::{Coord, Hits};

/// One exported hit
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonRecord {
    pub y: u32,
    pub x: u32,
    pub hits: Hits,
    pub barcode: String,
    pub gene: String,
}
impl JsonRecord {
    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

/// Parses an exported JSON document
///
/// # Examples
///
/// ```rust
/// let text = br#"[{"gene":"Actb","barcode":"BC1","x":3,"y":4,"hits":5}]"#;
/// let everything = stgene::json::parse(text).unwrap();
/// assert_eq!(everything.gene_names(), ["Actb"]);
/// assert_eq!(everything.num_hits(), 1);
/// ```
#[instrument(level = "debug", skip_all, fields(bytes = bytes.len()))]
pub fn parse(bytes: &[u8]) -> Result<Everything> {
    let records: Vec<JsonRecord> = serde_json::from_slice(bytes)?;
    let everything = from_records(records)?;
    debug!(
        genes = everything.num_genes(),
        spots = everything.num_spots(),
        hits = everything.num_hits(),
        "parsed json"
    );
    Ok(everything)
}

/// Parses an exported JSON file
pub fn parse_path<P: AsRef<Path>>(path: P) -> Result<Everything> {
    let bytes = std::fs::read(path)?;
    parse(&bytes)
}

/// Builds a dataset from records in order
pub fn from_records<I>(records: I) -> Result<Everything>
where
    I: IntoIterator<Item = JsonRecord>,
{
    let mut everything = Everything::new();
    for record in records {
        let coord = record.coord();
        let gene_id = everything.register_gene(&record.gene);
        match everything.barcode(coord) {
            Some(existing) if existing != record.barcode => {
                return Err(ReadError::BarcodeConflict {
                    x: coord.x,
                    y: coord.y,
                    existing: existing.to_string(),
                    found: record.barcode,
                }
                .into());
            }
            Some(_) => {}
            None => {
                everything.record_barcode(coord, record.barcode);
            }
        }
        everything.add_hit(gene_id, coord, record.hits)?;
    }
    Ok(everything)
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::Error;
    use crate::json::JsonWriterBuilder;

    #[test]
    fn test_parse_any_key_order() -> Result<()> {
        let text = br#"[
            {"gene": "Actb", "hits": 12, "barcode": "BC1", "x": 0, "y": 0},
            {"y": 0, "x": 1, "hits": 7, "barcode": "BC2", "gene": "Actb"},
            {"barcode": "BC1", "gene": "Gapdh", "y": 0, "x": 0, "hits": 2}
        ]"#;
        let everything = parse(text)?;
        assert_eq!(everything.gene_names(), ["Actb", "Gapdh"]);
        assert_eq!(everything.num_spots(), 2);
        assert_eq!(everything.barcode(Coord::new(1, 0)), Some("BC2"));
        let actb: Vec<_> = everything.genes()[0].iter_hits().collect();
        assert_eq!(actb, vec![(Coord::new(0, 0), 12), (Coord::new(1, 0), 7)]);
        Ok(())
    }

    #[test]
    fn test_parse_empty() -> Result<()> {
        let everything = parse(b"[\n]\n")?;
        assert_eq!(everything, Everything::new());
        Ok(())
    }

    #[test]
    fn test_barcode_conflict() {
        let text = br#"[
            {"y":0,"x":0,"hits":1,"barcode":"BC1","gene":"Actb"},
            {"y":0,"x":0,"hits":1,"barcode":"BC9","gene":"Gapdh"}
        ]"#;
        match parse(text) {
            Err(Error::ReadError(ReadError::BarcodeConflict {
                x: 0,
                y: 0,
                existing,
                found,
            })) => {
                assert_eq!(existing, "BC1");
                assert_eq!(found, "BC9");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_field() {
        let text = br#"[{"y":0,"x":0,"hits":1,"barcode":"BC1","gene":"Actb","z":3}]"#;
        assert!(matches!(parse(text), Err(Error::JsonError(_))));
    }

    #[test]
    fn test_missing_field() {
        let text = br#"[{"y":0,"x":0,"barcode":"BC1","gene":"Actb"}]"#;
        assert!(matches!(parse(text), Err(Error::JsonError(_))));
    }

    #[test]
    fn test_negative_coordinate() {
        let text = br#"[{"y":-1,"x":0,"hits":1,"barcode":"BC1","gene":"Actb"}]"#;
        assert!(matches!(parse(text), Err(Error::JsonError(_))));
    }

    #[test]
    fn test_round_trip_with_exporter() -> Result<()> {
        let mut everything = Everything::new();
        let actb = everything.register_gene("Actb");
        let gapdh = everything.register_gene("Gapdh");
        everything.record_barcode(Coord::new(0, 0), "BC1");
        everything.record_barcode(Coord::new(1, 0), "BC2");
        everything.record_barcode(Coord::new(4, 9), "BC3");
        everything.add_hit(actb, Coord::new(0, 0), 12)?;
        everything.add_hit(actb, Coord::new(1, 0), 7)?;
        everything.add_hit(gapdh, Coord::new(4, 9), 1)?;
        everything.add_hit(gapdh, Coord::new(0, 0), 3)?;

        let bytes = JsonWriterBuilder::default().encode(&everything)?;
        let parsed = parse(&bytes)?;
        assert_eq!(parsed, everything);
        Ok(())
    }

    #[test]
    fn test_parse_path() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hits.json");
        std::fs::write(&path, br#"[{"y":2,"x":3,"hits":4,"barcode":"B","gene":"G"}]"#)?;
        let everything = parse_path(&path)?;
        assert_eq!(everything.barcode(Coord::new(3, 2)), Some("B"));
        Ok(())
    }
}
