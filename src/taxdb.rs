//src/taxdb.rs

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ahash::{AHashMap, AHashSet};
use flate2::read::MultiGzDecoder;

use crate::errors::{Result, TaxTreeError};
use crate::types::TaxonRecord;

/// Identifier of the taxonomy root. Its parent is itself.
pub const ROOT_TAXID: &str = "1";

pub type TaxonTable = AHashMap<String, TaxonRecord>;

/// Path from the root down to `taxid`, both ends included.
///
/// Every identifier on the way must be in `table`. A parent chain that revisits
/// a taxid without reaching [`ROOT_TAXID`] is reported as a cycle.
pub fn full_ancestry(taxid: &str, table: &TaxonTable) -> Result<Vec<String>> {
    if !table.contains_key(taxid) {
        return Err(TaxTreeError::MissingTaxon {
            taxid: taxid.to_string(),
        });
    }

    let mut ancestry = vec![taxid.to_string()];
    let mut visited: AHashSet<&str> = AHashSet::new();
    let mut current = taxid;

    while current != ROOT_TAXID {
        if !visited.insert(current) {
            return Err(TaxTreeError::Cycle {
                taxid: taxid.to_string(),
            });
        }
        let record = table
            .get(current)
            .ok_or_else(|| TaxTreeError::MissingTaxon {
                taxid: current.to_string(),
            })?;
        ancestry.push(record.parent.clone());
        current = &record.parent;
    }

    ancestry.reverse();
    Ok(ancestry)
}

/// Opens a text file, gunzipping it on the fly when it ends in `.gz`.
pub fn open_text<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let f = File::open(path)?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Parses an NCBI `nodes.dmp` style file:
/// ```text
/// <taxid>\t|\t<parentid>\t|\t<rank>\t|...
/// ```
/// Names are left empty; see [`apply_names_dmp`].
pub fn parse_nodes_dmp<P: AsRef<Path>>(filepath: P) -> Result<TaxonTable> {
    let path = filepath.as_ref();
    let reader = open_text(path)?;
    let mut table = TaxonTable::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        if parts.len() < 3 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(TaxTreeError::InvalidRecord {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: "expected `taxid | parent | rank`".to_string(),
            });
        }

        table.insert(
            parts[0].to_string(),
            TaxonRecord {
                parent: parts[1].to_string(),
                name: String::new(),
                rank: parts[2].to_string(),
            },
        );
    }

    log::info!("Loaded {} taxa from {}", table.len(), path.display());
    Ok(table)
}

/// Assigns display names from an NCBI `names.dmp` style file:
/// ```text
/// <taxid>\t|\t<name>\t|\t<unique name>\t|\t<name class>\t|
/// ```
/// The first name seen for a taxid is kept unless a later one is the
/// `scientific name`. Taxa still unnamed afterwards are named by their taxid.
pub fn apply_names_dmp<P: AsRef<Path>>(table: &mut TaxonTable, filepath: P) -> Result<()> {
    let path = filepath.as_ref();
    let reader = open_text(path)?;
    let mut named: AHashSet<String> = AHashSet::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        if parts.len() < 4 {
            return Err(TaxTreeError::InvalidRecord {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: "expected `taxid | name | unique name | class`".to_string(),
            });
        }

        let (taxid, name, name_class) = (parts[0], parts[1], parts[3]);
        if let Some(record) = table.get_mut(taxid) {
            if !named.contains(taxid) {
                record.name = name.to_string();
                named.insert(taxid.to_string());
            } else if name_class == "scientific name" {
                record.name = name.to_string();
            }
        }
    }

    let mut unnamed = 0usize;
    for (taxid, record) in table.iter_mut() {
        if record.name.is_empty() {
            record.name = taxid.clone();
            unnamed += 1;
        }
    }
    if unnamed > 0 {
        log::warn!("{} taxa have no entry in {}; using their taxid as name", unnamed, path.display());
    }
    Ok(())
}

/// Reads both dump files into one table.
pub fn load_taxonomy<P: AsRef<Path>, Q: AsRef<Path>>(nodes_path: P, names_path: Q) -> Result<TaxonTable> {
    let mut table = parse_nodes_dmp(nodes_path)?;
    apply_names_dmp(&mut table, names_path)?;
    Ok(table)
}

#[cfg(test)]
pub(crate) fn table_from(entries: &[(&str, &str, &str)]) -> TaxonTable {
    entries
        .iter()
        .map(|(taxid, parent, name)| (taxid.to_string(), TaxonRecord::new(parent, name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_table() -> TaxonTable {
        table_from(&[
            ("1", "1", "root"),
            ("2", "1", "Bacteria"),
            ("3", "2", "Proteobacteria"),
            ("4", "3", "Gammaproteobacteria"),
        ])
    }

    #[test]
    fn ancestry_runs_root_to_leaf() {
        let table = sample_table();
        let ancestry = full_ancestry("4", &table).unwrap();
        assert_eq!(ancestry, vec!["1", "2", "3", "4"]);
        assert_eq!(full_ancestry("1", &table).unwrap(), vec!["1"]);
    }

    #[test]
    fn ancestry_length_is_depth_plus_one() {
        let table = sample_table();
        for (taxid, depth) in [("1", 0), ("2", 1), ("3", 2), ("4", 3)] {
            let ancestry = full_ancestry(taxid, &table).unwrap();
            assert_eq!(ancestry.len(), depth + 1);
            assert_eq!(ancestry.first().map(String::as_str), Some(ROOT_TAXID));
            assert_eq!(ancestry.last().map(String::as_str), Some(taxid));
        }
    }

    #[test]
    fn unknown_taxid_is_missing() {
        let table = sample_table();
        match full_ancestry("99", &table) {
            Err(TaxTreeError::MissingTaxon { taxid }) => assert_eq!(taxid, "99"),
            other => panic!("expected MissingTaxon, got {:?}", other),
        }
    }

    #[test]
    fn dangling_parent_is_missing() {
        let table = table_from(&[("1", "1", "root"), ("5", "7", "orphan")]);
        match full_ancestry("5", &table) {
            Err(TaxTreeError::MissingTaxon { taxid }) => assert_eq!(taxid, "7"),
            other => panic!("expected MissingTaxon, got {:?}", other),
        }
    }

    #[test]
    fn parent_loop_is_a_cycle() {
        let table = table_from(&[
            ("1", "1", "root"),
            ("5", "6", "a"),
            ("6", "5", "b"),
            ("7", "7", "detached root"),
        ]);
        assert!(matches!(full_ancestry("5", &table), Err(TaxTreeError::Cycle { .. })));
        assert!(matches!(full_ancestry("7", &table), Err(TaxTreeError::Cycle { .. })));
    }

    #[test]
    fn dump_files_build_a_named_table() {
        let mut nodes = tempfile::NamedTempFile::new().unwrap();
        writeln!(nodes, "1\t|\t1\t|\tno rank\t|").unwrap();
        writeln!(nodes, "2\t|\t1\t|\tsuperkingdom\t|").unwrap();
        writeln!(nodes, "562\t|\t2\t|\tspecies\t|").unwrap();

        let mut names = tempfile::NamedTempFile::new().unwrap();
        writeln!(names, "1\t|\troot\t|\t\t|\tscientific name\t|").unwrap();
        writeln!(names, "2\t|\teubacteria\t|\t\t|\tgenbank common name\t|").unwrap();
        writeln!(names, "2\t|\tBacteria\t|\tBacteria <prokaryote>\t|\tscientific name\t|").unwrap();
        writeln!(names, "2\t|\tMonera\t|\t\t|\tin-part\t|").unwrap();
        writeln!(names, "999\t|\tunused\t|\t\t|\tscientific name\t|").unwrap();

        let table = load_taxonomy(nodes.path(), names.path()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table["2"].name, "Bacteria");
        assert_eq!(table["2"].rank, "superkingdom");
        assert_eq!(table["562"].parent, "2");
        // no names.dmp entry
        assert_eq!(table["562"].name, "562");
    }

    #[test]
    fn short_nodes_line_is_rejected() {
        let mut nodes = tempfile::NamedTempFile::new().unwrap();
        writeln!(nodes, "1\t|\t1\t|\tno rank\t|").unwrap();
        writeln!(nodes, "2").unwrap();

        match parse_nodes_dmp(nodes.path()) {
            Err(TaxTreeError::InvalidRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected InvalidRecord, got {:?}", other),
        }
    }

    #[test]
    fn gzipped_nodes_are_read() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.dmp.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(b"1\t|\t1\t|\tno rank\t|\n2\t|\t1\t|\tsuperkingdom\t|\n").unwrap();
        enc.finish().unwrap();

        let table = parse_nodes_dmp(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table["2"].parent, "1");
    }
}
