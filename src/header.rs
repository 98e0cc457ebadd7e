//! Translation of FITS header records into attributes on the output root
//! group.

use std::collections::HashSet;

use log::warn;

use crate::{error::HdfConvertError, io::fits::FitsReader, io::hdf5::OutputFile};

/// Schema version written to every output file.
pub const SCHEMA_VERSION: &str = "0.1";
/// Converter name written to every output file.
pub const HDF5_CONVERTER: &str = "hdf_convert";
/// Converter version written to every output file.
pub const HDF5_CONVERTER_VERSION: &str = "0.1.4";

/// Parse one 80-character header record into a (name, value) pair.
///
/// `COMMENT` and `HISTORY` records and records without an `=` are discarded.
/// The value is cut at the last `/` of the record (the inline comment), both
/// fields are trimmed, and a single-quoted value is unwrapped and re-trimmed.
pub fn parse_record(record: &str) -> Option<(String, String)> {
    if record.starts_with("COMMENT") || record.starts_with("HISTORY") {
        return None;
    }
    let eq_pos = record.find('=')?;
    let name = record[..eq_pos].trim();
    let rest = &record[eq_pos + 1..];
    let mut value = match rest.rfind('/') {
        Some(comment_pos) => &rest[..comment_pos],
        None => rest,
    }
    .trim();
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        value = value[1..value.len() - 1].trim();
    }
    Some((name.to_string(), value.to_string()))
}

/// Copy every input header keyword onto the output root group as a
/// fixed-length string attribute, after writing the fixed converter metadata.
///
/// Duplicate names keep the first occurrence and emit a warning.
///
/// # Errors
///
/// Returns [`HdfConvertError::HeaderRead`] if a record cannot be read and
/// [`HdfConvertError::OutputWrite`] if an attribute cannot be created.
pub fn translate_header(
    reader: &mut FitsReader,
    output: &OutputFile,
) -> Result<(), HdfConvertError> {
    output.write_string_attribute("SCHEMA_VERSION", SCHEMA_VERSION)?;
    output.write_string_attribute("HDF5_CONVERTER", HDF5_CONVERTER)?;
    output.write_string_attribute("HDF5_CONVERTER_VERSION", HDF5_CONVERTER_VERSION)?;

    let mut seen: HashSet<String> = ["SCHEMA_VERSION", "HDF5_CONVERTER", "HDF5_CONVERTER_VERSION"]
        .iter()
        .map(|name| name.to_string())
        .collect();

    let num_records = reader.num_header_records()?;
    for record_index in 1..=num_records {
        let record = reader.read_header_record(record_index)?;
        let (name, value) = match parse_record(&record) {
            Some(pair) => pair,
            None => continue,
        };
        if name.is_empty() {
            warn!("Skipping header record with empty keyword: '{}'", record.trim_end());
            continue;
        }
        if !seen.insert(name.clone()) {
            warn!("Skipping duplicate attribute '{}'", name);
            continue;
        }
        output.write_string_attribute(&name, &value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_record;

    #[test]
    fn test_parse_record_integer_with_comment() {
        let record = "NAXIS   =                    3 / number of axes";
        assert_eq!(
            parse_record(record),
            Some(("NAXIS".to_string(), "3".to_string()))
        );
    }

    #[test]
    fn test_parse_record_quoted_string() {
        let record = "OBJECT  = 'NGC 1068     '";
        assert_eq!(
            parse_record(record),
            Some(("OBJECT".to_string(), "NGC 1068".to_string()))
        );
    }

    #[test]
    fn test_parse_record_quoted_string_with_comment() {
        let record = "BUNIT   = 'Jy/beam '           / Brightness (pixel) unit";
        assert_eq!(
            parse_record(record),
            Some(("BUNIT".to_string(), "Jy/beam".to_string()))
        );
    }

    #[test]
    fn test_parse_record_discards_commentary() {
        assert_eq!(parse_record("COMMENT hello"), None);
        assert_eq!(parse_record("HISTORY reduced by hand"), None);
    }

    #[test]
    fn test_parse_record_discards_no_equals() {
        assert_eq!(parse_record("END"), None);
        assert_eq!(parse_record(""), None);
    }

    #[test]
    fn test_parse_record_keeps_quote_in_middle() {
        // only a fully quote-wrapped value is unwrapped
        let record = "KEY     = it's fine";
        assert_eq!(
            parse_record(record),
            Some(("KEY".to_string(), "it's fine".to_string()))
        );
    }

    #[test]
    fn test_parse_record_bare_quote_pair() {
        let record = "BLANKSTR= ''";
        assert_eq!(
            parse_record(record),
            Some(("BLANKSTR".to_string(), String::new()))
        );
    }
}
