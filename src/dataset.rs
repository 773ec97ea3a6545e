use std::io;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Reader};
use csv::StringRecord;
use rust_xlsxwriter::Workbook;
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::geocoding::GeocodeCandidate;
use crate::query::Query;
use crate::report::format_gps;

/// Columns joined, in this order, into the geocoding address.
pub const ADDRESS_COLUMNS: [&str; 6] = [
    "nom_fr",
    "nom_ar",
    "commune_fr",
    "cercle_fr",
    "province_fr",
    "region_fr",
];
pub const QUERY_COLUMN: &str = "Google Maps query";
pub const GPS_COLUMN: &str = "gps";
const OUTPUT_SUFFIX: &str = "-gps";
const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];
const WRITTEN_WORKBOOK_EXTENSION: &str = "xlsx";

/// A locality table loaded from CSV or from the first worksheet of a
/// workbook, kept verbatim for re-export.
#[derive(Debug, Clone)]
pub struct Dataset {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Dataset {
    pub fn load(path: &Path) -> AppResult<Self> {
        ensure_input_exists(path)?;
        let dataset = if is_workbook(path) {
            Self::from_workbook(path)?
        } else {
            Self::from_csv(csv::Reader::from_path(path)?)?
        };
        info!(
            target: "dataset",
            path = %path.display(),
            rows = dataset.rows.len(),
            "loaded locality table"
        );
        Ok(dataset)
    }

    fn from_workbook(path: &Path) -> AppResult<Self> {
        let mut workbook = open_workbook_auto(path)?;
        let sheet = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| AppError::Config(format!("{} has no worksheet", path.display())))??;
        let mut rows = sheet.rows().map(|cells| {
            let fields: Vec<String> = cells.iter().map(ToString::to_string).collect();
            StringRecord::from(fields)
        });
        let headers = rows.next().unwrap_or_default();
        Ok(Self {
            headers,
            rows: rows.collect(),
        })
    }

    pub fn from_reader<R: io::Read>(reader: R) -> AppResult<Self> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: io::Read>(mut reader: csv::Reader<R>) -> AppResult<Self> {
        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One query per row, identified by the zero-based row index.
    pub fn build_queries(&self, country: &str) -> AppResult<Vec<Query>> {
        let columns = self.address_column_indices()?;
        Ok(self
            .rows
            .iter()
            .enumerate()
            .map(|(id, row)| Query::new(id, compose_address(row, &columns, country)))
            .collect())
    }

    /// Writes every input column plus the query address and the GPS pairs of
    /// the selected candidates, in original row order.
    pub fn write_geocoded(
        &self,
        path: &Path,
        results: &[(Query, Vec<GeocodeCandidate>)],
    ) -> AppResult<()> {
        let mut extra: Vec<Option<(&str, String)>> = vec![None; self.rows.len()];
        for (query, candidates) in results {
            let slot = extra.get_mut(query.id).ok_or_else(|| {
                AppError::Config(format!(
                    "query id {} is outside the {} input rows",
                    query.id,
                    self.rows.len()
                ))
            })?;
            *slot = Some((query.address.as_str(), format_gps(candidates)));
        }

        let mut header: Vec<&str> = self.headers.iter().collect();
        header.push(QUERY_COLUMN);
        header.push(GPS_COLUMN);
        let mut table = vec![header];
        for (row, extra) in self.rows.iter().zip(&extra) {
            let (address, gps) = match extra {
                Some((address, gps)) => (*address, gps.as_str()),
                None => ("", ""),
            };
            let mut record: Vec<&str> = row.iter().collect();
            record.push(address);
            record.push(gps);
            table.push(record);
        }

        if has_extension(path, WRITTEN_WORKBOOK_EXTENSION) {
            write_workbook(path, &table)?;
        } else {
            write_csv(path, &table)?;
        }

        info!(
            target: "dataset",
            path = %path.display(),
            rows = self.rows.len(),
            "wrote geocoded table"
        );
        Ok(())
    }

    fn address_column_indices(&self) -> AppResult<[usize; 6]> {
        let mut indices = [0; 6];
        for (slot, name) in indices.iter_mut().zip(ADDRESS_COLUMNS) {
            *slot = self
                .headers
                .iter()
                .position(|header| header.trim() == name)
                .ok_or_else(|| AppError::MissingColumn(name.to_string()))?;
        }
        Ok(indices)
    }
}

pub fn ensure_input_exists(path: &Path) -> AppResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(AppError::InputNotFound(path.to_path_buf()))
    }
}

/// `dir/name.ext` becomes `dir/name-gps.ext`. Workbooks are always written
/// back as `.xlsx`.
pub fn output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_name = if is_workbook(input) {
        format!("{stem}{OUTPUT_SUFFIX}.{WRITTEN_WORKBOOK_EXTENSION}")
    } else {
        match input.extension() {
            Some(ext) => format!("{stem}{OUTPUT_SUFFIX}.{}", ext.to_string_lossy()),
            None => format!("{stem}{OUTPUT_SUFFIX}"),
        }
    };
    input.with_file_name(file_name)
}

pub fn is_workbook(path: &Path) -> bool {
    WORKBOOK_EXTENSIONS
        .iter()
        .any(|extension| has_extension(path, extension))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

fn write_csv(path: &Path, table: &[Vec<&str>]) -> AppResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in table {
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_workbook(path: &Path, table: &[Vec<&str>]) -> AppResult<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (row, record) in table.iter().enumerate() {
        let row = u32::try_from(row)
            .map_err(|_| AppError::Config(format!("row {row} does not fit in a worksheet")))?;
        for (col, value) in record.iter().enumerate() {
            let col = u16::try_from(col)
                .map_err(|_| AppError::Config(format!("column {col} does not fit in a worksheet")))?;
            worksheet.write_string(row, col, *value)?;
        }
    }
    workbook.save(path)?;
    Ok(())
}

fn compose_address(row: &StringRecord, columns: &[usize; 6], country: &str) -> String {
    let field = |idx: usize| row.get(columns[idx]).unwrap_or("").trim();
    format!(
        "{} {}, {}, {}, {}, {}, {}",
        field(0),
        field(1),
        field(2),
        field(3),
        field(4),
        field(5),
        country
    )
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::geocoding::{Geometry, LatLng};

    const SAMPLE: &str = "\
code,nom_fr,nom_ar,commune_fr,cercle_fr,province_fr,region_fr
A1,Imlil,إمليل,Asni,Asni,Al Haouz,Marrakech-Safi
A2, Tagadirt ,تاكاديرت,Ouirgane,Asni,Al Haouz,Marrakech-Safi
";

    #[test]
    fn builds_one_query_per_row() {
        let dataset = Dataset::from_reader(SAMPLE.as_bytes()).unwrap();
        let queries = dataset.build_queries("Morocco").unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(
            queries[0].to_string(),
            "0--Imlil إمليل, Asni, Asni, Al Haouz, Marrakech-Safi, Morocco"
        );
        assert_eq!(queries[1].id, 1);
        assert!(queries[1].address.starts_with("Tagadirt تاكاديرت, Ouirgane"));
    }

    #[test]
    fn missing_column_is_reported() {
        let dataset = Dataset::from_reader("nom_fr,nom_ar\nImlil,إمليل\n".as_bytes()).unwrap();
        match dataset.build_queries("Morocco") {
            Err(AppError::MissingColumn(column)) => assert_eq!(column, "commune_fr"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_input_fails_fast() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        assert!(matches!(
            Dataset::load(&path),
            Err(AppError::InputNotFound(missing)) if missing == path
        ));
    }

    #[test]
    fn output_name_inserts_suffix_before_extension() {
        assert_eq!(
            output_path(Path::new("data/listes-localites.csv")),
            PathBuf::from("data/listes-localites-gps.csv")
        );
        assert_eq!(output_path(Path::new("plain")), PathBuf::from("plain-gps"));
        assert_eq!(
            output_path(Path::new("listes-localités.xlsx")),
            PathBuf::from("listes-localités-gps.xlsx")
        );
        assert_eq!(
            output_path(Path::new("old/listes.XLS")),
            PathBuf::from("old/listes-gps.xlsx")
        );
    }

    #[test]
    fn writes_original_columns_with_gps() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("localites.csv");
        std::fs::write(&input, SAMPLE).unwrap();
        let dataset = Dataset::load(&input).unwrap();
        let queries = dataset.build_queries("Morocco").unwrap();

        let located = GeocodeCandidate {
            formatted_address: "Imlil, Morocco".into(),
            address_components: Vec::new(),
            geometry: Geometry {
                location: LatLng {
                    lat: 31.1337,
                    lng: -7.9187,
                },
            },
            place_id: None,
        };
        let results = vec![
            (queries[1].clone(), Vec::new()),
            (queries[0].clone(), vec![located]),
        ];
        let output = output_path(&input);
        dataset.write_geocoded(&output, &results).unwrap();

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.get(0), Some("code"));
        assert_eq!(headers.get(7), Some(QUERY_COLUMN));
        assert_eq!(headers.get(8), Some(GPS_COLUMN));

        let rows: Vec<StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows[0].get(0), Some("A1"));
        assert_eq!(rows[0].get(7), Some(queries[0].address.as_str()));
        assert_eq!(rows[0].get(8), Some("(31.1337000, -7.9187000)"));
        assert_eq!(rows[1].get(0), Some("A2"));
        assert_eq!(rows[1].get(8), Some(""));
    }

    #[test]
    fn workbook_input_is_geocoded_into_workbook_copy() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("listes-localités.xlsx");
        let mut source = Workbook::new();
        let sheet = source.add_worksheet();
        for (row, line) in SAMPLE.lines().enumerate() {
            for (col, value) in line.split(',').enumerate() {
                sheet.write_string(row as u32, col as u16, value).unwrap();
            }
        }
        source.save(&input).unwrap();

        let dataset = Dataset::load(&input).unwrap();
        let queries = dataset.build_queries("Morocco").unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(
            queries[0].address,
            "Imlil إمليل, Asni, Asni, Al Haouz, Marrakech-Safi, Morocco"
        );

        let located = GeocodeCandidate {
            formatted_address: "Imlil, Morocco".into(),
            address_components: Vec::new(),
            geometry: Geometry {
                location: LatLng { lat: 31.1337, lng: -7.9187 },
            },
            place_id: None,
        };
        let results = vec![
            (queries[0].clone(), vec![located]),
            (queries[1].clone(), Vec::new()),
        ];
        let output = output_path(&input);
        dataset.write_geocoded(&output, &results).unwrap();

        let mut written = open_workbook_auto(&output).unwrap();
        let range = written.worksheet_range_at(0).unwrap().unwrap();
        let cell = |row: usize, col: usize| {
            range
                .get((row, col))
                .map(ToString::to_string)
                .unwrap_or_default()
        };
        assert_eq!(cell(0, 7), QUERY_COLUMN);
        assert_eq!(cell(0, 8), GPS_COLUMN);
        assert_eq!(cell(1, 0), "A1");
        assert_eq!(cell(1, 8), "(31.1337000, -7.9187000)");
        assert_eq!(cell(2, 0), "A2");
        assert_eq!(cell(2, 8), "");
    }
}
