//! CSV helpers shared by the forcing reader and the result writer.
use crate::errors::KarstError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Read every row of a csv file with a header row into `T`.
pub fn read_records<T: DeserializeOwned>(path: &str) -> Result<Vec<T>, KarstError> {
    let mut dat = Vec::new();
    let var = std::fs::File::open(path)?;
    let mut rdr = csv::Reader::from_reader(var);
    for result in rdr.deserialize() {
        let row: T = result?;
        dat.push(row);
    }
    Ok(dat)
}

/// Write records to a csv file, one row each, with a header from the field names.
pub fn record<T: Serialize>(rec: &[T], path: &str) -> Result<(), KarstError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for i in rec {
        wtr.serialize(i)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        step: usize,
        value: f64,
        note: Option<f64>,
    }

    #[test]
    fn record_then_read() {
        let name = format!("karstolution_utils_{}.csv", std::process::id());
        let path = std::env::temp_dir().join(name);
        let path = path.to_str().unwrap();
        let rows = vec![
            Row {
                step: 1,
                value: 0.5,
                note: None,
            },
            Row {
                step: 2,
                value: -1.25,
                note: Some(3.0),
            },
        ];
        record(&rows, path).unwrap();
        let back: Vec<Row> = read_records(path).unwrap();
        std::fs::remove_file(path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn missing_file_is_io_error() {
        let res: Result<Vec<Row>, KarstError> = read_records("no/such/file.csv");
        assert!(matches!(res, Err(KarstError::Io(_))));
    }
}
