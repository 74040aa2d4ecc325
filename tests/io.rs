mod common;

use common::sample_config;
use karstolution::prelude::*;

#[test]
fn sample_forcing_runs_end_to_end() {
    let forcing = ForcingSeries::read("data/forcing.csv").unwrap();
    assert_eq!(forcing.len(), 24);
    assert_eq!(forcing.get(1).unwrap().mm, 1);
    assert!(matches!(
        forcing.get(25),
        Err(KarstError::ForcingExhausted { index: 25, len: 24 })
    ));

    let results = Simulation::new(sample_config(), forcing).run().unwrap();
    let path = std::env::temp_dir().join(format!("karstolution_io_{}.csv", std::process::id()));
    let path = path.to_str().unwrap();
    write_csv(path, &results).unwrap();

    let mut rdr = csv::Reader::from_path(path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(&headers[0], "tt");
    assert!(headers.iter().any(|h| h == "calcite_d18o"));
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    std::fs::remove_file(path).unwrap();
    assert_eq!(rows.len(), 24);
    assert_eq!(&rows[23][0], "24");
}

#[test]
fn missing_key_is_reported() {
    let text = std::fs::read_to_string("data/config.toml").unwrap();
    let without: String = text
        .lines()
        .filter(|l| !l.starts_with("k_weibull"))
        .collect::<Vec<_>>()
        .join("\n");
    match Config::from_toml_str(&without) {
        Err(KarstError::MissingConfigKey { key }) => assert_eq!(key, "k_weibull"),
        other => panic!("expected a missing key error, got {other:?}"),
    }
}
