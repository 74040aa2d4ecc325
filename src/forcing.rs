//! Forcing provider: the climatic time series driving a run and the monthly cave climate.
use crate::errors::KarstError;
use crate::utils::read_records;
use serde::{Deserialize, Serialize};

/// One row of the forcing table.
///
/// Column names follow the input files: `tt, mm, evpt, prp, tempp, d18O`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ForcingRecord {
    /// Step id, 1-based.
    pub tt: usize,
    /// Calendar month, 1-12.
    pub mm: u32,
    /// Evapotranspiration (mm).
    pub evpt: f64,
    /// Precipitation (mm).
    pub prp: f64,
    /// Surface temperature (°C).
    pub tempp: f64,
    /// Rainfall δ18O (permille VSMOW).
    #[serde(rename = "d18O")]
    pub d18o: f64,
}

impl ForcingRecord {
    fn validate(&self) -> Result<(), KarstError> {
        if !(1..=12).contains(&self.mm) {
            return Err(KarstError::InvalidMonth {
                step: self.tt,
                month: i64::from(self.mm),
            });
        }
        let checks = [
            ("evpt", self.evpt, true),
            ("prp", self.prp, true),
            ("tempp", self.tempp, false),
            ("d18O", self.d18o, false),
        ];
        for (name, value, non_negative) in checks.iter() {
            if !value.is_finite() {
                return Err(KarstError::InvalidForcing {
                    step: self.tt,
                    reason: format!("{name} is not finite ({value})"),
                });
            }
            if *non_negative && *value < 0.0 {
                return Err(KarstError::InvalidForcing {
                    step: self.tt,
                    reason: format!("{name} must be >= 0, got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Validated, immutable forcing series.
///
/// Step ids start at 1 and are contiguous, months lie in 1-12 and the water
/// fluxes are non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct ForcingSeries {
    records: Vec<ForcingRecord>,
}

impl ForcingSeries {
    /// Validate `records` and wrap them.
    pub fn new(records: Vec<ForcingRecord>) -> Result<Self, KarstError> {
        let first = match records.first() {
            Some(r) => r.tt,
            None => {
                return Err(KarstError::InvalidForcing {
                    step: 0,
                    reason: "forcing series is empty".to_string(),
                })
            }
        };
        if first != 1 {
            return Err(KarstError::InvalidForcing {
                step: first,
                reason: format!("step ids start at 1, got {first}"),
            });
        }
        for (offset, rec) in records.iter().enumerate() {
            if rec.tt != first + offset {
                return Err(KarstError::InvalidForcing {
                    step: rec.tt,
                    reason: format!(
                        "step ids must be contiguous, expected {} at row {}",
                        first + offset,
                        offset + 1
                    ),
                });
            }
            rec.validate()?;
        }
        Ok(ForcingSeries { records })
    }

    /// Read a forcing table from a csv file with a header row.
    pub fn read(path: &str) -> Result<Self, KarstError> {
        ForcingSeries::new(read_records(path)?)
    }

    /// Record at 1-based position `index`.
    pub fn get(&self, index: usize) -> Result<&ForcingRecord, KarstError> {
        if index == 0 || index > self.records.len() {
            return Err(KarstError::ForcingExhausted {
                index,
                len: self.records.len(),
            });
        }
        Ok(&self.records[index - 1])
    }

    /// The first `n` steps of the series.
    pub fn truncate(&self, n: usize) -> Result<Self, KarstError> {
        ForcingSeries::new(self.records.iter().take(n).cloned().collect())
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no steps.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate the records in step order.
    pub fn iter(&self) -> std::slice::Iter<'_, ForcingRecord> {
        self.records.iter()
    }
}

/// Drip rates (1/s) of a store when it is full and when it is empty, per month.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreDripRates {
    /// Drip rate of a full store.
    pub full: [f64; 12],
    /// Drip rate of an empty store.
    pub empty: [f64; 12],
}

/// Monthly-periodic cave-climate drivers, January to December.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyForcing {
    /// pCO2 of the drip water (ppm).
    pub drip_pco2: [f64; 12],
    /// pCO2 of the cave air (ppm).
    pub cave_pco2: [f64; 12],
    /// Relative humidity, 0-1.
    pub rel_humidity: [f64; 12],
    /// Ventilation (air speed over the stalagmite, m/s).
    pub ventilation: [f64; 12],
    /// Cave air temperature (°C).
    pub cave_temp: [f64; 12],
    /// Drip interval (s).
    pub drip_interval: [f64; 12],
    /// Optional store-level drip rates; when present, drip intervals follow store fill.
    pub store_drip_rates: Option<StoreDripRates>,
}

/// Cave climate for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CaveClimate {
    /// Calendar month, 1-12.
    pub month: u32,
    /// pCO2 of the drip water (ppm).
    pub drip_pco2: f64,
    /// pCO2 of the cave air (ppm).
    pub cave_pco2: f64,
    /// Relative humidity, 0-1.
    pub rel_humidity: f64,
    /// Ventilation (m/s).
    pub ventilation: f64,
    /// Cave air temperature (°C).
    pub cave_temp: f64,
    /// Drip interval (s).
    pub drip_interval: f64,
    /// Store drip rate when full (1/s), if store-level rates are configured.
    pub drip_rate_full: Option<f64>,
    /// Store drip rate when empty (1/s).
    pub drip_rate_empty: Option<f64>,
}

impl MonthlyForcing {
    /// Cave climate for calendar `month` (1-12).
    pub fn for_month(&self, month: u32) -> Result<CaveClimate, KarstError> {
        if !(1..=12).contains(&month) {
            return Err(KarstError::InvalidMonth {
                step: 0,
                month: i64::from(month),
            });
        }
        let m = (month - 1) as usize;
        Ok(CaveClimate {
            month,
            drip_pco2: self.drip_pco2[m],
            cave_pco2: self.cave_pco2[m],
            rel_humidity: self.rel_humidity[m],
            ventilation: self.ventilation[m],
            cave_temp: self.cave_temp[m],
            drip_interval: self.drip_interval[m],
            drip_rate_full: self.store_drip_rates.as_ref().map(|r| r.full[m]),
            drip_rate_empty: self.store_drip_rates.as_ref().map(|r| r.empty[m]),
        })
    }

    /// Cave climate for the month of a forcing record, reporting its step on failure.
    pub fn for_record(&self, record: &ForcingRecord) -> Result<CaveClimate, KarstError> {
        self.for_month(record.mm).map_err(|e| match e {
            KarstError::InvalidMonth { month, .. } => KarstError::InvalidMonth {
                step: record.tt,
                month,
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(tt: usize, mm: u32) -> ForcingRecord {
        ForcingRecord {
            tt,
            mm,
            evpt: 20.0,
            prp: 80.0,
            tempp: 12.0,
            d18o: -5.0,
        }
    }

    fn monthly() -> MonthlyForcing {
        let ramp: [f64; 12] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        MonthlyForcing {
            drip_pco2: [5000.0; 12],
            cave_pco2: [1000.0; 12],
            rel_humidity: [0.95; 12],
            ventilation: [0.1; 12],
            cave_temp: ramp,
            drip_interval: [60.0; 12],
            store_drip_rates: None,
        }
    }

    #[test]
    fn valid_series() {
        let fs = ForcingSeries::new(vec![rec(1, 1), rec(2, 2), rec(3, 3)]).unwrap();
        assert_eq!(fs.len(), 3);
        assert_eq!(fs.get(2).unwrap().mm, 2);
    }

    #[test]
    fn get_past_end_is_exhausted() {
        let fs = ForcingSeries::new(vec![rec(1, 1), rec(2, 2)]).unwrap();
        match fs.get(3) {
            Err(KarstError::ForcingExhausted { index, len }) => {
                assert_eq!(index, 3);
                assert_eq!(len, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(fs.get(0).is_err());
    }

    #[test]
    fn rejects_gaps_in_step_ids() {
        let fs = ForcingSeries::new(vec![rec(1, 1), rec(3, 2)]);
        assert!(matches!(fs, Err(KarstError::InvalidForcing { step: 3, .. })));
    }

    #[test]
    fn rejects_series_not_starting_at_one() {
        let fs = ForcingSeries::new(vec![rec(2, 2), rec(3, 3)]);
        assert!(matches!(fs, Err(KarstError::InvalidForcing { step: 2, .. })));
        let fs = ForcingSeries::new(vec![rec(0, 1), rec(1, 2)]);
        assert!(matches!(fs, Err(KarstError::InvalidForcing { step: 0, .. })));
    }

    #[test]
    fn rejects_bad_month() {
        let fs = ForcingSeries::new(vec![rec(1, 1), rec(2, 13)]);
        assert!(matches!(
            fs,
            Err(KarstError::InvalidMonth { step: 2, month: 13 })
        ));
    }

    #[test]
    fn rejects_negative_precipitation() {
        let mut r = rec(1, 1);
        r.prp = -1.0;
        assert!(ForcingSeries::new(vec![r]).is_err());
    }

    #[test]
    fn rejects_empty_series() {
        assert!(ForcingSeries::new(vec![]).is_err());
    }

    #[test]
    fn truncate_keeps_prefix() {
        let fs = ForcingSeries::new(vec![rec(1, 1), rec(2, 2), rec(3, 3)]).unwrap();
        let short = fs.truncate(2).unwrap();
        assert_eq!(short.len(), 2);
        assert_eq!(short.get(2).unwrap(), fs.get(2).unwrap());
    }

    #[test]
    fn monthly_lookup_selects_calendar_month() {
        let m = monthly();
        assert_eq!(m.for_month(1).unwrap().cave_temp, 1.0);
        assert_eq!(m.for_month(12).unwrap().cave_temp, 12.0);
        assert!(m.for_month(1).unwrap().drip_rate_full.is_none());
    }

    #[test]
    fn monthly_lookup_rejects_invalid_month() {
        let m = monthly();
        assert!(matches!(
            m.for_month(0),
            Err(KarstError::InvalidMonth { month: 0, .. })
        ));
        assert!(m.for_month(13).is_err());
    }
}
