//! Water and δ18O stores of the karst column.
use crate::config::{Config, InitialConditions};
use crate::constants::{NEGATIVE_TOLERANCE, STORE_NAMES, VOLUME_EPSILON};
use crate::errors::KarstError;
use crate::weibull::WeibullKernel;
use log::warn;
use serde::Serialize;

/// Volume-weighted mean δ18O of a set of `(volume, d18o)` components.
///
/// Zero volumes are skipped, so a component with an undefined composition and no water
/// does not poison the result. A single remaining component is returned exactly. When
/// the total volume is at or below [`VOLUME_EPSILON`], `previous` is returned unchanged.
///
/// # Examples
///
/// ```
/// use karstolution::reservoir::mix;
/// assert_eq!(mix(&[(0.0, -3.0), (12.5, -7.25)], -1.0), -7.25);
/// assert_eq!(mix(&[(1.0, -4.0), (1.0, -6.0)], -1.0), -5.0);
/// assert_eq!(mix(&[(0.0, -4.0)], -1.0), -1.0);
/// ```
pub fn mix(components: &[(f64, f64)], previous: f64) -> f64 {
    let wet: Vec<(f64, f64)> = components.iter().cloned().filter(|c| c.0 > 0.0).collect();
    let total: f64 = wet.iter().map(|c| c.0).sum();
    if total <= VOLUME_EPSILON {
        return previous;
    }
    if wet.len() == 1 {
        return wet[0].1;
    }
    wet.iter().map(|(v, d)| v * d).sum::<f64>() / total
}

/// Water content (mm) and δ18O (permille VSMOW) of a well-mixed store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Store {
    /// Water held (mm).
    pub content: f64,
    /// δ18O of the water held (permille VSMOW).
    pub d18o: f64,
}

impl Store {
    /// Store holding `content` mm at `d18o`.
    pub fn new(content: f64, d18o: f64) -> Self {
        Store { content, d18o }
    }

    /// Mix `inflows` into the store and add their volume.
    pub fn receive(&mut self, inflows: &[(f64, f64)]) {
        let mut components = Vec::with_capacity(inflows.len() + 1);
        components.push((self.content.max(0.0), self.d18o));
        components.extend_from_slice(inflows);
        self.d18o = mix(&components, self.d18o);
        self.content += inflows.iter().map(|c| c.0).sum::<f64>();
    }

    /// Remove `amount` at the store's composition and return it.
    pub fn withdraw(&mut self, amount: f64) -> f64 {
        self.content -= amount;
        amount
    }

    /// Shift δ18O by `shift` permille if the store still holds water.
    pub fn enrich(&mut self, shift: f64) {
        if self.content > VOLUME_EPSILON {
            self.d18o += shift;
        }
    }

    /// Remove anything above `capacity` and return it.
    pub fn spill_above(&mut self, capacity: f64) -> f64 {
        if self.content >= capacity {
            let excess = self.content - capacity;
            self.content = capacity;
            excess
        } else {
            0.0
        }
    }
}

/// A pulse of water travelling through the diffuse flow path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Parcel {
    /// Volume on entry (mm).
    pub volume: f64,
    /// Volume not yet released (mm).
    pub remaining: f64,
    /// δ18O of the parcel (permille VSMOW).
    pub d18o: f64,
    /// Months since entry.
    pub age: usize,
}

/// Diffuse flow store: water released over the following months by the transit kernel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffuseStore {
    parcels: Vec<Parcel>,
    /// δ18O reported while the store is empty.
    last_d18o: f64,
}

impl DiffuseStore {
    /// Store seeded with a single parcel holding `content`.
    pub fn new(content: f64, d18o: f64) -> Self {
        let parcels = if content > 0.0 {
            vec![Parcel {
                volume: content,
                remaining: content,
                d18o,
                age: 0,
            }]
        } else {
            Vec::new()
        };
        DiffuseStore {
            parcels,
            last_d18o: d18o,
        }
    }

    /// Water held (mm).
    pub fn content(&self) -> f64 {
        self.parcels.iter().map(|p| p.remaining).sum()
    }

    /// Volume-weighted δ18O of the water held.
    pub fn d18o(&self) -> f64 {
        let parts: Vec<(f64, f64)> = self.parcels.iter().map(|p| (p.remaining, p.d18o)).collect();
        mix(&parts, self.last_d18o)
    }

    /// Parcels in transit, oldest first.
    pub fn parcels(&self) -> &[Parcel] {
        &self.parcels
    }

    /// Age every parcel by one month and release its kernel share.
    ///
    /// Returns the released volume and its δ18O. Parcels that outlive the kernel release
    /// whatever is left, as do parcels whose remainder would fall to [`VOLUME_EPSILON`].
    pub fn release(&mut self, kernel: &WeibullKernel) -> (f64, f64) {
        let mut out = Vec::with_capacity(self.parcels.len());
        for p in self.parcels.iter_mut() {
            p.age += 1;
            let mut share = if p.age + 1 >= kernel.len() {
                p.remaining
            } else {
                (p.volume * kernel.weight(p.age)).min(p.remaining)
            };
            if p.remaining - share <= VOLUME_EPSILON {
                share = p.remaining;
            }
            p.remaining -= share;
            out.push((share, p.d18o));
        }
        self.parcels.retain(|p| p.remaining > VOLUME_EPSILON);
        let volume: f64 = out.iter().map(|c| c.0).sum();
        let d18o = mix(&out, self.d18o());
        self.last_d18o = self.d18o();
        (volume, d18o)
    }

    /// Add a new pulse of age zero.
    pub fn receive(&mut self, volume: f64, d18o: f64) {
        if volume > 0.0 {
            self.parcels.push(Parcel {
                volume,
                remaining: volume,
                d18o,
                age: 0,
            });
        }
        if self.parcels.is_empty() {
            self.last_d18o = d18o;
        }
    }

    /// Zero negative rounding residue left in parcels.
    fn zero_residue(&mut self) {
        for p in self.parcels.iter_mut() {
            if p.remaining < 0.0 && p.remaining > -NEGATIVE_TOLERANCE {
                p.remaining = 0.0;
            }
        }
    }
}

/// State of all five stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReservoirState {
    /// Soil moisture store.
    pub soil: Store,
    /// Epikarst store below the soil.
    pub epikarst: Store,
    /// Karst store 1, draining to discharge.
    pub ks1: Store,
    /// Karst store 2, fed by epikarst overflow.
    pub ks2: Store,
    /// Diffuse flow path.
    pub diffuse: DiffuseStore,
}

impl ReservoirState {
    /// Initial state from configuration. Contents above capacity are clamped with a warning.
    pub fn from_config(config: &Config) -> Self {
        let ic: &InitialConditions = &config.initial_conditions;
        let clamp = |name: &str, value: f64, cap: f64| {
            if value > cap {
                warn!("initial {name} content {value} exceeds capacity {cap}, clamping");
                cap
            } else {
                value
            }
        };
        ReservoirState {
            soil: Store::new(clamp("soil", ic.soil, config.soilstore), ic.d18o_soil),
            epikarst: Store::new(
                clamp("epikarst", ic.epikarst, config.epikarst),
                ic.d18o_epikarst,
            ),
            ks1: Store::new(clamp("ks1", ic.ks1, config.ks1), ic.d18o_ks1),
            ks2: Store::new(clamp("ks2", ic.ks2, config.ks2), ic.d18o_ks2),
            diffuse: DiffuseStore::new(ic.diffuse, ic.d18o_diffuse),
        }
    }

    /// Total water held in all stores (mm).
    pub fn total_water(&self) -> f64 {
        self.soil.content
            + self.epikarst.content
            + self.ks1.content
            + self.ks2.content
            + self.diffuse.content()
    }

    /// Contents in the order of [`crate::constants::STORE_NAMES`].
    pub fn contents(&self) -> [f64; 5] {
        [
            self.soil.content,
            self.epikarst.content,
            self.ks1.content,
            self.ks2.content,
            self.diffuse.content(),
        ]
    }

    /// Fail with [`KarstError::NegativeStorage`] if any store is below zero.
    ///
    /// Negatives within rounding tolerance are set to zero.
    pub fn check_non_negative(&mut self, step: usize) -> Result<(), KarstError> {
        for (name, store) in [
            (STORE_NAMES[0], &mut self.soil),
            (STORE_NAMES[1], &mut self.epikarst),
            (STORE_NAMES[2], &mut self.ks1),
            (STORE_NAMES[3], &mut self.ks2),
        ] {
            if store.content < -NEGATIVE_TOLERANCE || !store.content.is_finite() {
                return Err(KarstError::NegativeStorage {
                    step,
                    store: name,
                    content: store.content,
                });
            }
            if store.content < 0.0 {
                store.content = 0.0;
            }
        }
        self.diffuse.zero_residue();
        let diffuse = self.diffuse.content();
        if diffuse < -NEGATIVE_TOLERANCE || !diffuse.is_finite() {
            return Err(KarstError::NegativeStorage {
                step,
                store: STORE_NAMES[4],
                content: diffuse,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} ± {tol}, got {actual}"
        );
    }

    #[test]
    fn mix_is_weighted_average() {
        assert_approx(mix(&[(3.0, -6.0), (1.0, -2.0)], 0.0), -5.0, 1e-12);
    }

    #[test]
    fn mix_holds_previous_when_dry() {
        assert_eq!(mix(&[(0.0, f64::NAN), (0.0, -2.0)], -4.5), -4.5);
    }

    #[test]
    fn zero_inflow_leaves_d18o_unchanged() {
        let mut s = Store::new(50.0, -5.3);
        s.receive(&[(0.0, -9.0)]);
        assert_eq!(s.d18o, -5.3);
        assert_eq!(s.content, 50.0);
    }

    #[test]
    fn empty_store_takes_inflow_d18o_exactly() {
        let mut s = Store::new(0.0, -5.3);
        s.receive(&[(17.3, -8.11)]);
        assert_eq!(s.d18o, -8.11);
        assert_eq!(s.content, 17.3);
    }

    #[test]
    fn spill_takes_capacity_tie_as_overflow() {
        let mut s = Store::new(100.0, -5.0);
        assert_eq!(s.spill_above(100.0), 0.0);
        assert_eq!(s.content, 100.0);
        let mut s = Store::new(120.0, -5.0);
        assert_eq!(s.spill_above(100.0), 20.0);
        assert_eq!(s.content, 100.0);
    }

    #[test]
    fn enrich_skips_empty_store() {
        let mut s = Store::new(0.0, -5.0);
        s.enrich(1.0);
        assert_eq!(s.d18o, -5.0);
    }

    #[test]
    fn diffuse_release_conserves_water() {
        let kernel = WeibullKernel::new(0.8, 1.5, 6);
        let mut d = DiffuseStore::new(10.0, -6.0);
        d.receive(5.0, -4.0);
        let mut released = 0.0;
        for _ in 0..10 {
            released += d.release(&kernel).0;
        }
        assert_approx(released, 15.0, 1e-9);
        assert!(d.parcels().is_empty());
    }

    #[test]
    fn parcel_residue_is_released_with_last_share() {
        let kernel = WeibullKernel::new(0.8, 1.5, 12);
        let mut d = DiffuseStore::new(0.0, -6.0);
        d.parcels.push(Parcel {
            volume: 10.0,
            remaining: 10.0 * kernel.weight(1) + 5e-10,
            d18o: -4.0,
            age: 0,
        });
        let held = d.content();
        let (v, dd) = d.release(&kernel);
        assert!(d.parcels().is_empty());
        assert_eq!(v, held);
        assert_eq!(d.content() + v, held);
        assert_eq!(dd, -4.0);
    }

    #[test]
    fn diffuse_nothing_released_in_arrival_month() {
        let kernel = WeibullKernel::new(0.8, 1.5, 12);
        let mut d = DiffuseStore::new(0.0, -6.0);
        let (v, dd) = d.release(&kernel);
        assert_eq!(v, 0.0);
        assert_eq!(dd, -6.0);
        d.receive(10.0, -4.0);
        assert_eq!(d.content(), 10.0);
        let (v, dd) = d.release(&kernel);
        assert_approx(v, 10.0 * kernel.weight(1), 1e-12);
        assert_eq!(dd, -4.0);
    }

    #[test]
    fn negative_store_is_reported() {
        let mut s = ReservoirState {
            soil: Store::new(1.0, -5.0),
            epikarst: Store::new(-2.0, -5.0),
            ks1: Store::new(1.0, -5.0),
            ks2: Store::new(1.0, -5.0),
            diffuse: DiffuseStore::new(0.0, -5.0),
        };
        match s.check_non_negative(4) {
            Err(KarstError::NegativeStorage {
                step,
                store,
                content,
            }) => {
                assert_eq!(step, 4);
                assert_eq!(store, "epikarst");
                assert_eq!(content, -2.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rounding_negatives_are_zeroed() {
        let mut s = ReservoirState {
            soil: Store::new(-1e-12, -5.0),
            epikarst: Store::new(0.0, -5.0),
            ks1: Store::new(0.0, -5.0),
            ks2: Store::new(0.0, -5.0),
            diffuse: DiffuseStore::new(0.0, -5.0),
        };
        s.check_non_negative(1).unwrap();
        assert_eq!(s.soil.content, 0.0);
    }
}
