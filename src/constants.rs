//! Fixed constants of the karst and cave models.

/// Volumes at or below this (mm) are treated as empty when mixing isotopes.
pub const VOLUME_EPSILON: f64 = 1e-9;

/// Negative store contents smaller in magnitude than this are rounding noise and get zeroed.
pub const NEGATIVE_TOLERANCE: f64 = 1e-9;

/// Monthly rainfall (mm) above which part of the infiltration bypasses the soil store.
pub const BYPASS_RAIN_THRESHOLD: f64 = 7.0;

/// Surface temperature (°C) at or below which soil drainage is frozen.
pub const FREEZING_POINT: f64 = 0.0;

/// Soil fill fraction at or below which the epikarst starts to evaporate.
pub const EPIKARST_EVAP_SOIL_FRACTION: f64 = 0.1;

/// Slope of epikarst evaporation against soil fill.
pub const EPIKARST_EVAP_SLOPE: f64 = 4.0;

/// Default length of the Weibull transit kernel, in months.
pub const DEFAULT_WEIBULL_DELAY_MONTHS: usize = 12;

/// Upper end of the kernel abscissa (dimensionless lag).
pub const WEIBULL_X_MAX: f64 = 2.0;

/// Kernel entries that evaluate to a non-finite density are replaced by this weight.
pub const WEIBULL_NONFINITE_WEIGHT: f64 = 0.001;

/// Default epikarst overflow fraction above `epicap`.
pub const DEFAULT_F4: f64 = 1.0;

/// Zero Celsius in Kelvin.
pub const KELVIN: f64 = 273.15;

/// pCO2 inputs are given in ppm.
pub const PPM: f64 = 1e6;

/// Thickness of the water film on the stalagmite top (m).
pub const FILM_THICKNESS: f64 = 1e-4;

/// Radius of the wetted stalagmite top (m).
pub const FILM_RADIUS: f64 = 0.017841241;

/// Density of water (kg/m³).
pub const WATER_DENSITY: f64 = 1000.0;

/// Molar mass of water (kg/mol).
pub const WATER_MOLAR_MASS: f64 = 0.018;

/// Molar mass of calcite (kg/mol).
pub const CALCITE_MOLAR_MASS: f64 = 0.1000869;

/// Density of calcite (kg/m³).
pub const CALCITE_DENSITY: f64 = 2710.0;

/// Seconds in a Julian year.
pub const SECONDS_PER_YEAR: f64 = 3.15576e7;

/// The evaporated fraction of a film is capped here so the Rayleigh term stays finite.
pub const MAX_EVAPORATED_FRACTION: f64 = 0.99;

/// Kinetic (diffusive) enrichment of evaporating water at zero humidity, permille.
pub const CRAIG_GORDON_KINETIC: f64 = 28.5;

/// Reference isotope-buffering time (s) at 0 °C.
pub const BUFFERING_TIME_REF: f64 = 1e5;

/// Exponential temperature sensitivity of the buffering time (1/°C).
pub const BUFFERING_TIME_SLOPE: f64 = 0.1;

/// Coplen (1983) VSMOW to VPDB conversion slope.
pub const VPDB_SLOPE: f64 = 0.97001;

/// Coplen (1983) VSMOW to VPDB conversion offset.
pub const VPDB_OFFSET: f64 = 29.99;

/// Fixed-point iterations used to converge activity coefficients.
pub const ACTIVITY_ITERATIONS: usize = 20;

/// Names of the five stores, in reporting order.
pub const STORE_NAMES: [&str; 5] = ["soil", "epikarst", "ks1", "ks2", "diffuse"];
