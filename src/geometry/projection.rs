//! Planar <-> geographic coordinate transform built from a PROJ.4 string.
//!
//! Supports transverse Mercator (`tmerc`, `utm`) and the identity
//! (`longlat`). The forward transform uses the Krüger series; the inverse
//! starts from the inverse series and is refined by Newton iteration against
//! the forward transform, so a round trip is exact to well below a micrometre.

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};

const SERIES_ORDER: usize = 4;
const NEWTON_MAX_ITERATIONS: usize = 8;
const NEWTON_TOLERANCE_M: f64 = 1e-10;
const JACOBIAN_STEP_RAD: f64 = 1e-8;

/// Reference ellipsoid (semi-major axis, inverse flattening). `rf = 0` is a sphere.
fn named_ellipsoid(name: &str) -> Option<(f64, f64)> {
    match name {
        "WGS84" => Some((6_378_137.0, 298.257_223_563)),
        "GRS80" => Some((6_378_137.0, 298.257_222_101)),
        "intl" => Some((6_378_388.0, 297.0)),
        "krass" => Some((6_378_245.0, 298.3)),
        "clrk66" => Some((6_378_206.4, 294.978_698_213_898)),
        "bessel" => Some((6_377_397.155, 299.152_812_8)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Method {
    /// Planar coordinates are already longitude/latitude
    Identity,
    TransverseMercator(TransverseMercator),
}

/// Coordinate transform between the map's planar frame (meters) and
/// WGS84-style longitude/latitude (degrees).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projector {
    definition: String,
    method: Method,
}

impl Projector {
    /// Parse a PROJ.4 definition such as
    /// `+proj=tmerc +lat_0=39.9 +lon_0=116.4 +ellps=WGS84 +units=m +no_defs`.
    pub fn from_proj_string(definition: &str) -> Result<Self> {
        let params = ProjParams::parse(definition)?;
        let malformed = |reason: String| MapError::MalformedProjection {
            definition: definition.to_string(),
            reason,
        };

        let method = match params.get("proj") {
            Some("longlat" | "latlong" | "lonlat" | "latlon") => Method::Identity,
            Some("tmerc") => Method::TransverseMercator(TransverseMercator::new(
                &params,
                params.float("lat_0")?.unwrap_or(0.0),
                params.float("lon_0")?.unwrap_or(0.0),
                params.float("k_0")?.or(params.float("k")?).unwrap_or(1.0),
                params.float("x_0")?.unwrap_or(0.0),
                params.float("y_0")?.unwrap_or(0.0),
            )?),
            Some("utm") => {
                let zone = params
                    .float("zone")?
                    .ok_or_else(|| malformed("utm requires +zone".to_string()))?;
                if !(1.0..=60.0).contains(&zone) || zone.fract() != 0.0 {
                    return Err(malformed(format!("invalid utm zone {zone}")));
                }
                let false_northing = if params.has("south") { 10_000_000.0 } else { 0.0 };
                Method::TransverseMercator(TransverseMercator::new(
                    &params,
                    0.0,
                    (zone - 1.0) * 6.0 - 180.0 + 3.0,
                    0.9996,
                    500_000.0,
                    false_northing,
                )?)
            }
            Some(other) => return Err(malformed(format!("unsupported projection {other:?}"))),
            None => return Err(malformed("missing +proj".to_string())),
        };

        if let Some(units) = params.get("units") {
            if units != "m" {
                return Err(malformed(format!("unsupported units {units:?}")));
            }
        }

        Ok(Self {
            definition: definition.to_string(),
            method,
        })
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Longitude/latitude (degrees) to planar x/y (meters).
    pub fn project(&self, lng: f64, lat: f64) -> (f64, f64) {
        match &self.method {
            Method::Identity => (lng, lat),
            Method::TransverseMercator(tm) => tm.forward(lng.to_radians(), lat.to_radians()),
        }
    }

    /// Planar x/y (meters) to longitude/latitude (degrees).
    pub fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        match &self.method {
            Method::Identity => (x, y),
            Method::TransverseMercator(tm) => {
                let (lam, phi) = tm.inverse(x, y);
                (lam.to_degrees(), phi.to_degrees())
            }
        }
    }

    pub fn project_coord(&self, c: Coord<f64>) -> Coord<f64> {
        let (x, y) = self.project(c.x, c.y);
        Coord { x, y }
    }

    pub fn unproject_coord(&self, c: Coord<f64>) -> Coord<f64> {
        let (x, y) = self.unproject(c.x, c.y);
        Coord { x, y }
    }

    /// Batch variant of [`Projector::project`].
    pub fn project_many(&self, coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
        coords.iter().map(|c| self.project_coord(*c)).collect()
    }

    /// Batch variant of [`Projector::unproject`].
    pub fn unproject_many(&self, coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
        coords.iter().map(|c| self.unproject_coord(*c)).collect()
    }
}

/// `+key=value` / `+flag` tokens of a PROJ.4 string.
struct ProjParams<'a> {
    definition: &'a str,
    entries: Vec<(&'a str, Option<&'a str>)>,
}

impl<'a> ProjParams<'a> {
    fn parse(definition: &'a str) -> Result<Self> {
        let mut entries = Vec::new();
        for token in definition.split_whitespace() {
            let body = token.strip_prefix('+').ok_or_else(|| MapError::MalformedProjection {
                definition: definition.to_string(),
                reason: format!("token {token:?} does not start with '+'"),
            })?;
            match body.split_once('=') {
                Some((key, value)) => entries.push((key, Some(value))),
                None => entries.push((body, None)),
            }
        }
        if entries.is_empty() {
            return Err(MapError::MalformedProjection {
                definition: definition.to_string(),
                reason: "empty definition".to_string(),
            });
        }
        Ok(Self {
            definition,
            entries,
        })
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| *v)
    }

    fn has(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    fn float(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .map(Some)
                .map_err(|_| MapError::MalformedProjection {
                    definition: self.definition.to_string(),
                    reason: format!("+{key}={raw} is not a number"),
                }),
        }
    }

    /// Semi-major axis and eccentricity from `+ellps`, `+datum`, `+a`, `+b`, `+rf`, `+f` or `+R`.
    fn ellipsoid(&self) -> Result<(f64, f64)> {
        let malformed = |reason: String| MapError::MalformedProjection {
            definition: self.definition.to_string(),
            reason,
        };

        if let Some(radius) = self.float("R")? {
            return Ok((radius, 0.0));
        }

        let named = self.get("ellps").or(match self.get("datum") {
            Some("WGS84") => Some("WGS84"),
            Some("NAD83") => Some("GRS80"),
            Some(other) => return Err(malformed(format!("unsupported datum {other:?}"))),
            None => None,
        });
        let (mut a, mut rf) = match named {
            Some(name) => named_ellipsoid(name)
                .ok_or_else(|| malformed(format!("unknown ellipsoid {name:?}")))?,
            None => named_ellipsoid("WGS84").unwrap_or((6_378_137.0, 298.257_223_563)),
        };

        if let Some(value) = self.float("a")? {
            a = value;
        }
        let flattening = if let Some(b) = self.float("b")? {
            (a - b) / a
        } else if let Some(f) = self.float("f")? {
            f
        } else if let Some(value) = self.float("rf")? {
            rf = value;
            1.0 / rf
        } else if rf == 0.0 {
            0.0
        } else {
            1.0 / rf
        };

        if !(a > 0.0) || !(0.0..1.0).contains(&flattening) {
            return Err(malformed("invalid ellipsoid parameters".to_string()));
        }
        let e2 = flattening * (2.0 - flattening);
        Ok((a, e2.sqrt()))
    }
}

/// Ellipsoidal transverse Mercator via the Krüger series in n.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TransverseMercator {
    lon_0: f64,
    k0: f64,
    x_0: f64,
    y_0: f64,
    /// Eccentricity
    e: f64,
    /// Rectifying radius scaled by `k0`
    k0_a: f64,
    alpha: [f64; SERIES_ORDER],
    beta: [f64; SERIES_ORDER],
    delta: [f64; SERIES_ORDER],
    /// Unshifted northing of the origin latitude
    origin_northing: f64,
}

impl TransverseMercator {
    fn new(
        params: &ProjParams<'_>,
        lat_0: f64,
        lon_0: f64,
        k0: f64,
        x_0: f64,
        y_0: f64,
    ) -> Result<Self> {
        if !(k0 > 0.0) {
            return Err(MapError::MalformedProjection {
                definition: params.definition.to_string(),
                reason: format!("invalid scale factor {k0}"),
            });
        }
        let (a, e) = params.ellipsoid()?;
        let f = 1.0 - (1.0 - e * e).sqrt();
        let n = f / (2.0 - f);
        let (n2, n3, n4) = (n * n, n * n * n, n * n * n * n);

        let big_a = a / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0);
        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0,
            49561.0 * n4 / 161280.0,
        ];
        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0,
            n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0,
            17.0 * n3 / 480.0 - 37.0 * n4 / 840.0,
            4397.0 * n4 / 161280.0,
        ];
        let delta = [
            2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3 + 116.0 * n4 / 45.0,
            7.0 * n2 / 3.0 - 8.0 * n3 / 5.0 - 227.0 * n4 / 45.0,
            56.0 * n3 / 15.0 - 136.0 * n4 / 35.0,
            4279.0 * n4 / 630.0,
        ];

        let mut tm = Self {
            lon_0: lon_0.to_radians(),
            k0,
            x_0,
            y_0,
            e,
            k0_a: k0 * big_a,
            alpha,
            beta,
            delta,
            origin_northing: 0.0,
        };
        tm.origin_northing = tm.raw_forward(0.0, lat_0.to_radians()).1;
        Ok(tm)
    }

    /// Projection relative to the central meridian, without false origin.
    fn raw_forward(&self, dlam: f64, phi: f64) -> (f64, f64) {
        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - self.e * (self.e * sin_phi).atanh()).sinh();
        let xi_p = t.atan2(dlam.cos());
        let eta_p = (dlam.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += alpha * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += alpha * (k * xi_p).cos() * (k * eta_p).sinh();
        }
        (self.k0_a * eta, self.k0_a * xi)
    }

    fn forward(&self, lam: f64, phi: f64) -> (f64, f64) {
        let (x, y) = self.raw_forward(lam - self.lon_0, phi);
        (x + self.x_0, y - self.origin_northing + self.y_0)
    }

    /// Series inverse; accurate to the truncation order only.
    fn series_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let xi = y / self.k0_a;
        let eta = x / self.k0_a;

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, beta) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_p -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_p -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).clamp(-1.0, 1.0).asin();
        let mut phi = chi;
        for (j, delta) in self.delta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            phi += delta * (k * chi).sin();
        }
        let dlam = eta_p.sinh().atan2(xi_p.cos());
        (dlam, phi)
    }

    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let tx = x - self.x_0;
        let ty = y - self.y_0 + self.origin_northing;

        let (mut dlam, mut phi) = self.series_inverse(tx, ty);
        for _ in 0..NEWTON_MAX_ITERATIONS {
            let (fx, fy) = self.raw_forward(dlam, phi);
            let (rx, ry) = (tx - fx, ty - fy);
            if rx.abs() < NEWTON_TOLERANCE_M && ry.abs() < NEWTON_TOLERANCE_M {
                break;
            }
            let h = JACOBIAN_STEP_RAD;
            let (fx_l, fy_l) = self.raw_forward(dlam + h, phi);
            let (fx_p, fy_p) = self.raw_forward(dlam, phi + h);
            let (j11, j21) = ((fx_l - fx) / h, (fy_l - fy) / h);
            let (j12, j22) = ((fx_p - fx) / h, (fy_p - fy) / h);
            let det = j11 * j22 - j12 * j21;
            if det == 0.0 || !det.is_finite() {
                break;
            }
            dlam += (rx * j22 - ry * j12) / det;
            phi += (ry * j11 - rx * j21) / det;
        }
        (dlam + self.lon_0, phi)
    }
}
