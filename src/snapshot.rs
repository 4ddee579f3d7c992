use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::validate_service;
use crate::limits::MAX_SERVICES;
use crate::model::{Booking, Reservation, Service, Technician, WaitingBatch};

/// Full state of one operating day, as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub employees: Vec<Technician>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
    #[serde(default)]
    pub waiting: Vec<WaitingBatch>,
    #[serde(default)]
    pub reservations: Vec<Reservation>,
    #[serde(default = "first_customer")]
    pub customer_sequence: u64,
}

fn first_customer() -> u64 {
    1
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            employees: Vec::new(),
            services: Vec::new(),
            bookings: Vec::new(),
            waiting: Vec::new(),
            reservations: Vec::new(),
            customer_sequence: first_customer(),
        }
    }
}

/// Read a snapshot. A missing file is `Ok(None)`; a corrupt one is an error.
pub fn load(path: &Path) -> io::Result<Option<Snapshot>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Replace the snapshot at `path` atomically: temp file, fsync, rename.
pub fn write(path: &Path, snapshot: &Snapshot) -> io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, snapshot)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

// ── Catalog seed ─────────────────────────────────────────────────

const DEFAULT_MENU: &[(&str, u32, f64)] = &[
    // Deep tissue oil, relaxation, dry massage
    ("NS (0 mins)", 0, 0.0),
    ("NS (1 mins)", 1, 45.0),
    ("NS (20 mins)", 20, 40.0),
    ("NS (30 mins)", 30, 50.0),
    ("NSHe (30 mins)", 30, 50.0),
    ("NSHe (45 mins)", 45, 75.0),
    ("BHi (30 mins)", 30, 50.0),
    ("BHi (45 mins)", 45, 75.0),
    ("L (30 mins)", 30, 50.0),
    ("L (45 mins)", 45, 75.0),
    ("NSB (45 mins)", 45, 75.0),
    ("NSB (60 mins)", 60, 100.0),
    ("NSAHa (45 mins)", 45, 75.0),
    ("NSAHa (60 mins)", 60, 100.0),
    ("NSBHe (50 mins)", 50, 85.0),
    ("NSBHe (60 mins)", 60, 100.0),
    ("BL (50 mins)", 50, 85.0),
    ("BL (60 mins)", 60, 100.0),
    ("NSBAHa (50 mins)", 50, 85.0),
    ("NSBAHa (70 mins)", 70, 120.0),
    ("NSBL (50 mins)", 50, 85.0),
    ("NSBL (70 mins)", 70, 120.0),
    ("WB (60 mins)", 60, 100.0),
    ("WB (90 mins)", 90, 150.0),
    // Foot
    ("F(R) (30 mins)", 30, 50.0),
    ("F(R) (60 mins)", 60, 100.0),
    ("NSF (50 mins)", 50, 85.0),
    ("NSBF (60 mins)", 60, 100.0),
    ("NSBLF (70 mins)", 70, 120.0),
    ("WBF (90 mins)", 90, 150.0),
    // Special treatment
    ("Pregnancy massage (45 mins)", 45, 75.0),
    ("Pregnancy massage (60 mins)", 60, 100.0),
    ("Children massage (20 mins)", 20, 40.0),
    ("Children massage (30 mins)", 30, 50.0),
    ("Sciatica/Frozen Shoulder/Tennis Elbow/Golf Elbow (30 mins)", 30, 50.0),
    ("Sciatica/Frozen Shoulder/Tennis Elbow/Golf Elbow (45 mins)", 45, 75.0),
    ("Cupping Therapy with herbal oil (30 mins)", 30, 50.0),
    ("Ear Candling & Face Massage (30 mins)", 30, 50.0),
    ("Neck, Shoulders & Back + Cupping (50 mins)", 50, 85.0),
    // Dry needling
    ("Dry Needling (First Session)", 0, 80.0),
    ("Dry Needling (Second+ Session)", 0, 70.0),
    ("Dry Needling + 40 mins Remedial massage", 40, 130.0),
    // Remedial
    ("Remedial Massage (30 mins)", 30, 60.0),
    ("Remedial Massage (45 mins)", 45, 85.0),
    ("Remedial Massage (60 mins)", 60, 110.0),
    ("Remedial Massage (90 mins)", 90, 160.0),
];

/// The built-in menu, used when no catalog file is configured.
pub fn default_catalog() -> Vec<Service> {
    DEFAULT_MENU
        .iter()
        .map(|&(name, minutes, price)| Service::new(name, minutes, price))
        .collect()
}

/// Read a catalog seed: a JSON array of `{name, minutes, price}`.
pub fn load_catalog(path: &Path) -> io::Result<Vec<Service>> {
    let bytes = fs::read(path)?;
    let catalog: Vec<Service> =
        serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    // Same rules as a catalog upsert over the wire
    if catalog.len() > MAX_SERVICES {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "too many services"));
    }
    let mut seen = HashSet::new();
    for service in &catalog {
        validate_service(service).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("service {:?}: {e}", service.name))
        })?;
        if !seen.insert(service.name.as_str()) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("service {:?} listed twice", service.name),
            ));
        }
    }
    Ok(catalog)
}
