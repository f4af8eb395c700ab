//! CUDA architecture capability tables
//!
//! Static mappings from a compute capability ("major.minor") to the number
//! of CUDA cores per streaming multiprocessor and the Hyper-Q depth
//! (concurrent hardware work queues), and from the major digit to the
//! architecture family name.
//!
//! Unknown generations are a hard failure. New architectures have to be
//! added here explicitly rather than being guessed.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-generation capability entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchSpec {
    /// CUDA cores per streaming multiprocessor
    pub cores_per_sm: u32,
    /// Concurrent hardware work queues (Hyper-Q)
    pub hyper_q: u32,
}

impl ArchSpec {
    const fn new(cores_per_sm: u32, hyper_q: u32) -> Self {
        Self {
            cores_per_sm,
            hyper_q,
        }
    }
}

const ARCH_TABLE: &[(&str, ArchSpec)] = &[
    ("1.0", ArchSpec::new(8, 1)),    // Tesla G80
    ("1.1", ArchSpec::new(8, 1)),    // Tesla G8x G9x
    ("1.2", ArchSpec::new(8, 1)),    // Tesla GT21x
    ("1.3", ArchSpec::new(8, 1)),    // Tesla GT20x
    ("2.0", ArchSpec::new(32, 1)),   // Fermi GF100 GF110
    ("2.1", ArchSpec::new(48, 1)),   // Fermi GF10x GF11x
    ("3.0", ArchSpec::new(192, 1)),  // Kepler GK10x
    ("3.2", ArchSpec::new(192, 1)),  // Kepler TK1
    ("3.5", ArchSpec::new(192, 32)), // Kepler GK11x GK20x
    ("3.7", ArchSpec::new(192, 32)), // Kepler GK21x
    ("5.0", ArchSpec::new(128, 32)), // Maxwell GM10x
    ("5.2", ArchSpec::new(128, 32)), // Maxwell GM20x
    ("5.3", ArchSpec::new(128, 32)), // Maxwell TX1
    ("6.0", ArchSpec::new(64, 32)),  // Pascal GP100
    ("6.1", ArchSpec::new(128, 32)), // Pascal GP10x
    ("6.2", ArchSpec::new(128, 32)), // Pascal GP10B
    ("7.0", ArchSpec::new(64, 32)),  // Volta GV100
    ("7.2", ArchSpec::new(64, 32)),  // Volta GV10B
];

// Keyed by the leading digit of the compute capability. Turing (7.5) and
// later share a digit with a different family and are not listed above.
const FAMILY_TABLE: &[(char, &str)] = &[
    ('1', "Tesla"),
    ('2', "Fermi"),
    ('3', "Kepler"),
    ('5', "Maxwell"),
    ('6', "Pascal"),
    ('7', "Volta"),
];

/// Compute capability version, e.g. `6.1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComputeVersion {
    pub major: u32,
    pub minor: u32,
}

impl ComputeVersion {
    /// Create a new compute capability version
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// The "major.minor" table key
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ComputeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Look up the capability entry for a "major.minor" key
pub fn arch_spec(arch: &str) -> Result<ArchSpec, DomainError> {
    ARCH_TABLE
        .iter()
        .find(|(key, _)| *key == arch)
        .map(|(_, spec)| *spec)
        .ok_or_else(|| DomainError::UnsupportedArchitecture(arch.to_string()))
}

/// CUDA cores per SM for a "major.minor" key
pub fn cores_per_sm(arch: &str) -> Result<u32, DomainError> {
    arch_spec(arch).map(|spec| spec.cores_per_sm)
}

/// Hyper-Q depth for a "major.minor" key
pub fn hyper_q(arch: &str) -> Result<u32, DomainError> {
    arch_spec(arch).map(|spec| spec.hyper_q)
}

/// Architecture family name from the leading digit of a "major.minor" key
pub fn family(arch: &str) -> Result<&'static str, DomainError> {
    let digit = arch
        .chars()
        .next()
        .ok_or_else(|| DomainError::UnsupportedArchitecture(arch.to_string()))?;

    FAMILY_TABLE
        .iter()
        .find(|(d, _)| *d == digit)
        .map(|(_, name)| *name)
        .ok_or_else(|| DomainError::UnsupportedArchitecture(arch.to_string()))
}

/// All supported "major.minor" keys, in table order
pub fn supported_architectures() -> impl Iterator<Item = &'static str> {
    ARCH_TABLE.iter().map(|(key, _)| *key)
}
