//! Kubernetes resource quantities.
//!
//! Parses memory/storage sizes (`512Mi`, `1G`, `1073741824`) and CPU amounts
//! (`2`, `0.5`, `250m`), scales them, and formats them back in the unit the
//! manifest author used whenever the result is integral in that unit.

use std::cmp::Ordering;
use std::fmt;

/// Suffix of a byte quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteUnit {
    Bytes,
    Ki,
    Mi,
    Gi,
    Ti,
    K,
    M,
    G,
    T,
}

impl ByteUnit {
    const SUFFIXES: [(&'static str, ByteUnit); 8] = [
        ("Ki", ByteUnit::Ki),
        ("Mi", ByteUnit::Mi),
        ("Gi", ByteUnit::Gi),
        ("Ti", ByteUnit::Ti),
        ("k", ByteUnit::K),
        ("M", ByteUnit::M),
        ("G", ByteUnit::G),
        ("T", ByteUnit::T),
    ];

    /// Number of bytes in one unit.
    pub fn factor(&self) -> u64 {
        match self {
            ByteUnit::Bytes => 1,
            ByteUnit::Ki => 1 << 10,
            ByteUnit::Mi => 1 << 20,
            ByteUnit::Gi => 1 << 30,
            ByteUnit::Ti => 1 << 40,
            ByteUnit::K => 1_000,
            ByteUnit::M => 1_000_000,
            ByteUnit::G => 1_000_000_000,
            ByteUnit::T => 1_000_000_000_000,
        }
    }

    /// Textual suffix.
    pub fn suffix(&self) -> &'static str {
        match self {
            ByteUnit::Bytes => "",
            ByteUnit::Ki => "Ki",
            ByteUnit::Mi => "Mi",
            ByteUnit::Gi => "Gi",
            ByteUnit::Ti => "Ti",
            ByteUnit::K => "k",
            ByteUnit::M => "M",
            ByteUnit::G => "G",
            ByteUnit::T => "T",
        }
    }

    /// Next smaller unit in the same family.
    fn smaller(&self) -> ByteUnit {
        match self {
            ByteUnit::Ti => ByteUnit::Gi,
            ByteUnit::Gi => ByteUnit::Mi,
            ByteUnit::Mi => ByteUnit::Ki,
            ByteUnit::T => ByteUnit::G,
            ByteUnit::G => ByteUnit::M,
            ByteUnit::M => ByteUnit::K,
            ByteUnit::Ki | ByteUnit::K | ByteUnit::Bytes => ByteUnit::Bytes,
        }
    }
}

/// A memory or storage amount.
#[derive(Debug, Clone, Copy)]
pub struct ByteQuantity {
    bytes: u64,
    unit: ByteUnit,
}

impl ByteQuantity {
    /// Creates a quantity expressed in `unit`.
    pub fn new(amount: u64, unit: ByteUnit) -> Self {
        Self {
            bytes: amount.saturating_mul(unit.factor()),
            unit,
        }
    }

    /// Parses a quantity such as `512Mi`, `1.5Gi` or `268435456`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (number, unit) = ByteUnit::SUFFIXES
            .iter()
            .find_map(|(suffix, unit)| text.strip_suffix(suffix).map(|n| (n, *unit)))
            .unwrap_or((text, ByteUnit::Bytes));

        let value: f64 = number.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let bytes = (value * unit.factor() as f64).round();
        if bytes > u64::MAX as f64 {
            return None;
        }
        Some(Self {
            bytes: bytes as u64,
            unit,
        })
    }

    /// Total bytes.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Returns this quantity multiplied by `factor`, keeping the unit.
    pub fn scaled(&self, factor: u64) -> Self {
        Self {
            bytes: self.bytes.saturating_mul(factor),
            unit: self.unit,
        }
    }

    /// Returns half of this quantity, keeping the unit where possible.
    pub fn halved(&self) -> Self {
        Self {
            bytes: self.bytes / 2,
            unit: self.unit,
        }
    }
}

impl PartialEq for ByteQuantity {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for ByteQuantity {}

impl PartialOrd for ByteQuantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByteQuantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl fmt::Display for ByteQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut unit = self.unit;
        while unit != ByteUnit::Bytes && self.bytes % unit.factor() != 0 {
            unit = unit.smaller();
        }
        write!(f, "{}{}", self.bytes / unit.factor(), unit.suffix())
    }
}

/// A CPU amount in millicores.
#[derive(Debug, Clone, Copy)]
pub struct CpuQuantity {
    millis: u64,
    in_cores: bool,
}

impl CpuQuantity {
    /// Creates a quantity from millicores.
    pub fn from_millis(millis: u64) -> Self {
        Self {
            millis,
            in_cores: false,
        }
    }

    /// Parses `2`, `0.5` or `250m`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(millis) = text.strip_suffix('m') {
            return Some(Self {
                millis: millis.trim().parse().ok()?,
                in_cores: false,
            });
        }
        let cores: f64 = text.parse().ok()?;
        if !cores.is_finite() || cores < 0.0 {
            return None;
        }
        Some(Self {
            millis: (cores * 1000.0).round() as u64,
            in_cores: true,
        })
    }

    /// Returns half of this quantity.
    pub fn halved(&self) -> Self {
        Self {
            millis: self.millis / 2,
            in_cores: self.in_cores,
        }
    }

    /// True when the formatted value is a whole number of cores.
    pub fn is_whole_cores(&self) -> bool {
        self.in_cores && self.millis % 1000 == 0
    }
}

impl PartialEq for CpuQuantity {
    fn eq(&self, other: &Self) -> bool {
        self.millis == other.millis
    }
}

impl Eq for CpuQuantity {}

impl PartialOrd for CpuQuantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CpuQuantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.millis.cmp(&other.millis)
    }
}

impl fmt::Display for CpuQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole_cores() {
            write!(f, "{}", self.millis / 1000)
        } else {
            write!(f, "{}m", self.millis)
        }
    }
}
