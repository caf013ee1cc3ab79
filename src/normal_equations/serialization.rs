//! Persistence of normal equations.
//!
//! Normal equations travel between processes as JSON documents carrying an
//! explicit format version and the kind of normal equations they hold. The
//! header is checked before the payload is decoded: a reader never attempts
//! to interpret a document written with another format version.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::warn;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::generic::{BlockRows, GenericNormalEquations};
use crate::error::{NormalEqError, Result};

/// Version of the serialized layout written by this library.
pub const FORMAT_VERSION: u32 = 1;

/// Kind tag of generic normal equations.
pub const GENERIC_KIND: &str = "generic";

#[derive(Serialize)]
struct ContainerRef<'a> {
    version: u32,
    kind: &'a str,
    normal_matrix: &'a BlockRows,
    data_vector: &'a BTreeMap<String, Array1<f64>>,
}

#[derive(Deserialize)]
struct Header {
    version: u32,
    kind: String,
}

#[derive(Deserialize)]
struct Container {
    normal_matrix: BlockRows,
    data_vector: BTreeMap<String, Array1<f64>>,
}

impl GenericNormalEquations {
    /// Write the normal equations to `writer`.
    ///
    /// # Errors
    ///
    /// * `NormalEqError::InvalidInput` if any entry is NaN or infinite
    /// * `NormalEqError::JsonError` / `NormalEqError::IoError` if writing fails
    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        self.check_finite()?;
        serde_json::to_writer(writer, &self.container())?;
        Ok(())
    }

    /// Replace the contents of `self` with normal equations read from `reader`.
    ///
    /// On error `self` is left unchanged.
    ///
    /// # Errors
    ///
    /// * `NormalEqError::VersionMismatch` if the data were written with another format version
    /// * `NormalEqError::Incompatible` if the data hold another kind of normal equations
    /// * `NormalEqError::DimensionMismatch` if the decoded blocks are inconsistent or a
    ///   cross term is not the transpose of its mirror block
    /// * `NormalEqError::JsonError` / `NormalEqError::IoError` for unreadable input
    pub fn read<R: Read>(&mut self, reader: R) -> Result<()> {
        let value: serde_json::Value = serde_json::from_reader(reader)?;
        let header = Header::deserialize(&value)?;
        if header.version != FORMAT_VERSION {
            warn!(
                "rejecting normal equations with format version {}",
                header.version
            );
            return Err(NormalEqError::VersionMismatch {
                expected: FORMAT_VERSION,
                found: header.version,
            });
        }
        if header.kind != GENERIC_KIND {
            warn!("rejecting normal equations of kind {}", header.kind);
            return Err(NormalEqError::Incompatible(format!(
                "expected {} normal equations, found {}",
                GENERIC_KIND, header.kind
            )));
        }

        let container: Container = serde_json::from_value(value)?;
        let decoded = GenericNormalEquations {
            normal_matrix: container.normal_matrix,
            data_vector: container.data_vector,
        };
        decoded.validate()?;
        *self = decoded;
        Ok(())
    }

    /// Serialize the normal equations into a byte buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(buf)
    }

    /// Deserialize normal equations from a byte buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut ne = Self::new();
        ne.read(bytes)?;
        Ok(ne)
    }

    /// Serialize the normal equations into a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String> {
        self.check_finite()?;
        Ok(serde_json::to_string_pretty(&self.container())?)
    }

    /// Deserialize normal equations from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_bytes(json.as_bytes())
    }

    /// Save the normal equations to a JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Load normal equations from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut ne = Self::new();
        ne.read(BufReader::new(File::open(path)?))?;
        Ok(ne)
    }

    /// JSON has no representation for NaN or infinity.
    fn check_finite(&self) -> Result<()> {
        for (row_name, row) in &self.normal_matrix {
            for (col_name, block) in row {
                if let Some(x) = block.iter().find(|x| !x.is_finite()) {
                    return Err(NormalEqError::InvalidInput(format!(
                        "block ({}, {}) holds non-finite value {}",
                        row_name, col_name, x
                    )));
                }
            }
        }
        for (name, dv) in &self.data_vector {
            if let Some(x) = dv.iter().find(|x| !x.is_finite()) {
                return Err(NormalEqError::InvalidInput(format!(
                    "data vector of {} holds non-finite value {}",
                    name, x
                )));
            }
        }
        Ok(())
    }

    fn container(&self) -> ContainerRef<'_> {
        ContainerRef {
            version: FORMAT_VERSION,
            kind: GENERIC_KIND,
            normal_matrix: &self.normal_matrix,
            data_vector: &self.data_vector,
        }
    }
}
