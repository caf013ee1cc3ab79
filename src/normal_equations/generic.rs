//! Generic block-sparse normal equations.
//!
//! The normal matrix is stored as a map of rows, each row a map from column
//! parameter to the dense block coupling the two parameters. The structure
//! is kept square at all times: as soon as a parameter is known, every row
//! holds a block for it and its own row holds a block for every other
//! parameter, with zero blocks standing in for parameters that never
//! appeared together in a contribution.

use std::borrow::Cow;
use std::collections::BTreeMap;

use log::{debug, trace};
use ndarray::{s, Array1, Array2};

use super::traits::{sealed, NormalEquations};
use crate::design::{build_contributions, Contribution, DesignMatrix};
use crate::error::{NormalEqError, Result};

/// Relative tolerance on the mismatch between a cross term and the
/// transpose of its mirror block.
pub const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Rows of the normal matrix, keyed by row parameter and then column parameter.
pub type BlockRows = BTreeMap<String, BTreeMap<String, Array2<f64>>>;

/// Block-sparse normal equations over named vector parameters.
///
/// # Examples
///
/// ```
/// use ndarray::{array, Array2};
/// use normeq_rs::GenericNormalEquations;
///
/// let mut ne = GenericNormalEquations::new();
/// ne.add("gain", array![[2.0]], &array![1.0]).unwrap();
/// ne.add("phase", array![[1.0, 0.0], [0.0, 1.0]], &array![0.5, 0.5]).unwrap();
///
/// // Independent parameters are coupled by zero blocks.
/// assert_eq!(ne.normal_matrix("gain", "phase").unwrap(), &Array2::<f64>::zeros((1, 2)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericNormalEquations {
    /// Blocks of the normal matrix
    pub(crate) normal_matrix: BlockRows,

    /// Data vector per parameter
    pub(crate) data_vector: BTreeMap<String, Array1<f64>>,
}

/// Dense form of the normal equations, for solvers that want one matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseSystem {
    /// Parameter names in the order they appear in the matrix
    pub names: Vec<String>,

    /// Offset of each parameter's first element
    pub offsets: Vec<usize>,

    /// Full normal matrix
    pub matrix: Array2<f64>,

    /// Full data vector
    pub vector: Array1<f64>,
}

impl GenericNormalEquations {
    /// Create empty normal equations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create normal equations from a single design matrix.
    pub fn from_design_matrix(dm: &DesignMatrix) -> Result<Self> {
        let mut ne = Self::new();
        ne.add_design_matrix(dm)?;
        Ok(ne)
    }

    /// Number of known parameters.
    pub fn len(&self) -> usize {
        self.data_vector.len()
    }

    /// Whether no parameter is known.
    pub fn is_empty(&self) -> bool {
        self.data_vector.is_empty()
    }

    /// Whether `name` is a known parameter.
    pub fn contains(&self, name: &str) -> bool {
        self.data_vector.contains_key(name)
    }

    /// Number of elements of parameter `name`, if known.
    pub fn dimension(&self, name: &str) -> Option<usize> {
        self.data_vector.get(name).map(Array1::len)
    }

    /// Names of all known parameters.
    pub fn unknowns(&self) -> Vec<String> {
        self.data_vector.keys().cloned().collect()
    }

    /// Block of the normal matrix coupling `row` and `col`.
    ///
    /// # Errors
    ///
    /// * `NormalEqError::ParameterNotFound` if either parameter is unknown
    pub fn normal_matrix(&self, row: &str, col: &str) -> Result<&Array2<f64>> {
        self.normal_matrix
            .get(row)
            .ok_or_else(|| NormalEqError::ParameterNotFound(row.to_string()))?
            .get(col)
            .ok_or_else(|| NormalEqError::ParameterNotFound(col.to_string()))
    }

    /// Data vector of `name`.
    ///
    /// # Errors
    ///
    /// * `NormalEqError::ParameterNotFound` if the parameter is unknown
    pub fn data_vector(&self, name: &str) -> Result<&Array1<f64>> {
        self.data_vector
            .get(name)
            .ok_or_else(|| NormalEqError::ParameterNotFound(name.to_string()))
    }

    /// Forget all parameters.
    pub fn reset(&mut self) {
        self.normal_matrix.clear();
        self.data_vector.clear();
    }

    /// Add the contribution of one row parameter.
    ///
    /// `blocks` must hold the diagonal block of `name`; its other entries are
    /// cross terms with the parameters they are keyed by.
    ///
    /// If `name` is already known, each incoming block is added to the stored
    /// block of the same column. Stored columns without an incoming block are
    /// left as they are, and incoming blocks for parameters not known yet are
    /// ignored.
    ///
    /// If `name` is new, a row and a column are created for it. Known
    /// parameters with an incoming block get that block in the new row and
    /// its transpose in the new column; all others get zero blocks.
    ///
    /// # Errors
    ///
    /// * `NormalEqError::DimensionMismatch` if the diagonal block is missing or
    ///   not square, or any block or the data vector disagrees with the
    ///   dimensions of the parameters involved. Nothing is modified then.
    pub fn add_parameter(
        &mut self,
        name: &str,
        blocks: &BTreeMap<String, Array2<f64>>,
        data_vector: &Array1<f64>,
    ) -> Result<()> {
        Self::check_row(name, blocks, data_vector, |q| self.dimension(q))?;
        self.insert_checked(name, blocks, data_vector);
        self.debug_validate();
        Ok(())
    }

    /// Add a parameter independent of all others.
    ///
    /// `matrix` becomes (or is added to) the diagonal block of `name`. Any
    /// other parameter known now gets a zero cross term with it.
    pub fn add(
        &mut self,
        name: &str,
        matrix: Array2<f64>,
        data_vector: &Array1<f64>,
    ) -> Result<()> {
        let mut blocks = BTreeMap::new();
        blocks.insert(name.to_string(), matrix);
        self.add_parameter(name, &blocks, data_vector)
    }

    /// Add a batch of contributions.
    ///
    /// Contributions sharing a row parameter are summed first. Contributions
    /// of known parameters are then applied before those of new parameters,
    /// so a cross term between a known and a new parameter is inserted once,
    /// by the new parameter's row, whatever the order of `rows`. The whole
    /// batch is checked before anything is modified.
    pub fn add_contributions(&mut self, rows: &[Contribution]) -> Result<()> {
        let batch: BTreeMap<&str, usize> = rows
            .iter()
            .map(|c| (c.name.as_str(), c.dimension()))
            .collect();
        let dims = |q: &str| self.dimension(q).or_else(|| batch.get(q).copied());
        for c in rows {
            Self::check_row(&c.name, &c.blocks, &c.data_vector, dims)?;
        }
        let rows = Self::coalesce(rows, dims);

        let (known, new): (Vec<&Cow<'_, Contribution>>, Vec<&Cow<'_, Contribution>>) =
            rows.iter().partition(|c| self.contains(&c.name));
        for c in known.into_iter().chain(new) {
            self.insert_checked(&c.name, &c.blocks, &c.data_vector);
        }
        self.debug_validate();
        Ok(())
    }

    /// Sum checked contributions sharing a row parameter.
    ///
    /// Rows keep the order of their first appearance. Blocks for columns of
    /// unknown dimension are dropped from summed rows, as insertion ignores them.
    fn coalesce<'a, F>(rows: &'a [Contribution], dims: F) -> Vec<Cow<'a, Contribution>>
    where
        F: Fn(&str) -> Option<usize>,
    {
        let mut summed: Vec<Cow<'a, Contribution>> = Vec::with_capacity(rows.len());
        let mut index: BTreeMap<&'a str, usize> = BTreeMap::new();
        for c in rows {
            let Some(&i) = index.get(c.name.as_str()) else {
                index.insert(c.name.as_str(), summed.len());
                summed.push(Cow::Borrowed(c));
                continue;
            };
            let target = summed[i].to_mut();
            target.data_vector += &c.data_vector;
            for (col, block) in &c.blocks {
                if dims(col).is_none() {
                    continue;
                }
                match target.blocks.get_mut(col) {
                    Some(existing) => *existing += block,
                    None => {
                        target.blocks.insert(col.clone(), block.clone());
                    }
                }
            }
        }
        summed
    }

    /// Build the contributions of a design matrix and add them.
    pub fn add_design_matrix(&mut self, dm: &DesignMatrix) -> Result<()> {
        let rows = build_contributions(dm)?;
        trace!(
            "adding design matrix with {} parameters and {} data points",
            rows.len(),
            dm.n_data()
        );
        self.add_contributions(&rows)
    }

    /// Add the normal equations accumulated in `other` to these.
    ///
    /// Merging is commutative, and associative up to the order of
    /// floating-point summation, so partial normal equations built from
    /// disjoint data can be combined in any grouping.
    ///
    /// # Errors
    ///
    /// * `NormalEqError::DimensionMismatch` if a parameter has different
    ///   dimensions in the two sets of normal equations. Nothing is modified then.
    pub fn merge_generic(&mut self, other: &GenericNormalEquations) -> Result<()> {
        debug!(
            "merging normal equations with {} parameters into {}",
            other.len(),
            self.len()
        );
        let dims = |q: &str| self.dimension(q).or_else(|| other.dimension(q));
        for (name, row) in &other.normal_matrix {
            Self::check_row(name, row, other.data_vector(name)?, dims)?;
        }

        let (known, new): (Vec<&String>, Vec<&String>) =
            other.data_vector.keys().partition(|name| self.contains(name));
        for name in known.into_iter().chain(new) {
            let row = other.normal_matrix.get(name);
            if let (Some(row), Some(dv)) = (row, other.data_vector.get(name)) {
                self.insert_checked(name, row, dv);
            }
        }
        self.debug_validate();
        Ok(())
    }

    /// Flatten the blocks into one dense matrix and vector.
    ///
    /// Parameters are laid out in sorted name order.
    pub fn assemble(&self) -> DenseSystem {
        let names = self.unknowns();
        let mut offsets = Vec::with_capacity(names.len());
        let mut total = 0;
        for name in &names {
            offsets.push(total);
            total += self.dimension(name).unwrap_or(0);
        }

        let mut matrix = Array2::zeros((total, total));
        let mut vector = Array1::zeros(total);
        for (i, row_name) in names.iter().enumerate() {
            let ri = offsets[i];
            if let Some(dv) = self.data_vector.get(row_name) {
                vector.slice_mut(s![ri..ri + dv.len()]).assign(dv);
            }
            let Some(row) = self.normal_matrix.get(row_name) else {
                continue;
            };
            for (j, col_name) in names.iter().enumerate() {
                if let Some(block) = row.get(col_name) {
                    let cj = offsets[j];
                    matrix
                        .slice_mut(s![ri..ri + block.nrows(), cj..cj + block.ncols()])
                        .assign(block);
                }
            }
        }

        DenseSystem {
            names,
            offsets,
            matrix,
            vector,
        }
    }

    /// Check the invariants of the normal equations.
    ///
    /// Every row must hold a block for every known parameter, the data
    /// vectors must cover exactly the known parameters, each block must be
    /// shaped by the dimensions of its row and column parameters, and every
    /// cross term must be the transpose of its mirror block to within
    /// [`SYMMETRY_TOLERANCE`] of the larger magnitude in the pair.
    pub fn validate(&self) -> Result<()> {
        self.validate_structure()?;
        self.validate_symmetry()
    }

    /// Check that every cross term is the transpose of its mirror block.
    fn validate_symmetry(&self) -> Result<()> {
        for (row_name, row) in &self.normal_matrix {
            for (col_name, block) in row.range::<String, _>((
                std::ops::Bound::Excluded(row_name),
                std::ops::Bound::Unbounded,
            )) {
                let Ok(mirror) = self.normal_matrix(col_name, row_name) else {
                    continue;
                };
                let scale = block
                    .iter()
                    .chain(mirror.iter())
                    .fold(0.0_f64, |m, x| m.max(x.abs()));
                let asymmetric = block
                    .iter()
                    .zip(mirror.t().iter())
                    .any(|(a, b)| !((a - b).abs() <= SYMMETRY_TOLERANCE * scale));
                if asymmetric {
                    return Err(NormalEqError::DimensionMismatch(format!(
                        "block ({}, {}) is not the transpose of block ({}, {})",
                        row_name, col_name, col_name, row_name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Check the shape invariants: squareness and block dimensions.
    fn validate_structure(&self) -> Result<()> {
        if !self.normal_matrix.keys().eq(self.data_vector.keys()) {
            return Err(NormalEqError::DimensionMismatch(
                "rows of the normal matrix and data vectors cover different parameters"
                    .to_string(),
            ));
        }
        for (row_name, row) in &self.normal_matrix {
            if !row.keys().eq(self.data_vector.keys()) {
                return Err(NormalEqError::DimensionMismatch(format!(
                    "row {} does not hold a block for every parameter",
                    row_name
                )));
            }
            let rows = self.dimension(row_name).unwrap_or(0);
            for (col_name, block) in row {
                let cols = self.dimension(col_name).unwrap_or(0);
                if block.dim() != (rows, cols) {
                    return Err(NormalEqError::DimensionMismatch(format!(
                        "block ({}, {}) is {}x{}, expected {}x{}",
                        row_name,
                        col_name,
                        block.nrows(),
                        block.ncols(),
                        rows,
                        cols
                    )));
                }
            }
        }
        Ok(())
    }

    fn debug_validate(&self) {
        if cfg!(debug_assertions) {
            if let Err(e) = self.validate_structure() {
                panic!("normal equations lost their structure: {}", e);
            }
        }
    }

    /// Check one row contribution against the known parameter dimensions.
    fn check_row<F>(
        name: &str,
        blocks: &BTreeMap<String, Array2<f64>>,
        data_vector: &Array1<f64>,
        dims: F,
    ) -> Result<()>
    where
        F: Fn(&str) -> Option<usize>,
    {
        let dim = data_vector.len();
        let diag = blocks.get(name).ok_or_else(|| {
            NormalEqError::DimensionMismatch(format!(
                "contribution to {} lacks its diagonal block",
                name
            ))
        })?;
        if diag.dim() != (dim, dim) {
            return Err(NormalEqError::DimensionMismatch(format!(
                "diagonal block of {} is {}x{} but its data vector has {} elements",
                name,
                diag.nrows(),
                diag.ncols(),
                dim
            )));
        }
        if let Some(known) = dims(name) {
            if known != dim {
                return Err(NormalEqError::DimensionMismatch(format!(
                    "parameter {} has {} elements, contribution has {}",
                    name, known, dim
                )));
            }
        }
        for (col, block) in blocks {
            if col == name {
                continue;
            }
            if let Some(col_dim) = dims(col) {
                if block.dim() != (dim, col_dim) {
                    return Err(NormalEqError::DimensionMismatch(format!(
                        "block ({}, {}) is {}x{}, expected {}x{}",
                        name,
                        col,
                        block.nrows(),
                        block.ncols(),
                        dim,
                        col_dim
                    )));
                }
            }
        }
        Ok(())
    }

    /// Insert a contribution that already passed `check_row`.
    fn insert_checked(
        &mut self,
        name: &str,
        blocks: &BTreeMap<String, Array2<f64>>,
        data_vector: &Array1<f64>,
    ) {
        if let Some(row) = self.normal_matrix.get_mut(name) {
            for (col, block) in row.iter_mut() {
                if let Some(incoming) = blocks.get(col) {
                    *block += incoming;
                }
            }
            if let Some(dv) = self.data_vector.get_mut(name) {
                *dv += data_vector;
            }
            return;
        }

        let dim = data_vector.len();
        trace!("inserting parameter {} with {} elements", name, dim);
        let mut new_row = BTreeMap::new();
        for (other, row) in self.normal_matrix.iter_mut() {
            let other_dim = self.data_vector.get(other).map_or(0, Array1::len);
            match blocks.get(other) {
                Some(block) => {
                    new_row.insert(other.clone(), block.clone());
                    row.insert(name.to_string(), block.t().to_owned());
                }
                None => {
                    new_row.insert(other.clone(), Array2::zeros((dim, other_dim)));
                    row.insert(name.to_string(), Array2::zeros((other_dim, dim)));
                }
            }
        }
        let diag = blocks
            .get(name)
            .cloned()
            .unwrap_or_else(|| Array2::zeros((dim, dim)));
        new_row.insert(name.to_string(), diag);
        self.normal_matrix.insert(name.to_string(), new_row);
        self.data_vector.insert(name.to_string(), data_vector.clone());
    }
}

impl sealed::Sealed for GenericNormalEquations {}

impl NormalEquations for GenericNormalEquations {
    fn normal_matrix(&self, row: &str, col: &str) -> Result<&Array2<f64>> {
        GenericNormalEquations::normal_matrix(self, row, col)
    }

    fn data_vector(&self, name: &str) -> Result<&Array1<f64>> {
        GenericNormalEquations::data_vector(self, name)
    }

    fn unknowns(&self) -> Vec<String> {
        GenericNormalEquations::unknowns(self)
    }

    fn reset(&mut self) {
        GenericNormalEquations::reset(self)
    }

    fn merge(&mut self, other: &dyn NormalEquations) -> Result<()> {
        match other.as_generic() {
            Some(generic) => self.merge_generic(generic),
            None => Err(NormalEqError::Incompatible(
                "generic normal equations can only merge generic normal equations".to_string(),
            )),
        }
    }

    fn as_generic(&self) -> Option<&GenericNormalEquations> {
        Some(self)
    }
}
