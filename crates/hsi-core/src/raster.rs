use serde::{Deserialize, Serialize};

use crate::error::{HsiError, Result};

/// A 2D raster grid storing cell values as f32, row-major.
/// Missing cells carry `f32::NAN`; cell geometry and coordinates use f64.
/// Row 0 is the southern edge (min_y), matching the on-disk JSON format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raster {
    /// Row-major cell values. NaN = no data, stored as `null` in JSON
    /// (serde_json writes NaN as null but will not read it back into f32).
    #[serde(with = "nan_as_null")]
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    /// Coordinates of the grid's south-west corner.
    pub min_x: f64,
    pub min_y: f64,
    /// Cell edge lengths in map units (metres or feet, caller's choice).
    pub cell_width: f64,
    pub cell_height: f64,
}

impl Raster {
    /// Create a new Raster filled with the given value.
    pub fn new(
        width: usize,
        height: usize,
        min_x: f64,
        min_y: f64,
        cell_width: f64,
        cell_height: f64,
        fill: f32,
    ) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            min_x,
            min_y,
            cell_width,
            cell_height,
        }
    }

    /// Create a Raster with unit cells at the origin, filled with `fill`.
    pub fn filled(width: usize, height: usize, fill: f32) -> Self {
        Self::new(width, height, 0.0, 0.0, 1.0, 1.0, fill)
    }

    /// Build a Raster with unit cells from explicit row-major values.
    pub fn from_values(width: usize, height: usize, values: Vec<f32>) -> Self {
        assert_eq!(values.len(), width * height, "value count must match grid size");
        Self {
            data: values,
            width,
            height,
            min_x: 0.0,
            min_y: 0.0,
            cell_width: 1.0,
            cell_height: 1.0,
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    /// Area of a single cell in squared map units.
    pub fn cell_area(&self) -> f64 {
        self.cell_width * self.cell_height
    }

    /// Map-space coordinates of the centre of cell (row, col).
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.min_x + (col as f64 + 0.5) * self.cell_width,
            self.min_y + (row as f64 + 0.5) * self.cell_height,
        )
    }

    /// Same grid dimensions. Cell-wise algebra requires this, nothing more;
    /// coordinate alignment is the data producer's guarantee.
    pub fn same_shape(&self, other: &Raster) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Iterator over all non-missing cell values.
    pub fn valid_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().copied().filter(|v| !v.is_nan())
    }

    /// Cell-wise map over a single grid. Geometry is carried over unchanged.
    /// The closure sees NaN for missing cells and is responsible for
    /// propagating it (arithmetic on NaN does so automatically).
    pub fn map<F>(&self, f: F) -> Raster
    where
        F: Fn(f32) -> f32,
    {
        Raster {
            data: self.data.iter().map(|&v| f(v)).collect(),
            ..self.clone_geometry()
        }
    }

    /// Cell-wise map over two aligned grids.
    pub fn zip_map<F>(&self, other: &Raster, f: F) -> Result<Raster>
    where
        F: Fn(f32, f32) -> f32,
    {
        if !self.same_shape(other) {
            return Err(HsiError::computation(format!(
                "grid shape mismatch: {}x{} vs {}x{}",
                self.width, self.height, other.width, other.height
            )));
        }
        Ok(Raster {
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
            ..self.clone_geometry()
        })
    }

    /// Cell-wise map over five aligned grids (the widest rule in the HSI
    /// pipeline: morph-unit HSI plus the four auxiliary suitability layers).
    pub fn zip_map5<F>(
        &self,
        b: &Raster,
        c: &Raster,
        d: &Raster,
        e: &Raster,
        f: F,
    ) -> Result<Raster>
    where
        F: Fn(f32, f32, f32, f32, f32) -> f32,
    {
        for (i, other) in [b, c, d, e].into_iter().enumerate() {
            if !self.same_shape(other) {
                return Err(HsiError::computation(format!(
                    "grid shape mismatch with input {}: {}x{} vs {}x{}",
                    i + 2,
                    self.width,
                    self.height,
                    other.width,
                    other.height
                )));
            }
        }
        let data = (0..self.data.len())
            .map(|i| f(self.data[i], b.data[i], c.data[i], d.data[i], e.data[i]))
            .collect();
        Ok(Raster {
            data,
            ..self.clone_geometry()
        })
    }

    /// A geometry-only copy with empty data, used by the map combinators.
    fn clone_geometry(&self) -> Raster {
        Raster {
            data: Vec::new(),
            width: self.width,
            height: self.height,
            min_x: self.min_x,
            min_y: self.min_y,
            cell_width: self.cell_width,
            cell_height: self.cell_height,
        }
    }
}

mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[f32], ser: S) -> Result<S::Ok, S::Error> {
        let cells: Vec<Option<f32>> = data
            .iter()
            .map(|&v| if v.is_nan() { None } else { Some(v) })
            .collect();
        cells.serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<f32>, D::Error> {
        let cells = Vec::<Option<f32>>::deserialize(de)?;
        Ok(cells.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
    }
}
