//! Dense matrix and spatial tensor utilities.
//!
//! `Matrix` is a row-major 2D buffer of `f64` used for every layer input and
//! output (batch dimension × feature dimension). `Tensor` is the 3D
//! (channels × height × width) buffer used only by the convolutional layer's
//! raw kernel. Every operation returns a new owned allocation unless it is
//! explicitly documented as in-place; dimension mismatches are fatal.

/// Row-major dense matrix of `f64` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Create a matrix from a flat row-major buffer.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "matrix data length mismatch: expected {}, got {}",
            rows * cols,
            data.len()
        );
        Self { rows, cols, data }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Read the element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Write the element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Flat row-major view of the data.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable flat row-major view of the data.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Matrix product `self · other`.
    ///
    /// # Panics
    ///
    /// Panics if `self.cols != other.rows`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        assert_eq!(
            self.cols, other.rows,
            "matrix multiplication dimension mismatch: {}x{} · {}x{}",
            self.rows, self.cols, other.rows, other.cols
        );
        let mut result = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for j in 0..other.cols {
                let mut sum = 0.0;
                for k in 0..self.cols {
                    sum += self.data[i * self.cols + k] * other.data[k * other.cols + j];
                }
                result.data[i * other.cols + j] = sum;
            }
        }
        result
    }

    /// Transposed copy.
    pub fn transpose(&self) -> Matrix {
        let mut result = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                result.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        result
    }

    /// Element-wise sum `self + other`.
    ///
    /// # Panics
    ///
    /// Panics if the shapes differ.
    pub fn add(&self, other: &Matrix) -> Matrix {
        assert!(
            self.rows == other.rows && self.cols == other.cols,
            "matrix addition dimension mismatch: {}x{} + {}x{}",
            self.rows,
            self.cols,
            other.rows,
            other.cols
        );
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a + b)
            .collect();
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        }
    }

    /// Set every element to zero (modifies in place).
    pub fn zero(&mut self) {
        for value in &mut self.data {
            *value = 0.0;
        }
    }
}

/// Spatial tensor: channels × height × width, channel-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f64>,
}

impl Tensor {
    /// Create a zero-filled tensor.
    pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
            data: vec![0.0; channels * height * width],
        }
    }

    /// Create a tensor from a flat channel-major buffer.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != channels * height * width`.
    pub fn from_vec(channels: usize, height: usize, width: usize, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            channels * height * width,
            "tensor data length mismatch: expected {}, got {}",
            channels * height * width,
            data.len()
        );
        Self {
            channels,
            height,
            width,
            data,
        }
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Spatial height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Spatial width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Read the element at (channel, row, col).
    pub fn get(&self, channel: usize, row: usize, col: usize) -> f64 {
        self.data[channel * self.height * self.width + row * self.width + col]
    }

    /// Write the element at (channel, row, col).
    pub fn set(&mut self, channel: usize, row: usize, col: usize, value: f64) {
        self.data[channel * self.height * self.width + row * self.width + col] = value;
    }

    /// Flat channel-major view of the data.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply() {
        let a = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = Matrix::from_vec(3, 2, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        let c = a.multiply(&b);

        assert_eq!(c.rows(), 2);
        assert_eq!(c.cols(), 2);
        assert_eq!(c.get(0, 0), 58.0);
        assert_eq!(c.get(0, 1), 64.0);
        assert_eq!(c.get(1, 0), 139.0);
        assert_eq!(c.get(1, 1), 154.0);
    }

    #[test]
    #[should_panic(expected = "matrix multiplication dimension mismatch")]
    fn test_multiply_mismatch() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 3);
        let _ = a.multiply(&b);
    }

    #[test]
    fn test_transpose() {
        let a = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let t = a.transpose();

        assert_eq!(t.rows(), 3);
        assert_eq!(t.cols(), 2);
        assert_eq!(t.get(0, 1), 4.0);
        assert_eq!(t.get(2, 0), 3.0);
        // Double transpose round-trips.
        assert_eq!(t.transpose(), a);
    }

    #[test]
    fn test_add_and_zero() {
        let a = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let b = Matrix::from_vec(2, 2, vec![0.5, 0.5, 0.5, 0.5]);
        let mut c = a.add(&b);

        assert_eq!(c.get(1, 1), 4.5);
        c.zero();
        assert!(c.as_slice().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_tensor_indexing() {
        let mut t = Tensor::zeros(2, 3, 4);
        t.set(1, 2, 3, 7.0);
        assert_eq!(t.get(1, 2, 3), 7.0);
        assert_eq!(t.get(0, 0, 0), 0.0);
        assert_eq!(t.as_slice().len(), 24);
    }
}
