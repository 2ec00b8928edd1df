//! Price data loading and preparation
//!
//! Reads daily close prices from CSV files and prepares them for the
//! environment: optional min-max normalization and a chronological
//! train/evaluation split.

use std::fs::File;
use std::path::Path;

use tracing::info;

use crate::error::{Result, TraderError};

/// A chronological series of close prices
#[derive(Debug, Clone)]
pub struct PriceSeries {
    closes: Vec<f64>,
}

impl PriceSeries {
    /// Wrap an already loaded series
    pub fn from_closes(closes: Vec<f64>) -> Self {
        Self { closes }
    }

    /// Load close prices from a CSV file with a `Close` header column
    ///
    /// Rows are taken in file order, which is assumed chronological.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut reader = csv::Reader::from_reader(file);

        let close_idx = reader
            .headers()?
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("close"))
            .ok_or_else(|| {
                TraderError::Validation(format!(
                    "no Close column in {}",
                    path.display()
                ))
            })?;

        let mut closes = Vec::new();
        for record in reader.records() {
            let record = record?;
            let raw = record.get(close_idx).ok_or_else(|| {
                TraderError::Validation(format!(
                    "row {} has no Close field in {}",
                    closes.len() + 1,
                    path.display()
                ))
            })?;
            let close: f64 = raw.trim().parse().map_err(|_| {
                TraderError::Validation(format!(
                    "unparseable Close value {:?} at row {} in {}",
                    raw,
                    closes.len() + 1,
                    path.display()
                ))
            })?;
            closes.push(close);
        }

        info!(path = %path.display(), rows = closes.len(), "loaded price series");
        Ok(Self { closes })
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Min-max normalize into [0, 1]
    ///
    /// A constant series maps to all zeros rather than dividing by zero.
    pub fn normalized(&self) -> Self {
        let min = self.closes.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = self.closes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;

        let closes = if range > 0.0 {
            self.closes.iter().map(|c| (c - min) / range).collect()
        } else {
            vec![0.0; self.closes.len()]
        };
        Self { closes }
    }

    /// Split chronologically into training and evaluation series
    ///
    /// `ratio` is the training fraction and must lie strictly in (0, 1).
    pub fn split(&self, ratio: f64) -> Result<(Self, Self)> {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(TraderError::Validation(format!(
                "split ratio must be in (0, 1), got {ratio}"
            )));
        }

        let pivot = (self.closes.len() as f64 * ratio) as usize;
        let (train, eval) = self.closes.split_at(pivot);
        Ok((
            Self::from_closes(train.to_vec()),
            Self::from_closes(eval.to_vec()),
        ))
    }
}
