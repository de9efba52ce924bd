use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use candle_core::{bail, Device, Result as CandleResult, Tensor};
use network::model::NUMERIC_FEATURES;
use network::{Features, Vocabulary};

pub const CATEGORY_COLUMN: &str = "cat_consec";
pub const SKU_COLUMN: &str = "sku";
pub const TARGET_COLUMN: &str = "quantity";

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// One already-encoded CSV split, held column-wise.
#[derive(Clone, Debug, Default)]
pub struct Split {
    pub categories: Vec<u32>,
    pub skus: Vec<u32>,
    /// Row-major, `numeric_columns.len()` values per row.
    pub numeric: Vec<f32>,
    pub quantity: Vec<f32>,
    pub numeric_columns: Vec<String>,
}

impl Split {
    pub fn load(path: &Path) -> io::Result<Self> {
        let file = File::open(path)
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))?;
        let split = Self::read(BufReader::new(file))?;
        log::info!("Loaded {} rows from {:?}", split.len(), path);
        Ok(split)
    }

    /// Reads a split with a header row. `cat_consec`, `sku` and `quantity`
    /// are located by name; every other column is a numeric feature.
    pub fn read<R: BufRead>(mut reader: R) -> io::Result<Self> {
        let mut header_line = String::new();
        if reader.read_line(&mut header_line)? == 0 {
            return Err(invalid("Missing header row".to_string()));
        }
        let header: Vec<&str> = header_line.trim().split(',').map(str::trim).collect();

        let column = |name: &str| {
            header
                .iter()
                .position(|&h| h == name)
                .ok_or_else(|| invalid(format!("Missing {} column", name)))
        };
        let category_idx = column(CATEGORY_COLUMN)?;
        let sku_idx = column(SKU_COLUMN)?;
        let target_idx = column(TARGET_COLUMN)?;

        let numeric_idx: Vec<usize> = (0..header.len())
            .filter(|i| ![category_idx, sku_idx, target_idx].contains(i))
            .collect();

        let mut split = Self {
            numeric_columns: numeric_idx.iter().map(|&i| header[i].to_string()).collect(),
            ..Self::default()
        };

        for (line_no, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != header.len() {
                return Err(invalid(format!(
                    "Row {} has {} fields, expected {}",
                    line_no + 2,
                    fields.len(),
                    header.len()
                )));
            }

            split.categories.push(parse_code(fields[category_idx])?);
            split.skus.push(parse_code(fields[sku_idx])?);
            split.quantity.push(parse_value(fields[target_idx])?);
            for &i in &numeric_idx {
                split.numeric.push(parse_value(fields[i])?);
            }
        }

        Ok(split)
    }

    pub fn len(&self) -> usize {
        self.quantity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantity.is_empty()
    }

    /// Uploads the split as model inputs and a `(n, 1)` target column.
    ///
    /// Fails unless every row carries exactly `NUMERIC_FEATURES` numeric values.
    pub fn to_tensors(&self, device: &Device) -> CandleResult<TensorSplit> {
        let n = self.len();
        if self.numeric.len() != n * NUMERIC_FEATURES {
            bail!(
                "numeric block has {} values for {} rows, expected {} per row",
                self.numeric.len(),
                n,
                NUMERIC_FEATURES
            );
        }
        let features = Features {
            categories: Tensor::from_vec(self.categories.clone(), (n, 1), device)?,
            skus: Tensor::from_vec(self.skus.clone(), (n, 1), device)?,
            numeric: Tensor::from_vec(self.numeric.clone(), (n, NUMERIC_FEATURES), device)?,
        };
        let targets = Tensor::from_vec(self.quantity.clone(), (n, 1), device)?;
        Ok(TensorSplit { features, targets })
    }
}

fn parse_value(field: &str) -> io::Result<f32> {
    field
        .parse()
        .map_err(|_| invalid(format!("{:?} is not a valid number", field)))
}

// Encoders sometimes write codes as floats ("3.0").
fn parse_code(field: &str) -> io::Result<u32> {
    if let Ok(code) = field.parse::<u32>() {
        return Ok(code);
    }
    match field.parse::<f64>() {
        Ok(v) if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => Ok(v as u32),
        _ => Err(invalid(format!("{:?} is not a valid category code", field))),
    }
}

/// A split living on the training device.
#[derive(Clone, Debug)]
pub struct TensorSplit {
    pub features: Features,
    pub targets: Tensor,
}

impl TensorSplit {
    pub fn len(&self) -> CandleResult<usize> {
        self.targets.dim(0)
    }

    /// Gathers the rows listed in `ids`.
    pub fn batch(&self, ids: &[u32]) -> CandleResult<(Features, Tensor)> {
        let ids = Tensor::from_slice(ids, ids.len(), self.targets.device())?;
        Ok((
            self.features.index_select(&ids)?,
            self.targets.index_select(&ids, 0)?,
        ))
    }
}

/// The fixed train, validation and test splits.
#[derive(Clone, Debug)]
pub struct Datasets {
    pub train: Split,
    pub val: Split,
    pub test: Split,
}

impl Datasets {
    pub fn load(dir: &Path) -> io::Result<Self> {
        let datasets = Self {
            train: Split::load(&dir.join("train.csv"))?,
            val: Split::load(&dir.join("val.csv"))?,
            test: Split::load(&dir.join("test.csv"))?,
        };

        if datasets.train.is_empty() {
            return Err(invalid(format!("No training rows in {:?}", dir)));
        }
        for (name, split) in ["train", "val", "test"].into_iter().zip(datasets.splits()) {
            if split.numeric_columns.len() != NUMERIC_FEATURES {
                return Err(invalid(format!(
                    "Expected {} numeric columns in {}, found {:?}",
                    NUMERIC_FEATURES, name, split.numeric_columns
                )));
            }
        }

        let gaps = datasets.non_consecutive_columns();
        if gaps.is_empty() {
            log::info!("Category and SKU codes are consecutive");
        }
        for column in gaps {
            log::warn!("{} codes are not consecutive from 0", column);
        }

        Ok(datasets)
    }

    /// Code columns whose distinct values are not exactly `0..n`.
    pub fn non_consecutive_columns(&self) -> Vec<&'static str> {
        let mut columns = Vec::new();
        if !is_consecutive(self.all_categories()) {
            columns.push(CATEGORY_COLUMN);
        }
        if !is_consecutive(self.all_skus()) {
            columns.push(SKU_COLUMN);
        }
        columns
    }

    fn splits(&self) -> [&Split; 3] {
        [&self.train, &self.val, &self.test]
    }

    fn all_categories(&self) -> impl Iterator<Item = u32> + '_ {
        self.splits()
            .into_iter()
            .flat_map(|s| s.categories.iter().copied())
    }

    fn all_skus(&self) -> impl Iterator<Item = u32> + '_ {
        self.splits()
            .into_iter()
            .flat_map(|s| s.skus.iter().copied())
    }

    /// Distinct categories and SKUs across all three splits.
    pub fn vocabulary(&self) -> Vocabulary {
        let categories: BTreeSet<u32> = self.all_categories().collect();
        let skus: BTreeSet<u32> = self.all_skus().collect();
        Vocabulary::new(categories.len(), skus.len())
    }

    pub fn to_tensors(&self, device: &Device) -> CandleResult<DeviceDatasets> {
        Ok(DeviceDatasets {
            train: self.train.to_tensors(device)?,
            val: self.val.to_tensors(device)?,
            test: self.test.to_tensors(device)?,
            vocabulary: self.vocabulary(),
        })
    }
}

/// All splits uploaded once and shared by every run.
#[derive(Clone, Debug)]
pub struct DeviceDatasets {
    pub train: TensorSplit,
    pub val: TensorSplit,
    pub test: TensorSplit,
    pub vocabulary: Vocabulary,
}

/// True when the distinct codes are exactly `0..n`.
pub fn is_consecutive<I: IntoIterator<Item = u32>>(codes: I) -> bool {
    let distinct: BTreeSet<u32> = codes.into_iter().collect();
    distinct
        .iter()
        .enumerate()
        .all(|(i, &code)| code as usize == i)
}
