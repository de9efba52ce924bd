use std::fmt;

use candle_core::{Device, Result, Tensor};
use candle_nn::{embedding, Embedding, Linear, Module, ModuleT, VarMap};
use hyperparams::{Activation, HyperparameterConfiguration, InitializerName};

use crate::context::BuildContext;
use crate::hidden::HiddenStack;
use crate::init::{resolve_initializer, InitializerChoice};

pub const CATEGORY_EMBEDDING_SIZE: usize = 16;
pub const SKU_EMBEDDING_SIZE: usize = 50;
pub const NUMERIC_FEATURES: usize = 3;

/// Width of the concatenated input that feeds the hidden stack.
pub const INPUT_WIDTH: usize = CATEGORY_EMBEDDING_SIZE + SKU_EMBEDDING_SIZE + NUMERIC_FEATURES;

/// Distinct categorical values seen in the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vocabulary {
    pub categories: usize,
    pub skus: usize,
}

impl Vocabulary {
    pub fn new(categories: usize, skus: usize) -> Self {
        Self { categories, skus }
    }

    /// Rows of the category embedding table; one spare row past the last code.
    pub fn category_rows(&self) -> usize {
        self.categories + 1
    }

    pub fn sku_rows(&self) -> usize {
        self.skus
    }
}

/// Everything needed to construct a [`QuantityModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub vocabulary: Vocabulary,
    pub hidden_layers: Vec<usize>,
    pub activation: Activation,
    pub batch_norm: bool,
    pub initializer: Option<InitializerName>,
}

impl ModelSpec {
    pub fn from_config(config: &HyperparameterConfiguration, vocabulary: Vocabulary) -> Self {
        Self {
            vocabulary,
            hidden_layers: config.hidden_layers.clone(),
            activation: config.activation,
            batch_norm: config.batch_norm,
            initializer: Some(config.initializer),
        }
    }

    /// Per-layer output widths and parameter counts, in graph order.
    pub fn summary(&self) -> ModelSummary {
        let mut layers = vec![
            LayerSummary::new(
                "embedding_cat",
                CATEGORY_EMBEDDING_SIZE,
                self.vocabulary.category_rows() * CATEGORY_EMBEDDING_SIZE,
            ),
            LayerSummary::new(
                "embedding_sku",
                SKU_EMBEDDING_SIZE,
                self.vocabulary.sku_rows() * SKU_EMBEDDING_SIZE,
            ),
            LayerSummary::new("concatenation", INPUT_WIDTH, 0),
        ];

        let mut in_dim = INPUT_WIDTH;
        for (i, &width) in self.hidden_layers.iter().enumerate() {
            layers.push(LayerSummary::new(
                &format!("hidden{}", i),
                width,
                in_dim * width + width,
            ));
            if self.batch_norm {
                // scale, shift, running mean and running variance
                layers.push(LayerSummary::new(&format!("norm{}", i), width, 4 * width));
            }
            in_dim = width;
        }

        layers.push(LayerSummary::new("out", 1, in_dim + 1));
        ModelSummary { layers }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSummary {
    pub name: String,
    pub output_width: usize,
    pub parameters: usize,
}

impl LayerSummary {
    fn new(name: &str, output_width: usize, parameters: usize) -> Self {
        Self {
            name: name.to_string(),
            output_width,
            parameters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSummary {
    pub layers: Vec<LayerSummary>,
}

impl ModelSummary {
    pub fn total_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.parameters).sum()
    }
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<16}{:>8}{:>12}", "layer", "width", "params")?;
        for layer in &self.layers {
            writeln!(
                f,
                "{:<16}{:>8}{:>12}",
                layer.name, layer.output_width, layer.parameters
            )?;
        }
        write!(f, "total parameters: {}", self.total_parameters())
    }
}

/// Model inputs for a batch of rows.
#[derive(Debug, Clone)]
pub struct Features {
    /// `(n, 1)` u32 category codes.
    pub categories: Tensor,
    /// `(n, 1)` u32 SKU codes.
    pub skus: Tensor,
    /// `(n, NUMERIC_FEATURES)` f32 values.
    pub numeric: Tensor,
}

impl Features {
    pub fn len(&self) -> Result<usize> {
        self.numeric.dim(0)
    }

    /// Gathers the rows listed in `ids` (a u32 tensor).
    pub fn index_select(&self, ids: &Tensor) -> Result<Self> {
        Ok(Self {
            categories: self.categories.index_select(ids, 0)?,
            skus: self.skus.index_select(ids, 0)?,
            numeric: self.numeric.index_select(ids, 0)?,
        })
    }
}

/// Embeddings, hidden stack and a scalar regression head.
pub struct QuantityModel {
    category_embedding: Embedding,
    sku_embedding: Embedding,
    hidden: HiddenStack,
    output: Linear,
}

impl QuantityModel {
    pub fn new(ctx: &BuildContext, spec: &ModelSpec) -> Result<Self> {
        let resolved = resolve_initializer(spec.activation, spec.initializer);
        let vb = ctx.var_builder();

        let category_embedding = embedding(
            spec.vocabulary.category_rows(),
            CATEGORY_EMBEDDING_SIZE,
            vb.pp("embedding_cat"),
        )?;
        let sku_embedding = embedding(
            spec.vocabulary.sku_rows(),
            SKU_EMBEDDING_SIZE,
            vb.pp("embedding_sku"),
        )?;

        let hidden = HiddenStack::new(
            ctx,
            INPUT_WIDTH,
            &spec.hidden_layers,
            &resolved.choice,
            spec.batch_norm,
        )?;
        let output = ctx.dense(
            "out",
            hidden.output_width(),
            1,
            &InitializerChoice::LibraryDefault,
        )?;

        Ok(Self {
            category_embedding,
            sku_embedding,
            hidden,
            output,
        })
    }

    pub fn hidden(&self) -> &HiddenStack {
        &self.hidden
    }

    /// Predicts one quantity per row, shaped `(n, 1)`.
    pub fn forward_t(&self, x: &Features, train: bool) -> Result<Tensor> {
        let categories = self.category_embedding.forward(&x.categories)?.flatten_from(1)?;
        let skus = self.sku_embedding.forward(&x.skus)?.flatten_from(1)?;
        let inputs = Tensor::cat(&[&categories, &skus, &x.numeric], 1)?;

        self.hidden.forward_t(&inputs, train)?.apply(&self.output)
    }
}

/// Builds a model in its own [`BuildContext`] and hands back its variables.
pub fn create_model(spec: &ModelSpec, device: &Device) -> Result<(QuantityModel, VarMap)> {
    let ctx = BuildContext::new(device);
    let model = QuantityModel::new(&ctx, spec)?;
    log::debug!(
        "Built model with {} hidden layers and {} parameters",
        model.hidden().len(),
        ctx.parameter_count()
    );
    Ok((model, ctx.into_varmap()))
}
