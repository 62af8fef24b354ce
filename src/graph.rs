//! Explicit model graphs for hierarchical Gaussian models.
//!
//! A model is assembled with a [`ModelBuilder`] that hands out [`NodeId`]s for
//! every variable. Nodes can only refer to nodes that were created before
//! them, so the insertion order is a topological order of the graph. There is
//! no implicit model context: each [`Model`] owns its nodes and any number of
//! models can exist side by side.
//!
//! Free variables with positive support are sampled on the log scale, the
//! log-Jacobian of that transformation is part of the density.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use anyhow::{bail, Context};
use log::{debug, warn};
use rand::Rng;
use thiserror::Error;

use crate::distributions::{DistributionError, Family};
use crate::logp::{CpuLogpFunc, LogpError};
use crate::transform::{NonCenteredGaussian, Operand, ScaleCheck, TransformError, TransformSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A parameter of a distribution or transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Input {
    Const(f64),
    Node(NodeId),
}

impl From<f64> for Input {
    fn from(val: f64) -> Self {
        Input::Const(val)
    }
}

impl From<NodeId> for Input {
    fn from(node: NodeId) -> Self {
        Input::Node(node)
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("a variable named `{0}` already exists")]
    DuplicateName(String),
    #[error("node {0:?} does not belong to this model")]
    UnknownNode(NodeId),
    #[error("the model has no variable named `{0}`")]
    UnknownName(String),
    #[error("`{name}` expects length 1 or {expected}, found {found}")]
    Shape {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("group index {index} of `{name}` is out of range for {len} elements")]
    GroupIndex {
        name: String,
        index: usize,
        len: usize,
    },
    #[error("expected a position of length {expected}, found {found}")]
    Dimension { expected: usize, found: usize },
    #[error("no value for `{0}`")]
    MissingValue(String),
    #[error("invalid value for `{name}`: {reason}")]
    InvalidValue { name: String, reason: String },
    #[error("could not evaluate the distribution of `{name}`")]
    Distribution {
        name: String,
        #[source]
        source: DistributionError,
    },
    #[error("could not compute the non-centered variable `{name}`")]
    Transform {
        name: String,
        #[source]
        source: TransformError,
    },
}

impl LogpError for ModelError {
    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ModelError::Distribution { .. } | ModelError::Transform { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Clone, Copy)]
pub struct ModelSettings {
    /// Scale validation of non-centered nodes.
    pub scale_check: ScaleCheck,
    /// Initial points are drawn uniformly from `[-init_jitter, init_jitter)`
    /// in the unconstrained space.
    pub init_jitter: f64,
    /// Number of initial points tried before giving up.
    pub init_attempts: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            scale_check: ScaleCheck::Strict,
            init_jitter: 2f64,
            init_attempts: 100,
        }
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Data(Box<[f64]>),
    Free {
        offset: usize,
        family: Family,
        params: [Input; 2],
    },
    NonCentered {
        raw: NodeId,
        loc: Input,
        scale: Input,
    },
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    len: usize,
    value_offset: usize,
    kind: NodeKind,
}

impl Node {
    fn values(&self) -> Range<usize> {
        self.value_offset..self.value_offset + self.len
    }
}

/// Normal likelihood of observed data.
#[derive(Debug, Clone)]
struct Observed {
    name: String,
    mu: Input,
    sigma: Input,
    data: Box<[f64]>,
    group: Option<Box<[usize]>>,
}

#[derive(Debug, Default)]
pub struct ModelBuilder {
    nodes: Vec<Node>,
    likelihoods: Vec<Observed>,
    names: HashSet<String>,
    dim: usize,
    n_values: usize,
    settings: ModelSettings,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: ModelSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// A constant vector, for example known measurement errors.
    pub fn data(&mut self, name: &str, values: impl Into<Vec<f64>>) -> Result<NodeId> {
        self.check_name(name)?;
        let values: Box<[f64]> = values.into().into();
        if let Some(val) = values.iter().find(|val| !val.is_finite()) {
            return Err(ModelError::InvalidValue {
                name: name.to_string(),
                reason: format!("data contains non-finite value {}", val),
            });
        }
        let len = values.len();
        Ok(self.push_node(name, len, NodeKind::Data(values)))
    }

    /// A free variable `name ~ N(loc, scale)` in the centered parametrization.
    pub fn normal(
        &mut self,
        name: &str,
        loc: impl Into<Input>,
        scale: impl Into<Input>,
        len: usize,
    ) -> Result<NodeId> {
        self.free(name, Family::Normal, [loc.into(), scale.into()], len)
    }

    pub fn half_normal(&mut self, name: &str, scale: impl Into<Input>, len: usize) -> Result<NodeId> {
        self.free(name, Family::HalfNormal, [scale.into(), Input::Const(0f64)], len)
    }

    pub fn exponential(&mut self, name: &str, rate: impl Into<Input>, len: usize) -> Result<NodeId> {
        self.free(name, Family::Exponential, [rate.into(), Input::Const(0f64)], len)
    }

    pub fn half_cauchy(&mut self, name: &str, scale: impl Into<Input>, len: usize) -> Result<NodeId> {
        self.free(name, Family::HalfCauchy, [scale.into(), Input::Const(0f64)], len)
    }

    /// A variable `name ~ N(loc, scale)` in the non-centered parametrization.
    ///
    /// This adds a free standard normal variable `{name}_raw` and a
    /// deterministic node `name = {name}_raw * scale + loc`. The returned id
    /// refers to the deterministic node.
    pub fn non_centered_normal(
        &mut self,
        name: &str,
        loc: impl Into<Input>,
        scale: impl Into<Input>,
        len: usize,
    ) -> Result<NodeId> {
        let loc = loc.into();
        let scale = scale.into();
        let raw_name = format!("{}_raw", name);

        self.check_name(name)?;
        self.check_name(&raw_name)?;
        self.check_input(name, loc, len)?;
        self.check_input(name, scale, len)?;
        if let Input::Const(scale) = scale {
            NonCenteredGaussian::new(self.transform_settings())
                .transform_scalar(0f64, 0f64, scale)
                .map_err(|source| ModelError::Transform {
                    name: name.to_string(),
                    source,
                })?;
        }

        let raw = self.free(
            &raw_name,
            Family::Normal,
            [Input::Const(0f64), Input::Const(1f64)],
            len,
        )?;
        Ok(self.push_node(name, len, NodeKind::NonCentered { raw, loc, scale }))
    }

    /// Observed data `data[i] ~ N(mu[group[i]], sigma[i])`.
    ///
    /// Without `group` the mean is indexed like the data.
    pub fn observed_normal(
        &mut self,
        name: &str,
        mu: impl Into<Input>,
        sigma: impl Into<Input>,
        data: impl Into<Vec<f64>>,
        group: Option<Vec<usize>>,
    ) -> Result<()> {
        let mu = mu.into();
        let sigma = sigma.into();
        let data: Box<[f64]> = data.into().into();
        let n = data.len();

        self.check_name(name)?;
        if let Some(val) = data.iter().find(|val| !val.is_finite()) {
            return Err(ModelError::InvalidValue {
                name: name.to_string(),
                reason: format!("observed non-finite value {}", val),
            });
        }

        match &group {
            Some(group) => {
                if group.len() != n {
                    return Err(ModelError::Shape {
                        name: name.to_string(),
                        expected: n,
                        found: group.len(),
                    });
                }
                let len = self.input_len(mu)?;
                if let Some(&index) = group.iter().find(|&&index| index >= len) {
                    return Err(ModelError::GroupIndex {
                        name: name.to_string(),
                        index,
                        len,
                    });
                }
            }
            None => self.check_input(name, mu, n)?,
        }
        self.check_input(name, sigma, n)?;
        self.check_const_params(name, Family::Normal, [mu, sigma])?;

        self.names.insert(name.to_string());
        self.likelihoods.push(Observed {
            name: name.to_string(),
            mu,
            sigma,
            data,
            group: group.map(|group| group.into()),
        });
        Ok(())
    }

    pub fn build(self) -> Model {
        debug!(
            "Built model with {} nodes, {} likelihood terms and {} free parameters",
            self.nodes.len(),
            self.likelihoods.len(),
            self.dim
        );
        Model {
            transform: NonCenteredGaussian::new(self.transform_settings()),
            nodes: self.nodes,
            likelihoods: self.likelihoods,
            dim: self.dim,
            n_values: self.n_values,
            settings: self.settings,
        }
    }

    fn transform_settings(&self) -> TransformSettings {
        TransformSettings {
            scale_check: self.settings.scale_check,
        }
    }

    fn free(&mut self, name: &str, family: Family, params: [Input; 2], len: usize) -> Result<NodeId> {
        self.check_name(name)?;
        for &input in params.iter().take(family.param_names().len()) {
            self.check_input(name, input, len)?;
        }
        self.check_const_params(name, family, params)?;

        let offset = self.dim;
        self.dim += len;
        Ok(self.push_node(
            name,
            len,
            NodeKind::Free {
                offset,
                family,
                params,
            },
        ))
    }

    fn push_node(&mut self, name: &str, len: usize, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.names.insert(name.to_string());
        self.nodes.push(Node {
            name: name.to_string(),
            len,
            value_offset: self.n_values,
            kind,
        });
        self.n_values += len;
        id
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if self.names.contains(name) {
            return Err(ModelError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn input_len(&self, input: Input) -> Result<usize> {
        match input {
            Input::Const(_) => Ok(1),
            Input::Node(id) => self
                .nodes
                .get(id.0)
                .map(|node| node.len)
                .ok_or(ModelError::UnknownNode(id)),
        }
    }

    fn check_input(&self, name: &str, input: Input, len: usize) -> Result<()> {
        let found = self.input_len(input)?;
        if found != 1 && found != len {
            return Err(ModelError::Shape {
                name: name.to_string(),
                expected: len,
                found,
            });
        }
        Ok(())
    }

    /// Reject constant parameters that can never be valid.
    fn check_const_params(&self, name: &str, family: Family, params: [Input; 2]) -> Result<()> {
        let probe = params.map(|input| match input {
            Input::Const(val) => val,
            Input::Node(_) => 1f64,
        });
        let value = if family.is_positive() { 1f64 } else { 0f64 };
        family
            .logp(value, probe)
            .map(|_| ())
            .map_err(|source| ModelError::Distribution {
                name: name.to_string(),
                source,
            })
    }
}

/// A hierarchical model.
///
/// The model is immutable and can be shared between threads, evaluation
/// happens through a [`ModelDensity`] that holds the scratch space.
#[derive(Debug, Clone)]
pub struct Model {
    nodes: Vec<Node>,
    likelihoods: Vec<Observed>,
    dim: usize,
    n_values: usize,
    settings: ModelSettings,
    transform: NonCenteredGaussian,
}

impl Model {
    /// Number of unconstrained parameters.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Names of the unconstrained parameters, in position order.
    ///
    /// Log transformed variables are called `{name}_log__`, vector valued
    /// variables get an index suffix.
    pub fn parameter_names(&self) -> Vec<String> {
        let mut names = vec![String::new(); self.dim];
        for node in self.nodes.iter() {
            let NodeKind::Free { offset, family, .. } = node.kind else {
                continue;
            };
            let base = if family.is_positive() {
                format!("{}_log__", node.name)
            } else {
                node.name.clone()
            };
            for i in 0..node.len {
                names[offset + i] = if node.len == 1 {
                    base.clone()
                } else {
                    format!("{}[{}]", base, i)
                };
            }
        }
        names
    }

    /// Names of all variables that show up in an expanded draw.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(|node| !matches!(node.kind, NodeKind::Data(_)))
            .map(|node| node.name.as_str())
    }

    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(NodeId)
    }

    /// Length of the variable `name`.
    pub fn len_of(&self, name: &str) -> Result<usize> {
        self.node(name)
            .map(|id| self.nodes[id.0].len)
            .ok_or_else(|| ModelError::UnknownName(name.to_string()))
    }

    pub fn density(&self) -> ModelDensity<'_> {
        ModelDensity {
            model: self,
            values: vec![0f64; self.n_values],
            adjoints: vec![0f64; self.n_values],
        }
    }

    /// Draw an initial position with a finite density.
    ///
    /// A jitter of zero tries the origin of the unconstrained space only.
    pub fn init_position<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        position: &mut [f64],
    ) -> anyhow::Result<()> {
        self.check_dim(position.len())?;
        let jitter = self.settings.init_jitter;
        if !(jitter >= 0f64 && jitter.is_finite()) {
            bail!("init_jitter must be finite and non-negative, found {}", jitter);
        }
        let mut density = self.density();
        let mut gradient = vec![0f64; self.dim];
        let mut error = None;

        for attempt in 0..self.settings.init_attempts.max(1) {
            position.iter_mut().for_each(|x| {
                *x = if jitter > 0f64 {
                    rng.random_range(-jitter..jitter)
                } else {
                    0f64
                }
            });
            match density.logp(position, &mut gradient) {
                Ok(logp) if logp.is_finite() && gradient.iter().all(|g| g.is_finite()) => {
                    return Ok(())
                }
                Ok(logp) => {
                    warn!("Initial point {} has non-finite density {}", attempt, logp);
                }
                Err(err) => {
                    warn!("Initial point {} failed: {}", attempt, err);
                    error = Some(err);
                }
            }
        }

        match error {
            Some(err) => Err(err).context("All initialization points failed"),
            None => bail!("All initialization points have a non-finite density"),
        }
    }

    /// Values of all variables on their constrained scale, including the
    /// deterministic non-centered variables.
    pub fn expand_draw(&self, position: &[f64]) -> Result<HashMap<String, Vec<f64>>> {
        self.check_dim(position.len())?;
        let mut values = vec![0f64; self.n_values];
        for node in self.nodes.iter() {
            self.compute_value(node, position, &mut values)?;
        }
        Ok(self
            .nodes
            .iter()
            .filter(|node| !matches!(node.kind, NodeKind::Data(_)))
            .map(|node| (node.name.clone(), values[node.values()].to_vec()))
            .collect())
    }

    /// Unconstrained position for the given constrained values.
    ///
    /// Every free variable needs a value, except the raw variables of
    /// non-centered nodes: when the value of the non-centered variable itself
    /// is given, its raw variable is recovered with the inverse transform.
    pub fn position_from_values(&self, given: &HashMap<String, Vec<f64>>) -> Result<Vec<f64>> {
        let mut position = vec![0f64; self.dim];
        let mut values = vec![0f64; self.n_values];
        let mut filled = vec![false; self.nodes.len()];

        for (idx, node) in self.nodes.iter().enumerate() {
            match &node.kind {
                NodeKind::Data(_) => {
                    self.compute_value(node, &position, &mut values)?;
                    filled[idx] = true;
                }
                NodeKind::Free { offset, family, .. } => {
                    let Some(vals) = given.get(&node.name) else {
                        continue;
                    };
                    check_len(&node.name, node.len, vals.len())?;
                    for (i, &val) in vals.iter().enumerate() {
                        position[offset + i] = if family.is_positive() {
                            if !(val > 0f64) {
                                return Err(ModelError::InvalidValue {
                                    name: node.name.clone(),
                                    reason: format!("{} is not positive", val),
                                });
                            }
                            val.ln()
                        } else {
                            val
                        };
                    }
                    values[node.values()].copy_from_slice(vals);
                    filled[idx] = true;
                }
                &NodeKind::NonCentered { raw, loc, scale } => {
                    let raw_node = &self.nodes[raw.0];
                    let NodeKind::Free {
                        offset: raw_offset, ..
                    } = raw_node.kind
                    else {
                        return Err(ModelError::UnknownNode(raw));
                    };
                    for input in [loc, scale] {
                        if let Input::Node(id) = input {
                            if !filled[id.0] {
                                return Err(ModelError::MissingValue(self.nodes[id.0].name.clone()));
                            }
                        }
                    }

                    if let Some(vals) = given.get(&node.name) {
                        check_len(&node.name, node.len, vals.len())?;
                        let mut raw_vals = vec![0f64; node.len];
                        self.transform
                            .untransform_into(
                                vals,
                                self.operand(loc, &values),
                                self.operand(scale, &values),
                                &mut raw_vals,
                            )
                            .map_err(|source| ModelError::Transform {
                                name: node.name.clone(),
                                source,
                            })?;
                        position[raw_offset..raw_offset + node.len].copy_from_slice(&raw_vals);
                        values[raw_node.values()].copy_from_slice(&raw_vals);
                        filled[raw.0] = true;
                    }
                    if filled[raw.0] {
                        self.compute_value(node, &position, &mut values)?;
                        filled[idx] = true;
                    }
                }
            }
        }

        if let Some(node) = self
            .nodes
            .iter()
            .zip(filled.iter())
            .find(|(node, &done)| !done && matches!(node.kind, NodeKind::Free { .. }))
            .map(|(node, _)| node)
        {
            return Err(ModelError::MissingValue(node.name.clone()));
        }
        Ok(position)
    }

    /// Draw a position from the prior by ancestral sampling.
    pub fn sample_prior<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f64>> {
        let mut position = vec![0f64; self.dim];
        let mut values = vec![0f64; self.n_values];

        for node in self.nodes.iter() {
            if let NodeKind::Free {
                offset,
                family,
                params,
            } = node.kind
            {
                for i in 0..node.len {
                    let params = params.map(|input| self.input_value(input, &values, i));
                    let draw = family
                        .sample(rng, params)
                        .map_err(|source| ModelError::Distribution {
                            name: node.name.clone(),
                            source,
                        })?;
                    position[offset + i] = if family.is_positive() {
                        draw.ln()
                    } else {
                        draw
                    };
                }
            }
            self.compute_value(node, &position, &mut values)?;
        }
        Ok(position)
    }

    fn check_dim(&self, found: usize) -> Result<()> {
        if found != self.dim {
            return Err(ModelError::Dimension {
                expected: self.dim,
                found,
            });
        }
        Ok(())
    }

    #[inline]
    fn input_value(&self, input: Input, values: &[f64], idx: usize) -> f64 {
        match input {
            Input::Const(val) => val,
            Input::Node(id) => {
                let node = &self.nodes[id.0];
                if node.len == 1 {
                    values[node.value_offset]
                } else {
                    values[node.value_offset + idx]
                }
            }
        }
    }

    #[inline]
    fn add_adjoint(&self, input: Input, adjoints: &mut [f64], idx: usize, val: f64) {
        if let Input::Node(id) = input {
            let node = &self.nodes[id.0];
            if node.len == 1 {
                adjoints[node.value_offset] += val;
            } else {
                adjoints[node.value_offset + idx] += val;
            }
        }
    }

    fn operand<'a>(&self, input: Input, values: &'a [f64]) -> Operand<'a> {
        match input {
            Input::Const(val) => Operand::Scalar(val),
            Input::Node(id) => Operand::Slice(&values[self.nodes[id.0].values()]),
        }
    }

    /// Compute the value of `node`, all nodes before it must be up to date.
    fn compute_value(&self, node: &Node, position: &[f64], values: &mut [f64]) -> Result<()> {
        match &node.kind {
            NodeKind::Data(data) => values[node.values()].copy_from_slice(data),
            &NodeKind::Free { offset, family, .. } => {
                let unconstrained = &position[offset..offset + node.len];
                let out = &mut values[node.values()];
                if family.is_positive() {
                    out.iter_mut()
                        .zip(unconstrained)
                        .for_each(|(out, &x)| *out = x.exp());
                } else {
                    out.copy_from_slice(unconstrained);
                }
            }
            &NodeKind::NonCentered { raw, loc, scale } => {
                let (before, after) = values.split_at_mut(node.value_offset);
                let before: &[f64] = before;
                let raw = &before[self.nodes[raw.0].values()];
                self.transform
                    .transform_into(
                        raw,
                        self.operand(loc, before),
                        self.operand(scale, before),
                        &mut after[..node.len],
                    )
                    .map_err(|source| ModelError::Transform {
                        name: node.name.clone(),
                        source,
                    })?;
            }
        }
        Ok(())
    }

    /// Compute all values and the log density.
    ///
    /// If `adjoints` is given, it receives the partial derivatives of the
    /// density terms with respect to the node values.
    fn forward(
        &self,
        position: &[f64],
        values: &mut [f64],
        mut adjoints: Option<&mut [f64]>,
    ) -> Result<f64> {
        self.check_dim(position.len())?;
        if let Some(adjoints) = adjoints.as_deref_mut() {
            adjoints.fill(0f64);
        }

        let mut logp = 0f64;
        for node in self.nodes.iter() {
            self.compute_value(node, position, values)?;

            let NodeKind::Free {
                offset,
                family,
                params,
            } = node.kind
            else {
                continue;
            };

            if family.is_positive() {
                logp += position[offset..offset + node.len].iter().sum::<f64>();
            }

            for i in 0..node.len {
                let value = values[node.value_offset + i];
                let param_values = params.map(|input| self.input_value(input, values, i));
                let term = family
                    .logp(value, param_values)
                    .map_err(|source| ModelError::Distribution {
                        name: node.name.clone(),
                        source,
                    })?;
                logp += term.logp;
                if let Some(adjoints) = adjoints.as_deref_mut() {
                    adjoints[node.value_offset + i] += term.d_value;
                    self.add_adjoint(params[0], adjoints, i, term.d_params[0]);
                    self.add_adjoint(params[1], adjoints, i, term.d_params[1]);
                }
            }
        }

        for obs in self.likelihoods.iter() {
            for (i, &data) in obs.data.iter().enumerate() {
                let j = obs.group.as_ref().map_or(i, |group| group[i]);
                let mu = self.input_value(obs.mu, values, j);
                let sigma = self.input_value(obs.sigma, values, i);
                let term = Family::Normal.logp(data, [mu, sigma]).map_err(|source| {
                    ModelError::Distribution {
                        name: obs.name.clone(),
                        source,
                    }
                })?;
                logp += term.logp;
                if let Some(adjoints) = adjoints.as_deref_mut() {
                    self.add_adjoint(obs.mu, adjoints, j, term.d_params[0]);
                    self.add_adjoint(obs.sigma, adjoints, i, term.d_params[1]);
                }
            }
        }

        Ok(logp)
    }

    /// Propagate adjoints through the deterministic nodes and the
    /// log transforms into the gradient of the unconstrained position.
    fn backward(&self, values: &[f64], adjoints: &mut [f64], gradient: &mut [f64]) {
        for node in self.nodes.iter().rev() {
            match node.kind {
                NodeKind::Data(_) => {}
                NodeKind::NonCentered { raw, loc, scale } => {
                    let raw_offset = self.nodes[raw.0].value_offset;
                    for i in 0..node.len {
                        let adj = adjoints[node.value_offset + i];
                        if adj == 0f64 {
                            continue;
                        }
                        let raw_val = values[raw_offset + i];
                        let scale_val = self.input_value(scale, values, i);
                        adjoints[raw_offset + i] += adj * scale_val;
                        self.add_adjoint(loc, adjoints, i, adj);
                        self.add_adjoint(scale, adjoints, i, adj * raw_val);
                    }
                }
                NodeKind::Free { offset, family, .. } => {
                    let adj = &adjoints[node.values()];
                    let grad = &mut gradient[offset..offset + node.len];
                    if family.is_positive() {
                        let vals = &values[node.values()];
                        grad.iter_mut()
                            .zip(adj.iter().zip(vals))
                            .for_each(|(grad, (&adj, &val))| *grad = adj * val + 1f64);
                    } else {
                        grad.copy_from_slice(adj);
                    }
                }
            }
        }
    }
}

fn check_len(name: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(ModelError::Shape {
            name: name.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

/// Log density of a [`Model`] with scratch space for one chain.
#[derive(Debug, Clone)]
pub struct ModelDensity<'model> {
    model: &'model Model,
    values: Vec<f64>,
    adjoints: Vec<f64>,
}

impl ModelDensity<'_> {
    /// Node values of the last evaluated position.
    pub fn last_values(&self) -> &[f64] {
        &self.values
    }
}

impl CpuLogpFunc for ModelDensity<'_> {
    type LogpError = ModelError;

    fn dim(&self) -> usize {
        self.model.dim
    }

    fn logp(&mut self, position: &[f64], gradient: &mut [f64]) -> Result<f64> {
        self.model.check_dim(gradient.len())?;
        let logp = self
            .model
            .forward(position, &mut self.values, Some(self.adjoints.as_mut_slice()))?;
        self.model
            .backward(&self.values, &mut self.adjoints, gradient);
        Ok(logp)
    }
}
