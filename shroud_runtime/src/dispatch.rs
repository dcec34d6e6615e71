use std::time::Instant;

use log::{trace, warn};
use serde::{Deserialize, Serialize};
use shroud_lattice::Scheme;

use crate::{Engine, Error, KeyId, PayloadId, Result, payload::max_magnitude};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "values", rename_all = "snake_case")]
/// A homomorphic operation on stored payloads.
pub enum Operation {
    /// Slot-wise `a + b`.
    Add,

    /// Slot-wise `a * b`. Consumes one level of depth and needs relinearization keys.
    Multiply,

    /// The inner product of `a` and `b` as a single value. Consumes one level of depth and
    /// needs relinearization and rotation keys.
    DotProduct,

    /// Slot-wise `a + values`. A single value is added to every element.
    AddPlain(Vec<f64>),

    /// Slot-wise `a * values`. A single value scales every element. Consumes one level of depth.
    MultiplyPlain(Vec<f64>),

    /// Slot-wise `-a`.
    Negate,

    /// The sum of every element of `a` as a single value. Needs rotation keys.
    Sum,
}

impl Operation {
    /// A stable name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Multiply => "multiply",
            Self::DotProduct => "dot_product",
            Self::AddPlain(_) => "add_plain",
            Self::MultiplyPlain(_) => "multiply_plain",
            Self::Negate => "negate",
            Self::Sum => "sum",
        }
    }

    /// Whether the operation takes a second payload.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Add | Self::Multiply | Self::DotProduct)
    }

    /// Whether the operation consumes multiplicative depth.
    pub fn is_multiplicative(&self) -> bool {
        matches!(self, Self::Multiply | Self::DotProduct | Self::MultiplyPlain(_))
    }

    fn needs_relin_key(&self) -> bool {
        matches!(self, Self::Multiply | Self::DotProduct)
    }

    fn needs_rotation_keys(&self) -> bool {
        matches!(self, Self::DotProduct | Self::Sum)
    }

    /// An upper bound on the magnitude of the result given bounds `a` and `b` on operands of
    /// length `len`.
    fn result_magnitude(&self, len: usize, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Multiply => a * b,
            Self::DotProduct => len as f64 * a * b,
            Self::AddPlain(values) => a + max_magnitude(values),
            Self::MultiplyPlain(values) => a * max_magnitude(values),
            Self::Negate => a,
            Self::Sum => len as f64 * a,
        }
    }
}

/// Expands `values` to `len` elements, broadcasting a single value.
fn plain_operand(values: &[f64], len: usize) -> Result<Vec<f64>> {
    match values.len() {
        1 => Ok(vec![values[0]; len]),
        n if n == len => Ok(values.to_vec()),
        n => Err(Error::incompatible(format!(
            "{n} plaintext values for a payload of length {len}"
        ))),
    }
}

impl Engine {
    /// Applies `op` to payload `a` (and `b` for binary operations), storing the result as a new
    /// payload owned by `key_id`.
    ///
    /// # Remarks
    /// Operands are never modified. The result records the time spent and an operation count
    /// one greater than its deepest operand's.
    ///
    /// Every payload carries a bound on its magnitude. Under [`Scheme::ApproxReal`] an operation
    /// whose result could exceed the largest value the modulus represents fails with
    /// [`Error::Incompatible`] instead of wrapping. [`Scheme::ExactInteger`] results wrap modulo
    /// the plaintext modulus.
    ///
    /// `sum` and `dot_product` place their result in every slot. Payloads longer than one value
    /// always have zero padding, and reducing a single value is the value itself, so reductions
    /// never see another reduction's padding.
    pub fn compute(
        &self,
        key_id: KeyId,
        op: &Operation,
        a: PayloadId,
        b: Option<PayloadId>,
    ) -> Result<PayloadId> {
        self.ensure_available()?;

        let ctx = self.contexts.get(key_id)?;
        let params = ctx.params();

        let lhs = self.owned_payload(key_id, a)?;

        let rhs = match (op.is_binary(), b) {
            (true, Some(b)) => Some(self.owned_payload(key_id, b)?),
            (true, None) => {
                return Err(Error::incompatible(format!(
                    "{} needs two operands",
                    op.name()
                )));
            }
            (false, Some(_)) => {
                return Err(Error::incompatible(format!(
                    "{} takes a single operand",
                    op.name()
                )));
            }
            (false, None) => None,
        };

        if let Some(rhs) = &rhs {
            if rhs.info.logical_len != lhs.info.logical_len {
                return Err(Error::incompatible(format!(
                    "operand lengths {} and {} differ",
                    lhs.info.logical_len, rhs.info.logical_len
                )));
            }
        }

        let evaluation = &ctx.material.keys.evaluation;

        if op.needs_relin_key() && !evaluation.has_relin_key() {
            return Err(Error::incompatible(format!(
                "{} needs relinearization keys and key {key_id} has none",
                op.name()
            )));
        }

        if op.needs_rotation_keys() && !evaluation.has_rotation_keys() {
            return Err(Error::incompatible(format!(
                "{} needs rotation keys and key {key_id} has none",
                op.name()
            )));
        }

        if op.is_multiplicative() {
            for operand in std::iter::once(&lhs).chain(rhs.as_ref()) {
                if operand.ciphertext.remaining_depth(params) == 0 {
                    warn!(
                        "{} on payload {} refused: depth budget {} exhausted",
                        op.name(),
                        operand.info.payload_id,
                        params.mul_depth
                    );

                    return Err(Error::DepthExhausted {
                        payload: operand.info.payload_id,
                        budget: params.mul_depth,
                    });
                }
            }
        }

        let len = lhs.info.logical_len;
        let magnitude = op.result_magnitude(
            len,
            lhs.info.magnitude,
            rhs.as_ref().map_or(0.0, |r| r.info.magnitude),
        );

        if params.scheme == Scheme::ApproxReal && magnitude > params.max_plain_magnitude() {
            warn!(
                "{} on payload {a} refused: result bound {magnitude} exceeds {}",
                op.name(),
                params.max_plain_magnitude()
            );

            return Err(Error::incompatible(format!(
                "{} could produce values up to {magnitude}, beyond the {} the modulus represents",
                op.name(),
                params.max_plain_magnitude()
            )));
        }

        let eval = &ctx.material.eval;
        let x = lhs.ciphertext.as_ref();
        let y = || {
            rhs.as_ref()
                .map(|r| r.ciphertext.as_ref())
                .ok_or_else(|| Error::incompatible("missing second operand"))
        };

        let now = Instant::now();

        let (ct, result_len) = match op {
            Operation::Add => (eval.add(x, y()?)?, len),
            Operation::Multiply => (eval.multiply(x, y()?)?, len),
            Operation::DotProduct if len == 1 => (eval.multiply(x, y()?)?, 1),
            Operation::DotProduct => (eval.dot_product(x, y()?)?, 1),
            Operation::AddPlain(values) => (eval.add_plain(x, &plain_operand(values, len)?)?, len),
            Operation::MultiplyPlain(values) => {
                (eval.multiply_plain(x, &plain_operand(values, len)?)?, len)
            }
            Operation::Negate => (eval.negate(x)?, len),
            Operation::Sum if len == 1 => (x.clone(), 1),
            Operation::Sum => (eval.sum_slots(x)?, 1),
        };

        let compute_us = now.elapsed().as_micros() as u64;
        self.metrics.computed(compute_us);

        let op_count = lhs
            .info
            .op_count
            .max(rhs.as_ref().map_or(0, |r| r.info.op_count))
            + 1;

        let id = self.store(&ctx, ct, result_len, magnitude, op_count, compute_us)?;

        trace!(
            "{} on key {key_id}: {a}{} -> {id} in {compute_us}us",
            op.name(),
            b.map(|b| format!(", {b}")).unwrap_or_default()
        );

        Ok(id)
    }

    /// Computes `a + b` slot-wise.
    pub fn add(&self, key_id: KeyId, a: PayloadId, b: PayloadId) -> Result<PayloadId> {
        self.compute(key_id, &Operation::Add, a, Some(b))
    }

    /// Computes `a * b` slot-wise.
    pub fn multiply(&self, key_id: KeyId, a: PayloadId, b: PayloadId) -> Result<PayloadId> {
        self.compute(key_id, &Operation::Multiply, a, Some(b))
    }

    /// Computes the inner product of `a` and `b` as a single value.
    pub fn dot_product(&self, key_id: KeyId, a: PayloadId, b: PayloadId) -> Result<PayloadId> {
        self.compute(key_id, &Operation::DotProduct, a, Some(b))
    }

    /// Adds plaintext `values` to `a` slot-wise.
    pub fn add_plain(&self, key_id: KeyId, a: PayloadId, values: &[f64]) -> Result<PayloadId> {
        self.compute(key_id, &Operation::AddPlain(values.to_vec()), a, None)
    }

    /// Multiplies `a` by plaintext `values` slot-wise.
    pub fn multiply_plain(
        &self,
        key_id: KeyId,
        a: PayloadId,
        values: &[f64],
    ) -> Result<PayloadId> {
        self.compute(key_id, &Operation::MultiplyPlain(values.to_vec()), a, None)
    }

    /// Computes `-a`.
    pub fn negate(&self, key_id: KeyId, a: PayloadId) -> Result<PayloadId> {
        self.compute(key_id, &Operation::Negate, a, None)
    }

    /// Sums every element of `a` into a single value.
    pub fn sum(&self, key_id: KeyId, a: PayloadId) -> Result<PayloadId> {
        self.compute(key_id, &Operation::Sum, a, None)
    }
}
