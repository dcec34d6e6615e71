use serde::{Deserialize, Serialize};
use shroud_lattice::Scheme;

use super::{ScopedContext, Stage};
use crate::{DEFAULT_PRESET, Engine, Error, Operation, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// An operation [`Engine::verified_arithmetic`] can check.
pub enum ArithmeticOp {
    /// `a + b`.
    Add,

    /// `a * b` element-wise.
    Multiply,

    /// The inner product of `a` and `b`.
    DotProduct,

    /// `-a`.
    Negate,
}

impl ArithmeticOp {
    fn operation(&self) -> Operation {
        match self {
            Self::Add => Operation::Add,
            Self::Multiply => Operation::Multiply,
            Self::DotProduct => Operation::DotProduct,
            Self::Negate => Operation::Negate,
        }
    }

    fn plaintext(&self, a: &[f64], b: &[f64]) -> Vec<f64> {
        match self {
            Self::Add => a.iter().zip(b).map(|(x, y)| x + y).collect(),
            Self::Multiply => a.iter().zip(b).map(|(x, y)| x * y).collect(),
            Self::DotProduct => vec![a.iter().zip(b).map(|(x, y)| x * y).sum()],
            Self::Negate => a.iter().map(|x| -x).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Runs operations on two encrypted vectors and checks them against plaintext.
pub struct ArithmeticRequest {
    /// The first operand.
    pub a: Vec<f64>,

    /// The second operand. Must be as long as `a`.
    pub b: Vec<f64>,

    /// The operations to run, each on the freshly encrypted operands.
    pub operations: Vec<ArithmeticOp>,

    /// Defaults to [`Scheme::ApproxReal`].
    #[serde(default = "default_scheme")]
    pub scheme: Scheme,

    /// Defaults to `"light"`.
    #[serde(default)]
    pub preset: Option<String>,
}

fn default_scheme() -> Scheme {
    Scheme::ApproxReal
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One operation's encrypted and plaintext results.
pub struct ArithmeticOutcome {
    /// The operation.
    pub op: ArithmeticOp,

    /// The decrypted result of computing under encryption.
    pub encrypted: Vec<f64>,

    /// The same operation computed in the clear.
    pub plaintext: Vec<f64>,

    /// The largest absolute difference between the two.
    pub max_abs_error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// The outcome of every requested operation, in request order.
pub struct ArithmeticResult {
    /// The scheme the operations ran under.
    pub scheme: Scheme,

    /// One entry per requested operation.
    pub outcomes: Vec<ArithmeticOutcome>,
}

impl Engine {
    /// Encrypts `a` and `b` once, runs each requested operation under encryption and reports
    /// how far each decrypted result is from the plaintext computation.
    ///
    /// # Remarks
    /// Under [`Scheme::ExactInteger`] the plaintext reference uses the inputs truncated toward
    /// zero, matching what encryption does.
    pub fn verified_arithmetic(&self, request: &ArithmeticRequest) -> Result<ArithmeticResult> {
        self.ensure_available()?;

        let len = request.a.len();

        if len == 0 || request.b.len() != len {
            return Err(Error::invalid_input(format!(
                "operands must be non-empty and of equal length, got {} and {}",
                len,
                request.b.len()
            )));
        }

        if request.operations.is_empty() {
            return Err(Error::invalid_input("no operations requested"));
        }

        let relin_keys = request
            .operations
            .iter()
            .any(|op| matches!(op, ArithmeticOp::Multiply | ArithmeticOp::DotProduct));
        let rotation_keys = request.operations.contains(&ArithmeticOp::DotProduct);
        let preset = request.preset.as_deref().unwrap_or(DEFAULT_PRESET);

        let ctx = ScopedContext::new(
            self,
            "arithmetic",
            request.scheme,
            preset,
            rotation_keys,
            relin_keys,
        )?;
        let key = ctx.key_id();

        let a = self.encrypt(key, &request.a)?;
        let b = self.encrypt(key, &request.b)?;
        ctx.advance(Stage::InputsEncrypted);

        let results = request
            .operations
            .iter()
            .map(|op| {
                let operation = op.operation();
                let rhs = operation.is_binary().then_some(b);

                self.compute(key, &operation, a, rhs)
            })
            .collect::<Result<Vec<_>>>()?;

        ctx.advance(Stage::Computed);

        let (plain_a, plain_b): (Vec<f64>, Vec<f64>) = match request.scheme {
            Scheme::ApproxReal => (request.a.clone(), request.b.clone()),
            Scheme::ExactInteger => (
                request.a.iter().map(|x| x.trunc()).collect(),
                request.b.iter().map(|x| x.trunc()).collect(),
            ),
        };

        let outcomes = request
            .operations
            .iter()
            .zip(results)
            .map(|(op, id)| {
                let encrypted = self.decrypt(key, id)?;
                let plaintext = op.plaintext(&plain_a, &plain_b);
                let max_abs_error = encrypted
                    .iter()
                    .zip(&plaintext)
                    .map(|(e, p)| (e - p).abs())
                    .fold(0.0, f64::max);

                Ok(ArithmeticOutcome {
                    op: *op,
                    encrypted,
                    plaintext,
                    max_abs_error,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        ctx.advance(Stage::Decrypted);

        Ok(ArithmeticResult {
            scheme: request.scheme,
            outcomes,
        })
    }
}
