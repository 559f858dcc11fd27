//! Gradient operators.
//!
//! Each returns a gradient with respect to its data argument, so its result
//! has the data argument's descriptor. None of them has a legalization; they
//! are expected to be expanded before reaching the backend.

use tessera_core::{ArgSpec, Call, Error, Operator, Result, StructInfo, input_tensor_descs};

const NLL_LOSS_BACKWARD_ARGS: &[ArgSpec] = &[
    ArgSpec::tensor("output_grad", "The output gradient."),
    ArgSpec::tensor("predictions", "The prediction tensor."),
    ArgSpec::tensor("targets", "The target tensor."),
    ArgSpec {
        name: "weights",
        kind: "Optional<Tensor>",
        description: "The weight of each target value.",
    },
];

const POOL2D_BACKWARD_ARGS: &[ArgSpec] = &[
    ArgSpec::tensor("output_grad", "The output gradient."),
    ArgSpec::tensor("data", "The input tensor."),
];

const TAKE_BACKWARD_ARGS: &[ArgSpec] = &[
    ArgSpec::tensor("output_grad", "The output gradient."),
    ArgSpec::tensor("x", "The source tensor."),
    ArgSpec::tensor("indices", "The indices of the values to extract."),
];

/// Index of the data argument whose descriptor the gradient takes.
const DATA_ARG: usize = 1;

pub struct GradOp {
    name: &'static str,
    args: &'static [ArgSpec],
    /// Trailing optional arguments that may be omitted.
    optional: usize,
}

impl GradOp {
    pub fn nll_loss_backward() -> Self {
        Self {
            name: "nll_loss_backward",
            args: NLL_LOSS_BACKWARD_ARGS,
            optional: 1,
        }
    }

    pub fn max_pool2d_backward() -> Self {
        Self {
            name: "max_pool2d_backward",
            args: POOL2D_BACKWARD_ARGS,
            optional: 0,
        }
    }

    pub fn avg_pool2d_backward() -> Self {
        Self {
            name: "avg_pool2d_backward",
            args: POOL2D_BACKWARD_ARGS,
            optional: 0,
        }
    }

    pub fn take_backward() -> Self {
        Self {
            name: "take_backward",
            args: TAKE_BACKWARD_ARGS,
            optional: 0,
        }
    }
}

impl Operator for GradOp {
    fn name(&self) -> &str {
        self.name
    }

    fn num_inputs(&self) -> usize {
        self.args.len()
    }

    fn arguments(&self) -> &[ArgSpec] {
        self.args
    }

    fn infer_struct_info(&self, call: &Call) -> Result<StructInfo> {
        let min = self.args.len() - self.optional;
        let arity = if (min..=self.args.len()).contains(&call.args.len()) {
            call.args.len()
        } else {
            self.args.len()
        };
        input_tensor_descs(call, arity)?
            .into_iter()
            .nth(DATA_ARG)
            .map(StructInfo::Tensor)
            .ok_or_else(|| Error::InvalidIr(format!("{call}: missing data argument")))
    }
}
