//! Backend kernel call marker.

use tessera_core::{ArgSpec, CALL_TIR_OP, Call, Error, Operator, Result, StructInfo};

const ARGS: &[ArgSpec] = &[ArgSpec {
    name: "args",
    kind: "Tuple",
    description: "The kernel arguments.",
}];

/// `call_tir(args)` invokes the backend kernel named by its `kernel`
/// attribute. Its result descriptor is the one declared on the call.
///
/// Calls to this operator are already legalized: it has no legalization of
/// its own and is never reported as missing one.
pub struct CallTirOp;

impl Operator for CallTirOp {
    fn name(&self) -> &str {
        CALL_TIR_OP
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn arguments(&self) -> &[ArgSpec] {
        ARGS
    }

    fn infer_struct_info(&self, call: &Call) -> Result<StructInfo> {
        if call.args.len() != 1 {
            return Err(Error::ArityMismatch {
                call: Box::new(call.clone()),
                expected: 1,
                actual: call.args.len(),
            });
        }
        call.sinfo_args.first().cloned().ok_or_else(|| {
            Error::InvalidIr(format!("{call}: call_tir must declare its output descriptor"))
        })
    }
}
