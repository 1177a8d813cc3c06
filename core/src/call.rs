//! Invoking host functions from script calls.
//!
//! The frame seen by [`call`] holds the function handle at index 1 and the
//! script's arguments from index 2 on.

use crate::{
    error::{Error, Result},
    marshal,
    reflect::{Func, Type, Value},
    state::State,
};

fn pull_arg(state: &dyn State, position: usize, hint: &Type) -> Result<Value> {
    let index = position as i32 + 2;
    Ok(marshal::pull(state, index, Some(hint))?.unwrap_or_else(|| hint.zero()))
}

/// Call `f` with the arguments on the frame and push its results.
///
/// Raw functions get the state untouched and report their own result
/// count. Everything else is arity-checked, has each argument converted
/// to its parameter type (trailing arguments of a variadic function are
/// packed into its final slice parameter) and pushes one slot per
/// declared result.
pub fn call(state: &mut dyn State, f: &Value) -> Result<usize> {
    let sig = f
        .ty()
        .signature()
        .cloned()
        .ok_or_else(|| Error::mismatch("function", f.ty().name()))?;
    let host = match f.as_func() {
        Some(Func::Raw(raw)) => {
            tracing::trace!(ty = %f.ty(), "raw call");
            return raw(state);
        }
        Some(Func::Host(_)) if sig.is_raw() => {
            return Err(Error::mismatch("raw function", "host function with a state parameter"));
        }
        Some(Func::Host(host)) => host.clone(),
        None => return Err(Error::Runtime(format!("call of nil {}", f.ty()))),
    };

    let got = state.top().saturating_sub(1);
    let expected = sig.num_in();
    let fixed = if sig.is_variadic() {
        let fixed = expected.saturating_sub(1);
        if got < fixed {
            return Err(Error::ArityMismatch {
                got,
                expected: fixed,
                variadic: true,
            });
        }
        fixed
    } else {
        if got != expected {
            return Err(Error::ArityMismatch {
                got,
                expected,
                variadic: false,
            });
        }
        expected
    };

    let mut args = Vec::with_capacity(expected);
    for (position, hint) in sig.params().iter().take(fixed).enumerate() {
        args.push(pull_arg(state, position, hint)?);
    }
    if let Some(elem) = sig.variadic_elem() {
        let rest = (fixed..got)
            .map(|position| pull_arg(state, position, elem))
            .collect::<Result<Vec<_>>>()?;
        args.push(Value::slice(elem, rest)?);
    }

    tracing::trace!(ty = %f.ty(), args = got, "marshaled call");
    let results = host(args.as_slice()).map_err(Error::from_host)?;
    if results.len() != sig.num_out() {
        return Err(Error::Internal(format!(
            "{} returned {} values, expected {}",
            f.ty(),
            results.len(),
            sig.num_out()
        )));
    }
    let results = results
        .iter()
        .zip(sig.returns())
        .map(|(value, ty)| value.convert(ty))
        .collect::<Result<Vec<_>>>()?;

    if !state.check_stack(results.len()) {
        return Err(Error::StackOverflow);
    }
    let mark = state.top();
    for value in &results {
        if let Err(err) = marshal::push(state, value) {
            let pushed = state.top() - mark;
            state.pop(pushed);
            return Err(err);
        }
    }
    Ok(results.len())
}
