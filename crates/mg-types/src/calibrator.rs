//! Calibrators: submodels that propose parameter updates for their owner.

use std::any::{type_name, Any};

use crate::errors::{MgError, MgResult};
use crate::model::Node;
use crate::params::Params;

/// A model specialization that, instead of a domain output, returns updates
/// to apply to the model that owns it.
///
/// Implementors also override [`Node::as_calibrator`] to return
/// `Some(self)`, which is how [`crate::Model::calibrate`] finds them among
/// the owner's submodels.
pub trait Calibrator: Node {
    /// Input type of the owning model.
    type Input: 'static;

    fn propose(&self, model: &dyn Node, input: &Self::Input) -> MgResult<Params>;
}

/// Object-safe view of a [`Calibrator`], with the owner's input erased.
pub trait ErasedCalibrator {
    fn propose_erased(&self, model: &dyn Node, input: &dyn Any) -> MgResult<Params>;
}

impl<C: Calibrator> ErasedCalibrator for C {
    fn propose_erased(&self, model: &dyn Node, input: &dyn Any) -> MgResult<Params> {
        match input.downcast_ref::<C::Input>() {
            Some(input) => self.propose(model, input),
            None => Err(MgError::type_mismatch(
                format!("{} input for calibrator {}", type_name::<C::Input>(), self.type_name()),
                format!("input of {}", model.type_name()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::params::ParamValue;
    use crate::testing::{Foo, OffsetCalibrator};

    #[test]
    fn proposes_through_erased_view() {
        let calibrator = OffsetCalibrator::new(2.0);
        let owner = Foo::new(0.0);
        let erased = calibrator.as_calibrator().expect("calibrator reports itself");

        let proposal = erased.propose_erased(&owner, &3.0_f64).unwrap();
        assert_eq!(proposal.get("parameter"), Some(&ParamValue::Float(5.0)));
    }

    #[test]
    fn wrong_input_type_is_a_mismatch() {
        let calibrator = OffsetCalibrator::new(2.0);
        let owner = Foo::new(0.0);

        let err = calibrator.propose_erased(&owner, &"text").unwrap_err();
        assert!(matches!(err, MgError::TypeMismatch { .. }));
    }

    #[test]
    fn plain_models_are_not_calibrators() {
        let foo = Foo::new(1.0);
        assert!(foo.as_calibrator().is_none());
        assert_eq!(foo.invoke(&0.0).unwrap(), 1.0);
    }
}
