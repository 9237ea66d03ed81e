//! Small concrete models for tests and demos. Only built with the
//! `testing` feature.

use crate::calibrator::{Calibrator, ErasedCalibrator};
use crate::errors::{MgError, MgResult};
use crate::model::{shared, Attribute, FromParams, Model, Node, Shared, SharedNode};
use crate::params::{ParamValue, Params};

fn float_value(value: &ParamValue, name: &str) -> MgResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| MgError::type_mismatch(format!("float for `{name}`"), value.kind()))
}

/// `invoke(data) = max(data, parameter)`; NaN input is an invocation error.
#[derive(Debug, Clone)]
pub struct Foo {
    parameter: f64,
}

impl Foo {
    pub fn new(parameter: f64) -> Self {
        Self { parameter }
    }

    pub fn parameter(&self) -> f64 {
        self.parameter
    }
}

impl FromParams for Foo {
    fn from_params(params: &Params) -> MgResult<Self> {
        Ok(Self::new(params.require_f64("Foo", "parameter")?))
    }
}

impl Node for Foo {
    fn type_name(&self) -> &str {
        "Foo"
    }

    fn attributes(&self) -> Vec<(String, Attribute)> {
        vec![("parameter".to_string(), Attribute::param(self.parameter))]
    }

    fn store_parameter(&mut self, name: &str, value: ParamValue) -> MgResult<()> {
        match name {
            "parameter" => self.parameter = float_value(&value, name)?,
            other => return Err(MgError::unknown_parameter("Foo", other)),
        }
        Ok(())
    }
}

impl Model for Foo {
    type Input = f64;
    type Output = f64;

    fn invoke(&self, input: &f64) -> MgResult<f64> {
        if input.is_nan() {
            return Err(MgError::invocation("Foo", "input is NaN"));
        }
        Ok(input.max(self.parameter))
    }
}

/// `invoke(data) = [a * number + data for a in arr]`.
#[derive(Debug, Clone)]
pub struct Bar {
    number: f64,
    arr: Vec<f64>,
}

impl Bar {
    pub fn new(number: f64, arr: Vec<f64>) -> Self {
        Self { number, arr }
    }

    fn floats(values: &[ParamValue]) -> MgResult<Vec<f64>> {
        values.iter().map(|v| float_value(v, "arr")).collect()
    }
}

impl FromParams for Bar {
    fn from_params(params: &Params) -> MgResult<Self> {
        let number = params.require_f64("Bar", "number")?;
        let arr = Self::floats(params.require_list("Bar", "arr")?)?;
        Ok(Self::new(number, arr))
    }
}

impl Node for Bar {
    fn type_name(&self) -> &str {
        "Bar"
    }

    fn attributes(&self) -> Vec<(String, Attribute)> {
        vec![
            ("number".to_string(), Attribute::param(self.number)),
            ("arr".to_string(), Attribute::param(self.arr.clone())),
        ]
    }

    fn store_parameter(&mut self, name: &str, value: ParamValue) -> MgResult<()> {
        match name {
            "number" => self.number = float_value(&value, name)?,
            "arr" => {
                let values = value
                    .as_list()
                    .ok_or_else(|| MgError::type_mismatch("list for `arr`", value.kind()))?;
                self.arr = Self::floats(values)?;
            }
            other => return Err(MgError::unknown_parameter("Bar", other)),
        }
        Ok(())
    }
}

impl Model for Bar {
    type Input = f64;
    type Output = Vec<f64>;

    fn invoke(&self, input: &f64) -> MgResult<Vec<f64>> {
        Ok(self.arr.iter().map(|a| a * self.number + input).collect())
    }
}

/// `invoke(data) = alpha + model(data)`.
#[derive(Debug, Clone)]
pub struct NestedModel {
    alpha: f64,
    model: Shared<Foo>,
}

impl NestedModel {
    pub fn new(alpha: f64, model: Foo) -> Self {
        Self::with_shared(alpha, shared(model))
    }

    pub fn with_shared(alpha: f64, model: Shared<Foo>) -> Self {
        Self { alpha, model }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn inner(&self) -> &Shared<Foo> {
        &self.model
    }
}

impl FromParams for NestedModel {
    fn from_params(params: &Params) -> MgResult<Self> {
        let alpha = params.require_f64("NestedModel", "alpha")?;
        Ok(Self::new(alpha, Foo::from_params(params)?))
    }
}

impl Node for NestedModel {
    fn type_name(&self) -> &str {
        "NestedModel"
    }

    fn attributes(&self) -> Vec<(String, Attribute)> {
        vec![
            ("alpha".to_string(), Attribute::param(self.alpha)),
            ("model".to_string(), Attribute::submodel(&self.model)),
        ]
    }

    fn store_parameter(&mut self, name: &str, value: ParamValue) -> MgResult<()> {
        match name {
            "alpha" => self.alpha = float_value(&value, name)?,
            other => return Err(MgError::unknown_parameter("NestedModel", other)),
        }
        Ok(())
    }
}

impl Model for NestedModel {
    type Input = f64;
    type Output = f64;

    fn invoke(&self, input: &f64) -> MgResult<f64> {
        Ok(self.alpha + self.model.read().invoke(input)?)
    }
}

/// Two submodels that both carry a `parameter`, plus one of its own.
#[derive(Debug, Clone)]
pub struct Pair {
    parameter: f64,
    left: Shared<NestedModel>,
    right: Shared<Foo>,
    back: Option<SharedNode>,
}

impl Pair {
    pub fn new(parameter: f64, left: NestedModel, right: Foo) -> Self {
        Self {
            parameter,
            left: shared(left),
            right: shared(right),
            back: None,
        }
    }

    pub fn parameter(&self) -> f64 {
        self.parameter
    }

    pub fn left(&self) -> &Shared<NestedModel> {
        &self.left
    }

    pub fn right(&self) -> &Shared<Foo> {
        &self.right
    }

    /// Attach an arbitrary node under `back`, e.g. to build a cycle.
    pub fn set_back_reference(&mut self, node: SharedNode) {
        self.back = Some(node);
    }
}

impl Node for Pair {
    fn type_name(&self) -> &str {
        "Pair"
    }

    fn attributes(&self) -> Vec<(String, Attribute)> {
        let mut attributes = vec![
            ("parameter".to_string(), Attribute::param(self.parameter)),
            ("left".to_string(), Attribute::submodel(&self.left)),
            ("right".to_string(), Attribute::submodel(&self.right)),
        ];
        if let Some(back) = &self.back {
            attributes.push(("back".to_string(), Attribute::Submodel(back.clone())));
        }
        attributes
    }

    fn store_parameter(&mut self, name: &str, value: ParamValue) -> MgResult<()> {
        match name {
            "parameter" => self.parameter = float_value(&value, name)?,
            other => return Err(MgError::unknown_parameter("Pair", other)),
        }
        Ok(())
    }
}

impl Model for Pair {
    type Input = f64;
    type Output = f64;

    fn invoke(&self, input: &f64) -> MgResult<f64> {
        let left = self.left.read().invoke(input)?;
        let right = self.right.read().invoke(input)?;
        Ok(self.parameter + left + right)
    }
}

/// Holds a private parameter and a private submodel next to a public one.
#[derive(Debug, Clone)]
pub struct PrivateHolder {
    visible: f64,
    secret: f64,
    hidden: Shared<Foo>,
}

impl PrivateHolder {
    pub fn new(visible: f64, secret: f64, hidden: Foo) -> Self {
        Self {
            visible,
            secret,
            hidden: shared(hidden),
        }
    }

    pub fn visible(&self) -> f64 {
        self.visible
    }

    pub fn secret(&self) -> f64 {
        self.secret
    }

    pub fn hidden(&self) -> &Shared<Foo> {
        &self.hidden
    }
}

impl Node for PrivateHolder {
    fn type_name(&self) -> &str {
        "PrivateHolder"
    }

    fn attributes(&self) -> Vec<(String, Attribute)> {
        vec![
            ("visible".to_string(), Attribute::param(self.visible)),
            ("_secret".to_string(), Attribute::param(self.secret)),
            ("_hidden".to_string(), Attribute::submodel(&self.hidden)),
        ]
    }

    fn store_parameter(&mut self, name: &str, value: ParamValue) -> MgResult<()> {
        match name {
            "visible" => self.visible = float_value(&value, name)?,
            "_secret" => self.secret = float_value(&value, name)?,
            other => return Err(MgError::unknown_parameter("PrivateHolder", other)),
        }
        Ok(())
    }
}

/// Proposes `parameter = input + margin` for its owner.
#[derive(Debug, Clone)]
pub struct OffsetCalibrator {
    margin: f64,
}

impl OffsetCalibrator {
    pub fn new(margin: f64) -> Self {
        Self { margin }
    }
}

impl Node for OffsetCalibrator {
    fn type_name(&self) -> &str {
        "OffsetCalibrator"
    }

    fn attributes(&self) -> Vec<(String, Attribute)> {
        vec![("margin".to_string(), Attribute::param(self.margin))]
    }

    fn store_parameter(&mut self, name: &str, value: ParamValue) -> MgResult<()> {
        match name {
            "margin" => self.margin = float_value(&value, name)?,
            other => return Err(MgError::unknown_parameter("OffsetCalibrator", other)),
        }
        Ok(())
    }

    fn as_calibrator(&self) -> Option<&dyn ErasedCalibrator> {
        Some(self)
    }
}

impl Calibrator for OffsetCalibrator {
    type Input = f64;

    fn propose(&self, _model: &dyn Node, input: &f64) -> MgResult<Params> {
        Ok(crate::params! { "parameter" => input + self.margin })
    }
}

/// [`Foo`] with one or two [`OffsetCalibrator`]s attached.
#[derive(Debug, Clone)]
pub struct CalibratedFoo {
    parameter: f64,
    calibrator: Shared<OffsetCalibrator>,
    second: Option<Shared<OffsetCalibrator>>,
}

impl CalibratedFoo {
    pub fn new(parameter: f64, margin: f64) -> Self {
        Self {
            parameter,
            calibrator: shared(OffsetCalibrator::new(margin)),
            second: None,
        }
    }

    pub fn with_second_calibrator(mut self, margin: f64) -> Self {
        self.second = Some(shared(OffsetCalibrator::new(margin)));
        self
    }

    pub fn parameter(&self) -> f64 {
        self.parameter
    }
}

impl FromParams for CalibratedFoo {
    fn from_params(params: &Params) -> MgResult<Self> {
        let parameter = params.require_f64("CalibratedFoo", "parameter")?;
        let margin = params.require_f64("CalibratedFoo", "margin")?;
        Ok(Self::new(parameter, margin))
    }
}

impl Node for CalibratedFoo {
    fn type_name(&self) -> &str {
        "CalibratedFoo"
    }

    fn attributes(&self) -> Vec<(String, Attribute)> {
        let mut attributes = vec![
            ("parameter".to_string(), Attribute::param(self.parameter)),
            ("calibrator".to_string(), Attribute::submodel(&self.calibrator)),
        ];
        if let Some(second) = &self.second {
            attributes.push(("second_calibrator".to_string(), Attribute::submodel(second)));
        }
        attributes
    }

    fn store_parameter(&mut self, name: &str, value: ParamValue) -> MgResult<()> {
        match name {
            "parameter" => self.parameter = float_value(&value, name)?,
            other => return Err(MgError::unknown_parameter("CalibratedFoo", other)),
        }
        Ok(())
    }
}

impl Model for CalibratedFoo {
    type Input = f64;
    type Output = f64;

    fn invoke(&self, input: &f64) -> MgResult<f64> {
        Ok(input.max(self.parameter))
    }
}
